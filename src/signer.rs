// src/signer.rs
use std::fmt;

use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::{Address, Signature, H256};
use tracing::debug;

use crate::address::parse_signing_key;
use crate::error::{ProviderError, ProviderResult};
use crate::hasher::hash_user_operation;
use crate::types::{SignedUserOperation, UserOperation, UserOperationHash};

/// Holds the owner's key and signs UserOperation hashes with it.
#[derive(Clone)]
pub struct OwnerSigner {
    wallet: LocalWallet,
}

impl OwnerSigner {
    pub fn from_private_key(private_key_hex: &str) -> ProviderResult<Self> {
        let key = parse_signing_key(private_key_hex)
            .map_err(|e| ProviderError::SigningError(e.to_string()))?;
        Ok(Self {
            wallet: LocalWallet::from(key),
        })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Signs a 32-byte digest as-is (no EIP-191 prefix). The returned
    /// signature is 65 bytes `r || s || v` with `v` in {27, 28}.
    pub fn sign_hash(&self, hash: H256) -> ProviderResult<Signature> {
        self.wallet
            .sign_hash(hash)
            .map_err(|e| ProviderError::SigningError(e.to_string()))
    }

    /// Hashes `op` for the given entry point and chain and attaches the
    /// owner's signature over that hash. Any signature already present on
    /// `op` is discarded.
    pub fn sign_user_operation(
        &self,
        mut op: UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> ProviderResult<SignedUserOperation> {
        op.signature = None;
        let hash = hash_user_operation(&op, entry_point, chain_id)?;
        let signature = self.sign_hash(hash.0)?;
        debug!("Signed user operation {} for sender {:?}", hash, op.sender);

        Ok(SignedUserOperation::new(op, hash, &signature.to_vec()))
    }
}

impl fmt::Debug for OwnerSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerSigner")
            .field("address", &self.address())
            .finish()
    }
}

/// Recovers the address that produced `signature` over `hash`.
pub fn recover_address(hash: UserOperationHash, signature: &[u8]) -> ProviderResult<Address> {
    let signature = Signature::try_from(signature)
        .map_err(|e| ProviderError::SigningError(e.to_string()))?;
    signature
        .recover(hash.0)
        .map_err(|e| ProviderError::SigningError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::derive_address;
    use crate::types::parse_bytes;

    const TEST_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn entry_point() -> Address {
        "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789"
            .parse()
            .unwrap()
    }

    fn op() -> UserOperation {
        UserOperation {
            sender: "0xAbC0000000000000000000000000000000000123"
                .parse()
                .unwrap(),
            nonce: "0x7".into(),
            init_code: "0x".into(),
            call_data: "0xb61d27f6".into(),
            signature: None,
            call_gas_limit: "0x2710".into(),
            verification_gas_limit: "0x2710".into(),
            pre_verification_gas: "0x402db0".into(),
            max_fee_per_gas: "0x17190c894e".into(),
            max_priority_fee_per_gas: "0x3812ed1a0".into(),
            paymaster_and_data: "0x".into(),
        }
    }

    #[test]
    fn signed_operation_recovers_to_owner() {
        let signer = OwnerSigner::from_private_key(TEST_KEY).unwrap();
        let owner = derive_address(TEST_KEY).unwrap();
        assert_eq!(signer.address(), owner);

        let first = hash_user_operation(&op(), entry_point(), 80001).unwrap();
        let second = hash_user_operation(&op(), entry_point(), 80001).unwrap();
        assert_eq!(first, second);

        let signed = signer
            .sign_user_operation(op(), entry_point(), 80001)
            .unwrap();
        assert_eq!(signed.hash(), first);

        let signature = parse_bytes("signature", signed.signature()).unwrap();
        assert_eq!(signature.len(), 65);
        assert!(matches!(signature[64], 27 | 28));
        assert_eq!(recover_address(signed.hash(), &signature).unwrap(), owner);
    }

    #[test]
    fn resigning_replaces_signature() {
        let signer = OwnerSigner::from_private_key(TEST_KEY).unwrap();
        let signed = signer
            .sign_user_operation(op(), entry_point(), 80001)
            .unwrap();

        let mut changed = signed.clone().into_unsigned();
        assert!(changed.signature.is_none());
        changed.nonce = "0x8".into();
        let resigned = signer
            .sign_user_operation(changed, entry_point(), 80001)
            .unwrap();
        assert_ne!(resigned.hash(), signed.hash());
        assert_ne!(resigned.signature(), signed.signature());
    }

    #[test]
    fn recovery_against_other_hash_does_not_match_owner() {
        let signer = OwnerSigner::from_private_key(TEST_KEY).unwrap();
        let signed = signer
            .sign_user_operation(op(), entry_point(), 80001)
            .unwrap();
        let signature = parse_bytes("signature", signed.signature()).unwrap();

        let other = hash_user_operation(&op(), entry_point(), 1).unwrap();
        let recovered = recover_address(other, &signature).unwrap();
        assert_ne!(recovered, signer.address());
    }

    #[test]
    fn malformed_key_is_a_signing_error() {
        assert!(matches!(
            OwnerSigner::from_private_key("0xnothex"),
            Err(ProviderError::SigningError(_))
        ));
    }

    #[test]
    fn debug_does_not_leak_key() {
        let signer = OwnerSigner::from_private_key(TEST_KEY).unwrap();
        assert!(!format!("{:?}", signer).contains("59c6995e"));
    }
}
