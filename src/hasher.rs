// src/hasher.rs
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;

use crate::error::{ProviderError, ProviderResult};
use crate::types::{parse_bytes, parse_quantity, UserOperation, UserOperationHash};

/// Field values of a UserOperation decoded from their wire hex strings.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DecodedFields {
    sender: Address,
    nonce: U256,
    init_code: Bytes,
    call_data: Bytes,
    call_gas_limit: U256,
    verification_gas_limit: U256,
    pre_verification_gas: U256,
    max_fee_per_gas: U256,
    max_priority_fee_per_gas: U256,
    paymaster_and_data: Bytes,
}

fn required<'a>(field: &str, value: &'a str) -> ProviderResult<&'a str> {
    if value.is_empty() {
        return Err(ProviderError::EncodingError(format!("{} is missing", field)));
    }
    Ok(value)
}

impl DecodedFields {
    fn from_op(op: &UserOperation) -> ProviderResult<Self> {
        let quantity = |field: &str, value: &str| parse_quantity(field, required(field, value)?);
        let bytes = |field: &str, value: &str| parse_bytes(field, required(field, value)?);

        Ok(Self {
            sender: op.sender,
            nonce: quantity("nonce", &op.nonce)?,
            init_code: bytes("initCode", &op.init_code)?,
            call_data: bytes("callData", &op.call_data)?,
            call_gas_limit: quantity("callGasLimit", &op.call_gas_limit)?,
            verification_gas_limit: quantity("verificationGasLimit", &op.verification_gas_limit)?,
            pre_verification_gas: quantity("preVerificationGas", &op.pre_verification_gas)?,
            max_fee_per_gas: quantity("maxFeePerGas", &op.max_fee_per_gas)?,
            max_priority_fee_per_gas: quantity(
                "maxPriorityFeePerGas",
                &op.max_priority_fee_per_gas,
            )?,
            paymaster_and_data: bytes("paymasterAndData", &op.paymaster_and_data)?,
        })
    }

    /// ABI encoding of the operation without its signature, with every
    /// dynamic byte field replaced by its keccak256 digest.
    fn pack(&self) -> Vec<u8> {
        encode(&[
            Token::Address(self.sender),
            Token::Uint(self.nonce),
            Token::FixedBytes(keccak256(&self.init_code).to_vec()),
            Token::FixedBytes(keccak256(&self.call_data).to_vec()),
            Token::Uint(self.call_gas_limit),
            Token::Uint(self.verification_gas_limit),
            Token::Uint(self.pre_verification_gas),
            Token::Uint(self.max_fee_per_gas),
            Token::Uint(self.max_priority_fee_per_gas),
            Token::FixedBytes(keccak256(&self.paymaster_and_data).to_vec()),
        ])
    }
}

/// ABI-packed fields of `op` as the entry point hashes them.
pub fn pack_user_operation(op: &UserOperation) -> ProviderResult<Bytes> {
    Ok(Bytes::from(DecodedFields::from_op(op)?.pack()))
}

/// Computes the ERC-4337 UserOperation hash:
/// `keccak256(abi.encode(keccak256(pack(op)), entryPoint, chainId))`.
///
/// The signature field is not part of the hash. Quantities are decoded to
/// 256-bit words first, so the result does not depend on how they were
/// written in hex.
pub fn hash_user_operation(
    op: &UserOperation,
    entry_point: Address,
    chain_id: u64,
) -> ProviderResult<UserOperationHash> {
    let packed = pack_user_operation(op)?;
    let op_hash = keccak256(&packed);
    let digest = keccak256(encode(&[
        Token::FixedBytes(op_hash.to_vec()),
        Token::Address(entry_point),
        Token::Uint(U256::from(chain_id)),
    ]));

    Ok(UserOperationHash(H256::from(digest)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // EntryPoint v0.6 vector: SimpleAccount deployment + execute on Goerli.
    fn vector_op() -> UserOperation {
        UserOperation {
            sender: "0x921f125a92930cabb2969ad9323261d3a2a784e7"
                .parse()
                .unwrap(),
            nonce: "0x0".into(),
            init_code: "0x9406cc6185a346906296840746125a0e449764545fbfb9cf00000000000000000000000043378ff8c70109ee4dbe85af34428ab0615ebd230000000000000000000000000000000000000000000000000000000000000000".into(),
            call_data: "0xb61d27f6000000000000000000000000a02bfd0ba5d182226627a933333ba92d1a60e234000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000600000000000000000000000000000000000000000000000000000000000000000".into(),
            signature: None,
            call_gas_limit: "0x816b4".into(),
            verification_gas_limit: "0x7a390".into(),
            pre_verification_gas: "0x19678".into(),
            max_fee_per_gas: "0x6507a5de".into(),
            max_priority_fee_per_gas: "0x6507a5c0".into(),
            paymaster_and_data: "0x".into(),
        }
    }

    fn entry_point() -> Address {
        "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789"
            .parse()
            .unwrap()
    }

    #[test]
    fn matches_reference_vector() {
        let op = vector_op();
        assert_eq!(
            hex::encode(keccak256(pack_user_operation(&op).unwrap())),
            "0f3fe7fc49990fb0faf26e30cf0cf56c9d74d90175a233cb294d0a3c76786143"
        );
        assert_eq!(
            hash_user_operation(&op, entry_point(), 5)
                .unwrap()
                .to_string(),
            "0x7bca0c9a2ffbd23c25c7d5e1df0520142c0c39454cee778c3201eef6a8a27f06"
        );
    }

    #[test]
    fn hashing_is_deterministic() {
        let op = vector_op();
        let first = hash_user_operation(&op, entry_point(), 80001).unwrap();
        let second = hash_user_operation(&op.clone(), entry_point(), 80001)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn hex_width_does_not_change_hash() {
        let op = vector_op();
        let mut padded = op.clone();
        padded.nonce = format!("0x{}", "0".repeat(64));
        padded.call_gas_limit = "0x000816b4".into();
        padded.max_fee_per_gas = "0x00000000006507a5de".into();
        assert_eq!(
            hash_user_operation(&op, entry_point(), 5).unwrap(),
            hash_user_operation(&padded, entry_point(), 5).unwrap()
        );
    }

    #[test]
    fn signature_is_excluded_from_hash() {
        let op = vector_op();
        let mut signed = op.clone();
        signed.signature = Some(format!("0x{}", "11".repeat(65)));
        assert_eq!(
            hash_user_operation(&op, entry_point(), 5).unwrap(),
            hash_user_operation(&signed, entry_point(), 5).unwrap()
        );
    }

    #[test]
    fn hash_is_bound_to_entry_point_and_chain() {
        let op = vector_op();
        let base = hash_user_operation(&op, entry_point(), 5).unwrap();
        assert_ne!(
            base,
            hash_user_operation(&op, entry_point(), 80001).unwrap()
        );
        assert_ne!(base, hash_user_operation(&op, Address::zero(), 5).unwrap());

        let mut changed = op;
        changed.nonce = "0x1".into();
        assert_ne!(
            base,
            hash_user_operation(&changed, entry_point(), 5).unwrap()
        );
    }

    #[test]
    fn missing_or_malformed_fields_fail() {
        let mut op = vector_op();
        op.call_gas_limit = String::new();
        assert!(matches!(
            hash_user_operation(&op, entry_point(), 5),
            Err(ProviderError::EncodingError(_))
        ));

        let mut op = vector_op();
        op.call_data = "0xabc".into();
        assert!(matches!(
            hash_user_operation(&op, entry_point(), 5),
            Err(ProviderError::EncodingError(_))
        ));
    }
}
