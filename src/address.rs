// src/address.rs
use ethers::core::k256::ecdsa::SigningKey;
use ethers::types::Address;
use ethers::utils::secret_key_to_address;

use crate::error::{ProviderError, ProviderResult};

/// Parses a hex secp256k1 private key (with or without `0x`).
pub fn parse_signing_key(private_key_hex: &str) -> ProviderResult<SigningKey> {
    let digits = private_key_hex
        .strip_prefix("0x")
        .unwrap_or(private_key_hex);
    if digits.len() != 64 {
        return Err(ProviderError::InvalidKeyFormat(format!(
            "expected 64 hex digits, got {}",
            digits.len()
        )));
    }
    let bytes = hex::decode(digits)
        .map_err(|e| ProviderError::InvalidKeyFormat(e.to_string()))?;

    // Rejects zero and scalars at or above the curve order.
    SigningKey::from_slice(&bytes).map_err(|_| {
        ProviderError::InvalidKeyFormat("scalar out of range for secp256k1".to_string())
    })
}

/// Returns the externally-owned account address for a hex private key.
pub fn derive_address(private_key_hex: &str) -> ProviderResult<Address> {
    let key = parse_signing_key(private_key_hex)?;
    Ok(secret_key_to_address(&key))
}
