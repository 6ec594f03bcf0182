// src/types.rs
use std::fmt;
use std::str::FromStr;

use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ProviderError, ProviderResult};

pub const JSONRPC_VERSION: &str = "2.0";
pub const SEND_USER_OPERATION_METHOD: &str = "eth_sendUserOperation";

/// ERC-4337 UserOperation (EntryPoint v0.6 layout) in the form bundlers accept
/// over JSON-RPC: every quantity and byte string is a `0x`-prefixed hex string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: String,
    pub init_code: String,
    pub call_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub call_gas_limit: String,
    pub verification_gas_limit: String,
    pub pre_verification_gas: String,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub paymaster_and_data: String,
}

/// A UserOperation that has been hashed and signed. It can only be produced by
/// the signer and exposes no mutable access, so the signature always matches
/// the fields it was computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUserOperation {
    op: UserOperation,
    hash: UserOperationHash,
}

impl SignedUserOperation {
    pub(crate) fn new(mut op: UserOperation, hash: UserOperationHash, signature: &[u8]) -> Self {
        op.signature = Some(hex_bytes(signature));
        Self { op, hash }
    }

    pub fn user_operation(&self) -> &UserOperation {
        &self.op
    }

    pub fn hash(&self) -> UserOperationHash {
        self.hash
    }

    pub fn signature(&self) -> &str {
        self.op.signature.as_deref().unwrap_or_default()
    }

    /// Gives the operation back without its signature, e.g. to change a field
    /// and sign again.
    pub fn into_unsigned(self) -> UserOperation {
        let mut op = self.op;
        op.signature = None;
        op
    }
}

impl Serialize for SignedUserOperation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.op.serialize(serializer)
    }
}

/// The call the smart account should execute on the owner's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl TargetCall {
    pub fn new(to: Address, data: Bytes, value: U256) -> Self {
        Self { to, data, value }
    }

    /// Parses a target given as strings. `value` may be decimal or `0x` hex.
    pub fn parse(to: &str, data: &str, value: &str) -> ProviderResult<Self> {
        let to = parse_address("target", to)?;
        let data = if data.is_empty() {
            Bytes::default()
        } else {
            parse_bytes("data", data)?
        };
        let value = if value.is_empty() {
            U256::zero()
        } else if value.starts_with("0x") {
            parse_quantity("value", value)?
        } else {
            U256::from_dec_str(value)
                .map_err(|e| ProviderError::EncodingError(format!("value: {}", e)))?
        };

        Ok(Self { to, data, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UserOperationHash(pub H256);

impl UserOperationHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_fixed_bytes()
    }
}

impl From<H256> for UserOperationHash {
    fn from(value: H256) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserOperationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// The JSON-RPC 2.0 request carrying a signed UserOperation to a bundler.
#[derive(Debug, Serialize)]
pub struct SubmissionEnvelope<'a> {
    pub id: u64,
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: (&'a SignedUserOperation, Address),
}

impl<'a> SubmissionEnvelope<'a> {
    pub fn send_user_operation(id: u64, op: &'a SignedUserOperation, entry_point: Address) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION,
            method: SEND_USER_OPERATION_METHOD,
            params: (op, entry_point),
        }
    }
}

/// The bundler's reply, kept verbatim. A non-2xx status or a JSON-RPC error
/// is a valid outcome, not a failure of the submission itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RpcReply {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl SubmissionResponse {
    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn reply(&self) -> Option<RpcReply> {
        serde_json::from_str(&self.body).ok()
    }

    /// The JSON-RPC `error` member, if the body carries one.
    pub fn rpc_error(&self) -> Option<RpcErrorObject> {
        self.reply().and_then(|r| r.error)
    }

    /// The UserOperation hash the bundler returned as `result`, if any.
    pub fn user_operation_hash(&self) -> Option<UserOperationHash> {
        let result = self.reply()?.result?;
        H256::from_str(result.as_str()?).ok().map(UserOperationHash)
    }
}

/// Formats a quantity as minimal `0x`-prefixed lowercase hex.
pub fn hex_quantity(value: U256) -> String {
    if value.is_zero() {
        "0x0".to_string()
    } else {
        format!("0x{:x}", value)
    }
}

pub fn hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a `0x`-prefixed hex quantity into a 256-bit word. Leading zeros are
/// accepted, so `0x1` and `0x0001` decode to the same value.
pub fn parse_quantity(field: &str, value: &str) -> ProviderResult<U256> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ProviderError::EncodingError(format!("{}: missing 0x prefix", field)))?;
    if digits.is_empty() {
        return Err(ProviderError::EncodingError(format!("{}: empty quantity", field)));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProviderError::EncodingError(format!("{}: invalid hex digits", field)));
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > 64 {
        return Err(ProviderError::EncodingError(format!(
            "{}: does not fit in 256 bits",
            field
        )));
    }
    if significant.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_str_radix(significant, 16)
        .map_err(|e| ProviderError::EncodingError(format!("{}: {:?}", field, e)))
}

/// Parses a `0x`-prefixed hex byte string; `0x` alone is the empty string.
pub fn parse_bytes(field: &str, value: &str) -> ProviderResult<Bytes> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ProviderError::EncodingError(format!("{}: missing 0x prefix", field)))?;
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| ProviderError::EncodingError(format!("{}: {}", field, e)))
}

pub fn parse_address(field: &str, value: &str) -> ProviderResult<Address> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.len() != 40 {
        return Err(ProviderError::InvalidKeyFormat(format!(
            "{}: expected 40 hex digits, got {}",
            field,
            digits.len()
        )));
    }
    Address::from_str(digits)
        .map_err(|e| ProviderError::InvalidKeyFormat(format!("{}: {}", field, e)))
}
