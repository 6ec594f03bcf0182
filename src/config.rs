// src/config.rs
use std::fmt;
use std::time::Duration;

use ethers::types::{Address, Bytes, U256};

use crate::address::derive_address;
use crate::error::{ProviderError, ProviderResult};
use crate::types::parse_address;

pub const DEFAULT_CALL_GAS_LIMIT: u64 = 0x2710;
pub const DEFAULT_VERIFICATION_GAS_LIMIT: u64 = 0x2710;
pub const DEFAULT_PRE_VERIFICATION_GAS: u64 = 0x402db0;
pub const DEFAULT_MAX_FEE_PER_GAS: u64 = 0x17190c894e;
pub const DEFAULT_MAX_PRIORITY_FEE_PER_GAS: u64 = 0x3812ed1a0;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gas policy for built UserOperations. Unset fields fall back to fixed
/// conservative defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GasConfig {
    pub call_gas_limit: Option<U256>,
    pub verification_gas_limit: Option<U256>,
    pub pre_verification_gas: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl GasConfig {
    pub fn call_gas_limit(&self) -> U256 {
        self.call_gas_limit
            .unwrap_or(U256::from(DEFAULT_CALL_GAS_LIMIT))
    }

    pub fn verification_gas_limit(&self) -> U256 {
        self.verification_gas_limit
            .unwrap_or(U256::from(DEFAULT_VERIFICATION_GAS_LIMIT))
    }

    pub fn pre_verification_gas(&self) -> U256 {
        self.pre_verification_gas
            .unwrap_or(U256::from(DEFAULT_PRE_VERIFICATION_GAS))
    }

    pub fn max_fee_per_gas(&self) -> U256 {
        self.max_fee_per_gas
            .unwrap_or(U256::from(DEFAULT_MAX_FEE_PER_GAS))
    }

    pub fn max_priority_fee_per_gas(&self) -> U256 {
        self.max_priority_fee_per_gas
            .unwrap_or(U256::from(DEFAULT_MAX_PRIORITY_FEE_PER_GAS))
    }
}

/// Where the UserOperation nonce comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NonceMode {
    /// The owner EOA's pending transaction count.
    #[default]
    OwnerPending,
    /// `EntryPoint.getNonce(sender, 0)`.
    EntryPoint,
}

#[derive(Clone)]
pub struct SmartAccountProviderConfig {
    pub owner_private_key: String,
    pub rpc_endpoint: String,
    /// Bundler URL; the RPC endpoint is used when unset.
    pub bundler_endpoint: Option<String>,
    pub entry_point_address: String,
    pub factory_address: String,
    pub chain_id: u64,
    pub salt: U256,
    pub gas: GasConfig,
    /// Copied verbatim into every built operation; empty when unsponsored.
    pub paymaster_and_data: Bytes,
    pub nonce_mode: NonceMode,
    pub request_timeout: Duration,
    /// Allow only one in-flight submission per provider.
    pub serialize_submissions: bool,
}

impl SmartAccountProviderConfig {
    pub fn new(
        owner_private_key: impl Into<String>,
        rpc_endpoint: impl Into<String>,
        entry_point_address: impl Into<String>,
        factory_address: impl Into<String>,
        chain_id: u64,
    ) -> Self {
        Self {
            owner_private_key: owner_private_key.into(),
            rpc_endpoint: rpc_endpoint.into(),
            bundler_endpoint: None,
            entry_point_address: entry_point_address.into(),
            factory_address: factory_address.into(),
            chain_id,
            salt: U256::zero(),
            gas: GasConfig::default(),
            paymaster_and_data: Bytes::default(),
            nonce_mode: NonceMode::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            serialize_submissions: true,
        }
    }

    pub fn bundler_endpoint(&self) -> &str {
        self.bundler_endpoint
            .as_deref()
            .unwrap_or(&self.rpc_endpoint)
    }

    pub fn validate(&self) -> ProviderResult<ValidatedAddresses> {
        for (name, value) in [
            ("owner private key", &self.owner_private_key),
            ("rpc endpoint", &self.rpc_endpoint),
            ("entry point address", &self.entry_point_address),
            ("factory address", &self.factory_address),
        ] {
            if value.trim().is_empty() {
                return Err(ProviderError::InvalidConfig(format!("{} is empty", name)));
            }
        }
        if matches!(&self.bundler_endpoint, Some(url) if url.trim().is_empty()) {
            return Err(ProviderError::InvalidConfig("bundler endpoint is empty".to_string()));
        }
        if self.chain_id == 0 {
            return Err(ProviderError::InvalidConfig("chain id must be non-zero".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(ProviderError::InvalidConfig(
                "request timeout must be non-zero".to_string(),
            ));
        }

        Ok(ValidatedAddresses {
            owner: derive_address(&self.owner_private_key)?,
            entry_point: parse_address("entry point", &self.entry_point_address)?,
            factory: parse_address("factory", &self.factory_address)?,
        })
    }
}

impl fmt::Debug for SmartAccountProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartAccountProviderConfig")
            .field("owner_private_key", &"<redacted>")
            .field("rpc_endpoint", &self.rpc_endpoint)
            .field("bundler_endpoint", &self.bundler_endpoint)
            .field("entry_point_address", &self.entry_point_address)
            .field("factory_address", &self.factory_address)
            .field("chain_id", &self.chain_id)
            .field("salt", &self.salt)
            .field("gas", &self.gas)
            .field("paymaster_and_data", &self.paymaster_and_data)
            .field("nonce_mode", &self.nonce_mode)
            .field("request_timeout", &self.request_timeout)
            .field("serialize_submissions", &self.serialize_submissions)
            .finish()
    }
}

/// Addresses resolved from a config that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedAddresses {
    pub owner: Address,
    pub entry_point: Address,
    pub factory: Address,
}
