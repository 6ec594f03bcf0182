// src/builder.rs
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

use crate::config::GasConfig;
use crate::types::{hex_bytes, hex_quantity, TargetCall, UserOperation};

const EXECUTE_SIGNATURE: &str = "execute(address,uint256,bytes)";

/// Encodes `target` as the smart account's `execute(dest, value, func)` call.
pub fn encode_execute(target: &TargetCall) -> Bytes {
    let mut call_data = id(EXECUTE_SIGNATURE).to_vec();
    call_data.extend(encode(&[
        Token::Address(target.to),
        Token::Uint(target.value),
        Token::Bytes(target.data.to_vec()),
    ]));
    Bytes::from(call_data)
}

/// Assembles unsigned UserOperations under a fixed gas policy.
#[derive(Debug, Clone, Default)]
pub struct UserOperationBuilder {
    gas: GasConfig,
    paymaster_and_data: Bytes,
}

impl UserOperationBuilder {
    pub fn new(gas: GasConfig) -> Self {
        Self {
            gas,
            paymaster_and_data: Bytes::default(),
        }
    }

    pub fn with_paymaster_and_data(mut self, paymaster_and_data: Bytes) -> Self {
        self.paymaster_and_data = paymaster_and_data;
        self
    }

    /// `init_code` must be empty when the account is already deployed; the
    /// bundler deploys the account through it otherwise.
    pub fn build(
        &self,
        sender: Address,
        nonce: U256,
        target: &TargetCall,
        init_code: &Bytes,
    ) -> UserOperation {
        UserOperation {
            sender,
            nonce: hex_quantity(nonce),
            init_code: hex_bytes(init_code),
            call_data: hex_bytes(&encode_execute(target)),
            signature: None,
            call_gas_limit: hex_quantity(self.gas.call_gas_limit()),
            verification_gas_limit: hex_quantity(self.gas.verification_gas_limit()),
            pre_verification_gas: hex_quantity(self.gas.pre_verification_gas()),
            max_fee_per_gas: hex_quantity(self.gas.max_fee_per_gas()),
            max_priority_fee_per_gas: hex_quantity(self.gas.max_priority_fee_per_gas()),
            paymaster_and_data: hex_bytes(&self.paymaster_and_data),
        }
    }
}
