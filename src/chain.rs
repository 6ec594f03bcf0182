// src/chain.rs
use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::parse_abi;
use ethers::contract::BaseContract;
use ethers::providers::Middleware;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, TransactionRequest, U256};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

const ENTRY_POINT_ABI: &[&str] = &[
    "function getNonce(address sender, uint192 key) view returns (uint256)",
];

/// Read-only view of the chain used by the pipeline.
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    /// Transaction count of `account` including transactions not yet mined.
    async fn pending_nonce(&self, account: Address) -> ProviderResult<u64>;

    /// `eth_call` against `contract` with ABI-encoded `data`.
    async fn call(&self, contract: Address, data: Bytes) -> ProviderResult<Bytes>;

    /// Deployed bytecode at `address`; empty when nothing is deployed.
    async fn code_at(&self, address: Address) -> ProviderResult<Bytes>;
}

/// `ChainDataSource` backed by an ethers middleware stack.
#[derive(Debug, Clone)]
pub struct EthersChain<M> {
    client: Arc<M>,
}

impl<M: Middleware> EthersChain<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainDataSource for EthersChain<M> {
    async fn pending_nonce(&self, account: Address) -> ProviderResult<u64> {
        let count = self
            .client
            .get_transaction_count(account, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| ProviderError::ChainCallError(e.to_string()))?;

        if count > U256::from(u64::MAX) {
            return Err(ProviderError::ChainCallError(format!("nonce {} exceeds u64", count)));
        }
        Ok(count.as_u64())
    }

    async fn call(&self, contract: Address, data: Bytes) -> ProviderResult<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(contract).data(data).into();
        self.client
            .call(&tx, None)
            .await
            .map_err(|e| ProviderError::ChainCallError(e.to_string()))
    }

    async fn code_at(&self, address: Address) -> ProviderResult<Bytes> {
        self.client
            .get_code(address, None)
            .await
            .map_err(|e| ProviderError::ChainCallError(e.to_string()))
    }
}

/// Looks up the owner's pending nonce.
///
/// The value reflects pending state at read time only. Two submissions that
/// read it concurrently for the same owner get the same nonce and the bundler
/// rejects the later one; callers that need ordering must serialise sends.
pub async fn pending_nonce<C>(chain: &C, owner: Address) -> ProviderResult<u64>
where
    C: ChainDataSource + ?Sized,
{
    let nonce = chain.pending_nonce(owner).await?;
    debug!("Pending nonce for {:?}: {}", owner, nonce);
    Ok(nonce)
}

/// Reads the account's sequential nonce (key 0) from the entry point.
pub struct EntryPointNonceReader {
    entry_point: Address,
    contract: BaseContract,
}

impl EntryPointNonceReader {
    pub fn new(entry_point: Address) -> ProviderResult<Self> {
        let abi = parse_abi(ENTRY_POINT_ABI)
            .map_err(|e| ProviderError::EncodingError(e.to_string()))?;
        Ok(Self {
            entry_point,
            contract: BaseContract::from(abi),
        })
    }

    pub async fn nonce<C>(&self, chain: &C, sender: Address) -> ProviderResult<U256>
    where
        C: ChainDataSource + ?Sized,
    {
        let data = self
            .contract
            .encode("getNonce", (sender, U256::zero()))
            .map_err(|e| ProviderError::EncodingError(e.to_string()))?;
        let output = chain.call(self.entry_point, data).await?;
        let nonce: U256 = self
            .contract
            .decode_output("getNonce", output)
            .map_err(|e| ProviderError::ChainCallError(format!("getNonce: {}", e)))?;

        debug!("Entry point nonce for {:?}: {}", sender, nonce);
        Ok(nonce)
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use ethers::abi::{decode, encode, ParamType, Token};
    use ethers::utils::{id, keccak256};

    use super::*;

    /// In-memory chain with a SimpleAccount-style factory and entry point.
    #[derive(Default)]
    pub struct StubChain {
        pub nonce: u64,
        pub entry_point_nonce: u64,
        pub factory: Address,
        pub entry_point: Address,
        pub code: Mutex<HashMap<Address, Bytes>>,
        pub unreachable: bool,
        pub delay: Option<Duration>,
        pub nonce_reads: AtomicUsize,
        pub calls: AtomicUsize,
    }

    impl StubChain {
        pub fn new(factory: Address, entry_point: Address, nonce: u64) -> Self {
            Self {
                nonce,
                factory,
                entry_point,
                ..Default::default()
            }
        }

        /// Address the stub factory reports for (owner, salt).
        pub fn counterfactual(owner: Address, salt: U256) -> Address {
            let digest = keccak256(encode(&[Token::Address(owner), Token::Uint(salt)]));
            Address::from_slice(&digest[12..])
        }

        pub fn deploy(&self, address: Address) {
            self.code
                .lock()
                .unwrap()
                .insert(address, Bytes::from(vec![0x60, 0x80]));
        }
    }

    #[async_trait]
    impl ChainDataSource for StubChain {
        async fn pending_nonce(&self, _account: Address) -> ProviderResult<u64> {
            self.nonce_reads.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.unreachable {
                return Err(ProviderError::ChainCallError("connection refused".into()));
            }
            Ok(self.nonce)
        }

        async fn call(&self, contract: Address, data: Bytes) -> ProviderResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(ProviderError::ChainCallError("connection refused".into()));
            }
            let (selector, args) = data.split_at(4);
            if contract == self.factory && selector == id("getAddress(address,uint256)") {
                let params = [ParamType::Address, ParamType::Uint(256)];
                let tokens = decode(&params, args).unwrap();
                let owner = tokens[0].clone().into_address().unwrap();
                let salt = tokens[1].clone().into_uint().unwrap();
                let account = Self::counterfactual(owner, salt);
                return Ok(encode(&[Token::Address(account)]).into());
            }
            if contract == self.entry_point && selector == id("getNonce(address,uint192)") {
                let nonce = U256::from(self.entry_point_nonce);
                return Ok(encode(&[Token::Uint(nonce)]).into());
            }
            Err(ProviderError::ChainCallError("execution reverted".into()))
        }

        async fn code_at(&self, address: Address) -> ProviderResult<Bytes> {
            Ok(self
                .code
                .lock()
                .unwrap()
                .get(&address)
                .cloned()
                .unwrap_or_default())
        }
    }
}
