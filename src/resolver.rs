// src/resolver.rs
use ethers::abi::parse_abi;
use ethers::contract::BaseContract;
use ethers::types::{Address, Bytes, U256};
use tracing::debug;

use crate::chain::ChainDataSource;
use crate::error::{ProviderError, ProviderResult};

const FACTORY_ABI: &[&str] = &[
    "function getAddress(address owner, uint256 salt) view returns (address)",
    "function createAccount(address owner, uint256 salt) returns (address)",
];

/// Talks to a SimpleAccount-style factory to find and deploy smart accounts.
pub struct SmartAccountResolver {
    factory: Address,
    contract: BaseContract,
}

impl SmartAccountResolver {
    pub fn new(factory: Address) -> ProviderResult<Self> {
        let abi = parse_abi(FACTORY_ABI)
            .map_err(|e| ProviderError::EncodingError(e.to_string()))?;
        Ok(Self {
            factory,
            contract: BaseContract::from(abi),
        })
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    /// Counterfactual account address for `(owner, salt)`, via the factory's
    /// `getAddress` view. Nothing is deployed.
    pub async fn resolve_address<C>(
        &self,
        chain: &C,
        owner: Address,
        salt: U256,
    ) -> ProviderResult<Address>
    where
        C: ChainDataSource + ?Sized,
    {
        let data = self
            .contract
            .encode("getAddress", (owner, salt))
            .map_err(|e| ProviderError::EncodingError(e.to_string()))?;
        let output = chain.call(self.factory, data).await?;
        let account: Address = self
            .contract
            .decode_output("getAddress", output)
            .map_err(|e| ProviderError::ChainCallError(format!("getAddress: {}", e)))?;

        debug!(
            "Smart account for owner {:?} salt {}: {:?}",
            owner, salt, account
        );
        Ok(account)
    }

    pub async fn is_deployed<C>(&self, chain: &C, account: Address) -> ProviderResult<bool>
    where
        C: ChainDataSource + ?Sized,
    {
        Ok(!chain.code_at(account).await?.is_empty())
    }

    /// `initCode` deploying the account: factory address followed by the
    /// `createAccount(owner, salt)` call.
    pub fn init_code(&self, owner: Address, salt: U256) -> ProviderResult<Bytes> {
        let call = self
            .contract
            .encode("createAccount", (owner, salt))
            .map_err(|e| ProviderError::EncodingError(e.to_string()))?;

        let mut init_code = self.factory.as_bytes().to_vec();
        init_code.extend_from_slice(&call);
        Ok(Bytes::from(init_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::stub::StubChain;
    use crate::types::hex_bytes;

    fn factory() -> Address {
        "0x9406Cc6185a346906296840746125a0E44976454"
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn resolves_same_address_for_same_inputs() {
        let chain = StubChain::new(factory(), Address::zero(), 0);
        let resolver = SmartAccountResolver::new(factory()).unwrap();
        let owner = Address::repeat_byte(0x42);
        let salt = U256::from(7u64);

        let first = resolver.resolve_address(&chain, owner, salt).await.unwrap();
        let second = resolver.resolve_address(&chain, owner, salt).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, StubChain::counterfactual(owner, salt));

        let other_salt = resolver
            .resolve_address(&chain, owner, U256::from(8u64))
            .await
            .unwrap();
        assert_ne!(first, other_salt);
    }

    #[tokio::test]
    async fn wrong_factory_is_a_chain_call_error() {
        let chain = StubChain::new(factory(), Address::zero(), 0);
        let wrong_factory = Address::repeat_byte(0x01);
        let resolver = SmartAccountResolver::new(wrong_factory).unwrap();
        assert!(matches!(
            resolver
                .resolve_address(&chain, Address::zero(), U256::zero())
                .await,
            Err(ProviderError::ChainCallError(_))
        ));
    }

    #[tokio::test]
    async fn reports_deployment_state() {
        let chain = StubChain::new(factory(), Address::zero(), 0);
        let resolver = SmartAccountResolver::new(factory()).unwrap();
        let account = Address::repeat_byte(0x55);

        assert!(!resolver.is_deployed(&chain, account).await.unwrap());
        chain.deploy(account);
        assert!(resolver.is_deployed(&chain, account).await.unwrap());
    }

    #[test]
    fn init_code_prefixes_factory() {
        let resolver = SmartAccountResolver::new(factory()).unwrap();
        let owner: Address = "0x43378ff8c70109ee4dbe85af34428ab0615ebd23"
            .parse()
            .unwrap();
        assert_eq!(
            hex_bytes(&resolver.init_code(owner, U256::zero()).unwrap()),
            "0x9406cc6185a346906296840746125a0e449764545fbfb9cf00000000000000000000000043378ff8c70109ee4dbe85af34428ab0615ebd230000000000000000000000000000000000000000000000000000000000000000"
        );
    }
}
