// src/provider.rs
use std::future::Future;
use std::sync::Arc;

use ethers::providers::{Http, Provider};
use ethers::types::{Address, Bytes, U256};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::builder::UserOperationBuilder;
use crate::chain::{pending_nonce, ChainDataSource, EntryPointNonceReader, EthersChain};
use crate::config::{NonceMode, SmartAccountProviderConfig, ValidatedAddresses};
use crate::error::{ProviderError, ProviderResult};
use crate::resolver::SmartAccountResolver;
use crate::signer::OwnerSigner;
use crate::submitter::{HttpSubmissionChannel, SubmissionChannel, Submitter};
use crate::types::{SignedUserOperation, SubmissionResponse, TargetCall, UserOperation};

pub type HttpSmartAccountProvider =
    SmartAccountProvider<EthersChain<Provider<Http>>, HttpSubmissionChannel>;

/// Result of a submission: the operation as sent plus the bundler's reply.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub operation: SignedUserOperation,
    pub response: SubmissionResponse,
}

/// Session bound to one owner key, one chain client and one pair of
/// entry point / factory contracts.
pub struct SmartAccountProvider<C, S> {
    config: SmartAccountProviderConfig,
    addresses: ValidatedAddresses,
    chain: C,
    signer: OwnerSigner,
    resolver: SmartAccountResolver,
    nonce_reader: EntryPointNonceReader,
    builder: UserOperationBuilder,
    submitter: Submitter<S>,
    submission_gate: Option<Mutex<()>>,
}

impl HttpSmartAccountProvider {
    /// Builds a provider talking JSON-RPC over HTTP to `config.rpc_endpoint`.
    pub fn connect(config: SmartAccountProviderConfig) -> ProviderResult<Self> {
        let client = Provider::<Http>::try_from(config.rpc_endpoint.as_str())
            .map_err(|e| ProviderError::InvalidConfig(format!("rpc endpoint: {}", e)))?;
        let channel = HttpSubmissionChannel::new(config.request_timeout)?;

        Self::with_parts(config, EthersChain::new(Arc::new(client)), channel)
    }
}

impl<C, S> SmartAccountProvider<C, S>
where
    C: ChainDataSource,
    S: SubmissionChannel,
{
    pub fn with_parts(
        config: SmartAccountProviderConfig,
        chain: C,
        channel: S,
    ) -> ProviderResult<Self> {
        let addresses = config.validate()?;
        let signer = OwnerSigner::from_private_key(&config.owner_private_key)?;
        let resolver = SmartAccountResolver::new(addresses.factory)?;
        let nonce_reader = EntryPointNonceReader::new(addresses.entry_point)?;
        let builder = UserOperationBuilder::new(config.gas.clone())
            .with_paymaster_and_data(config.paymaster_and_data.clone());
        let submission_gate = config.serialize_submissions.then(|| Mutex::new(()));

        info!(
            "Initialized smart account provider for owner {:?} on chain {}",
            addresses.owner, config.chain_id
        );

        Ok(Self {
            config,
            addresses,
            chain,
            signer,
            resolver,
            nonce_reader,
            builder,
            submitter: Submitter::new(channel),
            submission_gate,
        })
    }

    pub fn owner(&self) -> Address {
        self.addresses.owner
    }

    pub fn entry_point(&self) -> Address {
        self.addresses.entry_point
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    pub fn config(&self) -> &SmartAccountProviderConfig {
        &self.config
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn submitter(&self) -> &Submitter<S> {
        &self.submitter
    }

    pub async fn pending_nonce(&self) -> ProviderResult<u64> {
        pending_nonce(&self.chain, self.addresses.owner).await
    }

    pub async fn smart_account_address(&self, salt: U256) -> ProviderResult<Address> {
        self.resolver
            .resolve_address(&self.chain, self.addresses.owner, salt)
            .await
    }

    /// Builds an unsigned operation for `target` from the configured salt.
    pub async fn build_user_operation(&self, target: &TargetCall) -> ProviderResult<UserOperation> {
        self.build_guarded(target, &CancellationToken::new()).await
    }

    pub fn sign_user_operation(&self, op: UserOperation) -> ProviderResult<SignedUserOperation> {
        self.signer
            .sign_user_operation(op, self.addresses.entry_point, self.config.chain_id)
    }

    pub async fn submit(&self, op: &SignedUserOperation) -> ProviderResult<SubmissionResponse> {
        self.submitter
            .submit(op, self.addresses.entry_point, self.config.bundler_endpoint())
            .await
    }

    /// Runs the whole pipeline for `target`: nonce, sender, build, hash,
    /// sign, submit.
    ///
    /// Every network step is bounded by the configured request timeout and
    /// aborts with `Cancelled` as soon as `cancel` fires. Nothing is sent
    /// once cancellation has been observed. Resubmitting the same operation
    /// is rejected by the bundler because its nonce is spent.
    pub async fn send_user_operation(
        &self,
        target: &TargetCall,
        cancel: &CancellationToken,
    ) -> ProviderResult<SendOutcome> {
        let _permit = match &self.submission_gate {
            Some(gate) => Some(tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                guard = gate.lock() => guard,
            }),
            None => None,
        };

        let op = self.build_guarded(target, cancel).await?;
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let operation = self.sign_user_operation(op)?;
        let response = self.guarded(cancel, self.submit(&operation)).await?;

        Ok(SendOutcome {
            operation,
            response,
        })
    }

    async fn build_guarded(
        &self,
        target: &TargetCall,
        cancel: &CancellationToken,
    ) -> ProviderResult<UserOperation> {
        let owner = self.addresses.owner;
        let salt = self.config.salt;

        let (sender, nonce) = match self.config.nonce_mode {
            NonceMode::OwnerPending => {
                let nonce = self
                    .guarded(cancel, pending_nonce(&self.chain, owner))
                    .await?;
                let sender = self
                    .guarded(cancel, self.smart_account_address(salt))
                    .await?;
                (sender, U256::from(nonce))
            }
            NonceMode::EntryPoint => {
                let sender = self
                    .guarded(cancel, self.smart_account_address(salt))
                    .await?;
                let nonce = self
                    .guarded(cancel, self.nonce_reader.nonce(&self.chain, sender))
                    .await?;
                (sender, nonce)
            }
        };

        let deployed = self
            .guarded(cancel, self.resolver.is_deployed(&self.chain, sender))
            .await?;
        let init_code = if deployed {
            Bytes::default()
        } else {
            self.resolver.init_code(owner, salt)?
        };
        debug!(
            "Building user operation: sender {:?}, nonce {}, deployed {}",
            sender, nonce, deployed
        );

        Ok(self.builder.build(sender, nonce, target, &init_code))
    }

    async fn guarded<T, F>(&self, cancel: &CancellationToken, fut: F) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>>,
    {
        let timeout = self.config.request_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = tokio::time::timeout(timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            },
        }
    }
}
