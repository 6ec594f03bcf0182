//! Client-side ERC-4337 pipeline: build a UserOperation for a smart account,
//! hash it for an entry point and chain, sign it with the owner key and send
//! it to a bundler with `eth_sendUserOperation`.

pub mod address;
pub mod builder;
pub mod chain;
pub mod config;
pub mod error;
pub mod hasher;
pub mod provider;
pub mod resolver;
pub mod signer;
pub mod submitter;
pub mod types;

pub use crate::address::derive_address;
pub use crate::chain::{ChainDataSource, EthersChain};
pub use crate::config::{GasConfig, NonceMode, SmartAccountProviderConfig};
pub use crate::error::{ProviderError, ProviderResult};
pub use crate::hasher::hash_user_operation;
pub use crate::provider::{HttpSmartAccountProvider, SendOutcome, SmartAccountProvider};
pub use crate::signer::{recover_address, OwnerSigner};
pub use crate::submitter::{HttpSubmissionChannel, SubmissionChannel};
pub use crate::types::{
    SignedUserOperation, SubmissionResponse, TargetCall, UserOperation, UserOperationHash,
};
