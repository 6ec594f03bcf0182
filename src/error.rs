// src/error.rs
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Chain call failed: {0}")]
    ChainCallError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Signing failed: {0}")]
    SigningError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type ProviderResult<T> = Result<T, ProviderError>;
