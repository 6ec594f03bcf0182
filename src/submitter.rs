// src/submitter.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::Address;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::types::{SignedUserOperation, SubmissionEnvelope, SubmissionResponse};

/// Delivers a JSON-RPC request body and hands back whatever came back.
#[async_trait]
pub trait SubmissionChannel: Send + Sync {
    async fn post_json(&self, endpoint: &str, body: String) -> ProviderResult<SubmissionResponse>;
}

/// HTTP(S) channel built on reqwest.
#[derive(Debug, Clone)]
pub struct HttpSubmissionChannel {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSubmissionChannel {
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::TransportError(e.to_string()))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl SubmissionChannel for HttpSubmissionChannel {
    async fn post_json(&self, endpoint: &str, body: String) -> ProviderResult<SubmissionResponse> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout)
            } else {
                ProviderError::TransportError(e.to_string())
            }
        };

        let response = self
            .client
            .post(endpoint)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(&map_err)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(&map_err)?;
        Ok(SubmissionResponse { status, body })
    }
}

/// Wraps signed UserOperations in `eth_sendUserOperation` requests.
pub struct Submitter<S> {
    channel: S,
    next_id: AtomicU64,
}

impl<S: SubmissionChannel> Submitter<S> {
    pub fn new(channel: S) -> Self {
        Self {
            channel,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn channel(&self) -> &S {
        &self.channel
    }

    /// Serialises the request body for `op`.
    pub fn envelope(
        &self,
        op: &SignedUserOperation,
        entry_point: Address,
    ) -> ProviderResult<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = SubmissionEnvelope::send_user_operation(id, op, entry_point);
        serde_json::to_string(&envelope)
            .map_err(|e| ProviderError::EncodingError(e.to_string()))
    }

    /// Posts `op` to the bundler. Only transport failures are errors; the
    /// bundler's verdict comes back in the response untouched.
    pub async fn submit(
        &self,
        op: &SignedUserOperation,
        entry_point: Address,
        endpoint: &str,
    ) -> ProviderResult<SubmissionResponse> {
        let body = self.envelope(op, entry_point)?;
        debug!("Submitting user operation {} to {}", op.hash(), endpoint);

        let response = match self.channel.post_json(endpoint, body).await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to reach bundler at {}: {}", endpoint, e);
                return Err(e);
            }
        };

        if !response.is_http_success() {
            warn!("Bundler answered with HTTP {}", response.status);
        } else if let Some(rpc_error) = response.rpc_error() {
            warn!(
                "Bundler rejected user operation {}: {} ({}), data {:?}",
                op.hash(),
                rpc_error.message,
                rpc_error.code,
                rpc_error.data
            );
        } else {
            info!("Bundler accepted user operation {}", op.hash());
        }

        Ok(response)
    }
}
