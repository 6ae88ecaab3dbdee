//! Subscription activation: one GET to `SubscribeURL`, response body ignored.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Connect timeout for the confirmation call.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Confirmation request failed: {0}")]
    Network(String),
    #[error("Confirmation endpoint answered HTTP {0}")]
    Status(u16),
}

#[async_trait]
pub trait SubscriptionConfirmer: Send + Sync {
    async fn confirm(&self, subscribe_url: &str) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone)]
pub struct HttpSubscriptionConfirmer {
    client: reqwest::Client,
}

impl HttpSubscriptionConfirmer {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SubscriptionConfirmer for HttpSubscriptionConfirmer {
    async fn confirm(&self, subscribe_url: &str) -> Result<(), DispatchError> {
        let response = self
            .client
            .get(subscribe_url)
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DispatchError::Status(status.as_u16()))
        }
    }
}
