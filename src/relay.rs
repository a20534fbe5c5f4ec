//! Listener → executor relay.

use std::time::Duration;

use log::{error, info, warn};
use reqwest::Client;
use tokio::time::sleep;

use crate::config::ListenerConfig;
use crate::error::RelayError;
use crate::types::ImageReference;

/// Linear backoff step between attempts when more than one is allowed.
const RETRY_STEP: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct RelayClient {
    http: Client,
    executor_url: String,
    token: String,
    attempts: u32,
}

impl RelayClient {
    pub fn new(
        executor_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        attempts: u32,
    ) -> Result<Self, RelayError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            executor_url: executor_url.into(),
            token: token.into(),
            attempts: attempts.max(1),
        })
    }

    pub fn from_config(cfg: &ListenerConfig) -> Result<Self, RelayError> {
        Self::new(
            cfg.executor_url.clone(),
            cfg.out_token.clone(),
            Duration::from_secs(cfg.relay_timeout_secs),
            cfg.relay_attempts,
        )
    }

    /// Sends the batch once per allowed attempt until the executor accepts it.
    pub async fn relay(&self, images: &[ImageReference]) -> Result<(), RelayError> {
        let mut attempt = 1;
        loop {
            match self.send(images).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.attempts => {
                    warn!("Relay attempt {}/{} failed: {}", attempt, self.attempts, e);
                    sleep(RETRY_STEP * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, images: &[ImageReference]) -> Result<(), RelayError> {
        let response = self
            .http
            .post(&self.executor_url)
            .bearer_auth(&self.token)
            .json(images)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Fire-and-forget relay; the caller never learns the outcome.
    pub fn spawn(&self, images: Vec<ImageReference>) {
        if images.is_empty() {
            return;
        }
        let client = self.clone();
        tokio::spawn(async move {
            let names: Vec<&str> = images.iter().map(ImageReference::as_str).collect();
            match client.relay(&images).await {
                Ok(()) => info!("Update request sent for {:?}", names),
                Err(e) => error!("Update request for {:?} dropped: {}", names, e),
            }
        });
    }
}
