//! External liveness ping
//!
//! One `GET` of the configured URL after every completed cycle, for
//! healthchecks-style dead man's switches.

use async_trait::async_trait;
use failover_core::traits::LivenessPing;
use failover_core::{Error, Result};
use std::time::Duration;

/// Pings a fixed URL over HTTP
#[derive(Debug)]
pub struct HttpLivenessPing {
    url: String,
    client: reqwest::Client,
}

impl HttpLivenessPing {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl LivenessPing for HttpLivenessPing {
    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Ping request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::http(format!("Ping returned HTTP {}", response.status())));
        }
        Ok(())
    }
}
