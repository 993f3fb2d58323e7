use crate::utils::error::{Result, SentinelError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;

/// Shared HTTP client for every feed; cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("geo-sentinel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        tracing::debug!("Making API request to: {} {:?}", url, query);
        let response = self.client.get(url).query(query).send().await?;

        tracing::debug!("API response status: {}", response.status());
        if !response.status().is_success() {
            return Err(SentinelError::HttpStatusError {
                endpoint: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.send(url, query).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let response = self.send(url, query).await?;
        Ok(response.text().await?)
    }
}
