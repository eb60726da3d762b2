use crate::errors::AppError;
use crate::models::{Candidate, TraitRecord};
use crate::names;
use crate::wallet::WalletBatch;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing;

pub const DEFAULT_MONKEY_API: &str = "https://monkey.banano.cc";

/// Idle connections kept per host by the shared client.
const MAX_IDLE_PER_HOST: usize = 100;

/// Attempts made for a render fetch before giving up.
const RENDER_ATTEMPTS: usize = 4;

#[derive(Serialize)]
struct TraitRequest<'a> {
    addresses: &'a [String],
}

/// Client for the monKey trait and render endpoints.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct MonkeyApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl MonkeyApiClient {
    /// Creates a new `MonkeyApiClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The monKey server, e.g. `https://monkey.banano.cc`.
    /// * `timeout` - Per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create monKey client: {}", e))
            })?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn traits_url(&self) -> String {
        format!("{}/api/v1/monkey/dtl", self.base_url)
    }

    fn render_url(&self, address: &str) -> Result<reqwest::Url, AppError> {
        reqwest::Url::parse_with_params(
            &format!("{}/api/v1/monkey/{}", self.base_url, address),
            &[("format", "svg")],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))
    }

    /// Fetches traits for a whole batch in one request and merges each record
    /// with its wallet secret.
    ///
    /// Records for addresses not in the batch and records that fail to decode
    /// are skipped.
    pub async fn fetch_traits(&self, batch: &WalletBatch) -> Result<Vec<Candidate>, AppError> {
        let response = self
            .client
            .post(self.traits_url())
            .json(&TraitRequest {
                addresses: batch.addresses(),
            })
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("trait request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UnexpectedStatus(status.as_u16()));
        }

        let mut records: HashMap<String, Map<String, Value>> = response
            .json()
            .await
            .map_err(|e| AppError::Decode(format!("could not decode trait response: {}", e)))?;

        let mut candidates = Vec::with_capacity(batch.len());
        for address in batch.addresses() {
            let Some(fields) = records.remove(address) else {
                continue;
            };
            let Some(secret) = batch.secret_for(address) else {
                continue;
            };
            match TraitRecord::try_from(fields) {
                Ok(record) => candidates.push(Candidate::new(
                    address.clone(),
                    secret.to_string(),
                    names::silly_name(),
                    record,
                )),
                Err(e) => tracing::debug!("Skipping undecodable record for {}: {}", address, e),
            }
        }

        if !records.is_empty() {
            tracing::debug!(
                "Trait response contained {} addresses that were not requested",
                records.len()
            );
        }

        Ok(candidates)
    }

    /// Fetches the SVG render of `address`.
    pub async fn fetch_svg(&self, address: &str) -> Result<Vec<u8>, AppError> {
        if address.is_empty() {
            return Err(AppError::ExternalApiError(
                "cannot fetch a monKey for an empty address".to_string(),
            ));
        }
        let url = self.render_url(address)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("render request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UnexpectedStatus(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("could not read render: {}", e)))?;
        Ok(bytes.to_vec())
    }

    /// [`fetch_svg`](Self::fetch_svg) with jittered exponential backoff.
    pub async fn fetch_svg_with_retry(&self, address: &str) -> Result<Vec<u8>, AppError> {
        // 200ms, 400ms, 800ms
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(100)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(RENDER_ATTEMPTS - 1);

        Retry::start(strategy, || async {
            self.fetch_svg(address).await.inspect_err(|e| {
                tracing::warn!("Render fetch for {} failed: {}", address, e);
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = MonkeyApiClient::new("https://example.com/", Duration::from_secs(5));
        assert!(client.is_ok());
        let client = client.unwrap();
        assert_eq!(client.base_url(), "https://example.com");
        assert_eq!(client.traits_url(), "https://example.com/api/v1/monkey/dtl");
    }

    #[test]
    fn test_render_url_requests_svg() {
        let client = MonkeyApiClient::with_client(reqwest::Client::new(), "http://localhost:9");
        let url = client.render_url("ban_1abc").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9/api/v1/monkey/ban_1abc?format=svg");
    }

    #[tokio::test]
    async fn test_empty_address_is_rejected() {
        let client = MonkeyApiClient::with_client(reqwest::Client::new(), "http://localhost:9");
        assert!(client.fetch_svg("").await.is_err());
    }
}
