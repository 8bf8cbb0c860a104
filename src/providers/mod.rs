//! Upstream provider adapters
//!
//! Every adapter talks to one external feed and converts its payload into
//! the domain records in [`crate::models::feeds`]. Adapters are soft: apart
//! from configuration problems they log and return an empty result instead
//! of an error, so one bad feed never sinks a summary.

pub mod airnow;
pub mod error;
pub mod open_meteo;
pub mod openaq;
pub mod pollen_page;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result as AnyResult};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub use airnow::AirNowClient;
pub use error::{ProviderError, Result};
pub use open_meteo::OpenMeteoClient;
pub use openaq::OpenAqClient;
pub use pollen_page::PollenPageClient;

use crate::config::ProvidersConfig;
use crate::models::Provider;

const USER_AGENT: &str = concat!("Aircast/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with transient-failure retries
pub fn build_client(config: &ProvidersConfig) -> AnyResult<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(USER_AGENT)
        .build()
        .with_context(|| "Failed to create HTTP client")?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Run a provider call under its time budget, substituting `fallback` when
/// the budget runs out
pub async fn bounded<T, F>(provider: Provider, budget: Duration, call: F, fallback: T) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(value) => value,
        Err(_) => {
            warn!("{} skipped: {}", provider, ProviderError::Timeout(budget));
            fallback
        }
    }
}

/// Send a request and decode a JSON body, mapping non-2xx to
/// [`ProviderError::Status`]
pub(crate) async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        debug!("Provider answered with status {}", status);
        return Err(ProviderError::Status(status));
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Send a request and return the body text, mapping non-2xx to
/// [`ProviderError::Status`]
pub(crate) async fn get_text(request: RequestBuilder) -> Result<String> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status(status));
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_returns_fallback_on_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            vec![1, 2, 3]
        };
        let result = bounded(Provider::OpenAq, Duration::from_millis(10), slow, Vec::new()).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_bounded_passes_through_fast_calls() {
        let fast = async { Some(42) };
        let result = bounded(Provider::OpenMeteo, Duration::from_secs(1), fast, None).await;
        assert_eq!(result, Some(42));
    }

    #[test]
    fn test_build_client() {
        let config = ProvidersConfig::default();
        assert!(build_client(&config).is_ok());
    }
}
