use std::time::Duration;

use thiserror::Error;

/// Failure inside a provider adapter
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Configuration-class errors are the only ones that leave an adapter
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProviderError::MissingCredential(_))
    }

    /// Text suitable for showing next to a summary
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::MissingCredential(detail) => {
                format!("Regulatory air quality data is not configured ({detail}).")
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest_middleware::Error> for ProviderError {
    fn from(err: reqwest_middleware::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
