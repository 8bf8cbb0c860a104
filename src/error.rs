//! Error types and handling for the Aircast service

use thiserror::Error;

use crate::providers::ProviderError;

/// Main error type for the Aircast service
#[derive(Error, Debug)]
pub enum AircastError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream provider errors that could not be absorbed
    #[error("API error: {message}")]
    Api { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Page scraping errors
    #[error("Scrape error: {message}")]
    Scrape { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl AircastError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new scrape error
    pub fn scrape<S: Into<String>>(message: S) -> Self {
        Self::Scrape {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Whether the caller sent something unusable
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, AircastError::Validation { .. })
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            AircastError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            AircastError::Api { .. } => {
                "Unable to reach air quality providers. Please try again later.".to_string()
            }
            AircastError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            AircastError::Scrape { message } => {
                format!("Pollen page could not be read: {message}")
            }
            AircastError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            AircastError::General { message } => message.clone(),
        }
    }
}

impl From<ProviderError> for AircastError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MissingCredential(detail) => AircastError::config(detail),
            ProviderError::Parse(detail) => AircastError::scrape(detail),
            other => AircastError::api(other.to_string()),
        }
    }
}
