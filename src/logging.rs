//! Tracing subscriber setup

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Directives used when `RUST_LOG` is not set
#[must_use]
pub fn default_directives(config: &LoggingConfig, verbose: bool) -> String {
    let level = if verbose { "debug" } else { config.level.as_str() };
    format!("aircast={level},tower_http={level},warn")
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine readable.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config, verbose)));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let config = LoggingConfig::default();
        assert_eq!(
            default_directives(&config, false),
            "aircast=info,tower_http=info,warn"
        );
        assert!(default_directives(&config, true).starts_with("aircast=debug"));
    }
}
