//! Tracing setup for binaries and tests
//!
//! The library only emits `tracing` events under `pmath_core::*` targets;
//! installing a subscriber is left to the host. [`init_tracing`] is the
//! default choice.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Environment variable holding a filter directive, e.g. `pmath_core::eval=trace`
pub const LOG_ENV: &str = "PMATH_LOG";

/// Install a fmt subscriber filtered by `PMATH_LOG` or, when that is unset
/// or invalid, by the configured filter.
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let config = LoggingConfig {
            filter: "not a [valid filter".to_string(),
            ansi: false,
        };
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
