//! Evaluator configuration
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. built-in defaults,
//! 2. a TOML file,
//! 3. environment overrides.
//!
//! ```toml
//! max_recursion = 256
//! max_iterations = 4096
//! worker_threads = 0        # 0 = one per CPU
//! abort_poll_interval = 256
//!
//! [logging]
//! filter = "warn"
//! ```
//!
//! Environment overrides: `PMATH_MAX_RECURSION`, `PMATH_MAX_ITERATIONS`,
//! `PMATH_WORKER_THREADS`.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

/// Limits and knobs of a kernel
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Nesting depth of evaluation before `General::reclim`
    pub max_recursion: usize,
    /// Rewrites of one object before `General::itlim`
    pub max_iterations: usize,
    /// Worker pool size; 0 means one per CPU
    pub worker_threads: usize,
    /// Matcher steps between abort checks
    pub abort_poll_interval: usize,
    pub logging: LoggingConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_recursion: 256,
            max_iterations: 4096,
            worker_threads: 0,
            abort_poll_interval: 256,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `PMATH_LOG` is unset
    pub filter: String,
    /// Colored output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "warn".to_string(),
            ansi: true,
        }
    }
}

/// Error loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io(std::io::Error),
    /// The file is not valid TOML for [`EvalConfig`]
    Parse(toml::de::Error),
    /// An override or field has an unusable value
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {}", e),
            ConfigError::Parse(e) => write!(f, "invalid config: {}", e),
            ConfigError::InvalidValue { key, value } => write!(f, "invalid value {:?} for {}", value, key),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

const OVERRIDES: [&str; 3] = ["PMATH_MAX_RECURSION", "PMATH_MAX_ITERATIONS", "PMATH_WORKER_THREADS"];

impl EvalConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EvalConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        debug!(target: "pmath_core::config", path = %path.display(), ?config, "config loaded");
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides looked up through `get`, which maps a variable name
    /// to its value.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        for key in OVERRIDES {
            let Some(value) = get(key) else {
                continue;
            };
            let parsed: usize = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.clone(),
            })?;
            match key {
                "PMATH_MAX_RECURSION" => self.max_recursion = parsed,
                "PMATH_MAX_ITERATIONS" => self.max_iterations = parsed,
                _ => self.worker_threads = parsed,
            }
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_recursion", self.max_recursion),
            ("max_iterations", self.max_iterations),
            ("abort_poll_interval", self.abort_poll_interval),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EvalConfig::default();
        assert_eq!(config.max_recursion, 256);
        assert_eq!(config.max_iterations, 4096);
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn test_partial_toml() {
        let config = EvalConfig::from_toml_str("max_recursion = 64\n[logging]\nfilter = \"debug\"\n").unwrap();
        assert_eq!(config.max_recursion, 64);
        assert_eq!(config.max_iterations, 4096, "missing keys keep defaults");
        assert_eq!(config.logging.filter, "debug");
        assert!(config.logging.ansi);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(EvalConfig::from_toml_str("max_recursion = \"lots\""), Err(ConfigError::Parse(_))));
        assert!(matches!(
            EvalConfig::from_toml_str("max_iterations = 0"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let mut config = EvalConfig::default();
        config
            .apply_overrides(|key| match key {
                "PMATH_MAX_RECURSION" => Some("32".to_string()),
                "PMATH_WORKER_THREADS" => Some(" 2 ".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.max_recursion, 32);
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.max_iterations, 4096);

        let err = config
            .apply_overrides(|key| (key == "PMATH_MAX_ITERATIONS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PMATH_MAX_ITERATIONS"));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(EvalConfig::load("/nonexistent/pmath.toml"), Err(ConfigError::Io(_))));
    }
}
