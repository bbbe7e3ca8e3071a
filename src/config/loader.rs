//! Configuration loading from disk and environment.

use std::path::Path;
use std::fs;
use crate::config::duration::parse_duration;
use crate::config::schema::BreakerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment override for `breaker.window_size`.
pub const ENV_WINDOW_SIZE: &str = "BREAKER_WINDOW_SIZE";
/// Environment override for `breaker.failure_threshold`.
pub const ENV_FAILURE_THRESHOLD: &str = "BREAKER_FAILURE_THRESHOLD";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Override { var: &'static str, message: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Override { var, message } => write!(f, "Invalid {}: {}", var, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file, then apply
/// process environment overrides.
pub fn load_config(path: &Path) -> Result<BreakerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: BreakerConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    finalize(config)
}

/// Defaults plus environment overrides, for running without a file.
pub fn load_defaults() -> Result<BreakerConfig, ConfigError> {
    finalize(BreakerConfig::default())
}

fn finalize(mut config: BreakerConfig) -> Result<BreakerConfig, ConfigError> {
    apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `BREAKER_*` overrides using the given variable lookup.
pub fn apply_overrides<F>(config: &mut BreakerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_WINDOW_SIZE) {
        config.breaker.window_size = parse_duration(&raw).map_err(|message| ConfigError::Override {
            var: ENV_WINDOW_SIZE,
            message,
        })?;
    }

    if let Some(raw) = lookup(ENV_FAILURE_THRESHOLD) {
        config.breaker.failure_threshold = raw.trim().parse().map_err(|_| ConfigError::Override {
            var: ENV_FAILURE_THRESHOLD,
            message: format!("'{}' is not a positive integer", raw),
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = [
            (ENV_WINDOW_SIZE, "00:00:30"),
            (ENV_FAILURE_THRESHOLD, "2"),
        ]
        .into_iter()
        .collect();

        let mut config = BreakerConfig::default();
        apply_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.breaker.window_size, Duration::from_secs(30));
        assert_eq!(config.breaker.failure_threshold, 2);
    }

    #[test]
    fn test_bad_override_names_the_variable() {
        let mut config = BreakerConfig::default();
        let err = apply_overrides(&mut config, |k| {
            (k == ENV_FAILURE_THRESHOLD).then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_FAILURE_THRESHOLD));
    }

    #[test]
    fn test_oversized_window_is_an_error() {
        let mut config = BreakerConfig::default();
        let err = apply_overrides(&mut config, |k| {
            (k == ENV_WINDOW_SIZE).then(|| "9999999999999999999:00:00".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_WINDOW_SIZE));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[breaker]\nwindow_size = \"5124095576030432:00:00\"").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[breaker]\nfailure_threshold = 0").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors[0].field, "breaker.failure_threshold");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
