use std::fs;

use crate::shared::errors::AppError;
use crate::shared::types::AppConfig;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &str) -> Result<AppConfig, AppError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(AppConfig::default());
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "failed to read config file {path}: {e}"
                )));
            }
        };

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| AppError::ConfigError(format!("failed to parse config file: {e}")))?;

        config
            .exchange
            .validate()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::fixed::{Fixed, SCALE};

    #[test]
    fn parses_exchange_section() {
        let config: AppConfig = toml::from_str(
            r#"
            [exchange]
            spread = "0.0025"
            reserve_fraction = "0.5"
            update_frequency_secs = 120
            minimum_reports = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.exchange.spread, Fixed::from_raw(SCALE / 400));
        assert_eq!(config.exchange.reserve_fraction, Fixed::from_raw(SCALE / 2));
        assert_eq!(config.exchange.update_frequency_secs, 120);
        assert_eq!(config.exchange.minimum_reports, 2);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.exchange.minimum_reports, 1);
        assert_eq!(config.sandbox.owner, "owner");
    }
}
