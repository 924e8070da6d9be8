//! Controller configuration.
//!
//! Parsed from TOML; every field has a default so a bare `[controller]`
//! section (or no file at all) yields a working configuration pointed at
//! the production backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML was invalid.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field failed validation.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VantageConfig {
    /// Controller settings.
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl VantageConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.controller.validate()?;
        Ok(config)
    }
}

/// Settings for the session controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Base URL of the report backend.
    #[serde(default = "default_backend_base")]
    pub backend_base: String,

    /// Intake ids that bypass authentication with a sentinel token.
    #[serde(default)]
    pub demo_intake_ids: Vec<String>,

    /// Checkout vendor key handed to the widget when the backend omits
    /// one.
    #[serde(default)]
    pub vendor_key_fallback: Option<String>,

    /// Countdown tick interval in milliseconds. One second in
    /// production; tests shorten it.
    #[serde(default = "default_tick_ms")]
    pub countdown_tick_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            backend_base: default_backend_base(),
            demo_intake_ids: Vec::new(),
            vendor_key_fallback: None,
            countdown_tick_ms: default_tick_ms(),
        }
    }
}

impl ControllerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_base.is_empty() {
            return Err(ConfigError::Validation("backend_base cannot be empty".into()));
        }
        if self.countdown_tick_ms == 0 {
            return Err(ConfigError::Validation("countdown_tick_ms must be positive".into()));
        }
        Ok(())
    }
}

fn default_backend_base() -> String {
    "https://api.vantage.example.com".to_string()
}

const fn default_tick_ms() -> u64 {
    1_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_defaults() {
        let config = VantageConfig::from_toml("").unwrap();
        assert_eq!(config.controller.countdown_tick_ms, 1_000);
        assert!(config.controller.demo_intake_ids.is_empty());
    }

    #[test]
    fn parses_demo_ids_and_base() {
        let config = VantageConfig::from_toml(
            r#"
            [controller]
            backend_base = "https://staging.example.com"
            demo_intake_ids = ["demo-1", "demo-2"]
            "#,
        )
        .unwrap();
        assert_eq!(config.controller.backend_base, "https://staging.example.com");
        assert_eq!(config.controller.demo_intake_ids.len(), 2);
    }

    #[test]
    fn rejects_zero_tick() {
        let result = VantageConfig::from_toml(
            r#"
            [controller]
            countdown_tick_ms = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_empty_backend_base() {
        let result = VantageConfig::from_toml(
            r#"
            [controller]
            backend_base = ""
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
