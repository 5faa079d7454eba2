//! Engine limits loaded from `huddle.toml`, with `HUDDLE_*` environment overrides.

use huddle_shared::constants::{
    DEFAULT_MAX_CONCURRENT_WRAPS, DEFAULT_MAX_PAYLOAD_BYTES, MAX_DISPLAY_NAME_LENGTH,
};
use serde::Deserialize;

/// Engine tuning loaded from `huddle.toml` with env var overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Recipient key wraps allowed in flight per envelope. Default: 16
    #[serde(default = "default_max_concurrent_wraps")]
    pub max_concurrent_wraps: usize,
    /// Largest serialized payload accepted for sealing. Default: 2 MiB
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Longest display name accepted, in characters. Default: 16
    #[serde(default = "default_max_display_name_length")]
    pub max_display_name_length: usize,
}

fn default_max_concurrent_wraps() -> usize {
    DEFAULT_MAX_CONCURRENT_WRAPS
}
fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}
fn default_max_display_name_length() -> usize {
    MAX_DISPLAY_NAME_LENGTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_wraps: default_max_concurrent_wraps(),
            max_payload_bytes: default_max_payload_bytes(),
            max_display_name_length: default_max_display_name_length(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML file with environment variable overrides.
    ///
    /// Reads `huddle.toml` from CWD (or path in `HUDDLE_CONFIG_PATH` env var).
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path =
            std::env::var("HUDDLE_CONFIG_PATH").unwrap_or_else(|_| "huddle.toml".to_string());
        let contents = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&contents)
    }

    /// Load configuration from a TOML string, then apply env var overrides.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config: EngineConfig = toml::from_str(toml_str)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the config.
    ///
    /// Returns an error if an env var is set but does not parse.
    pub fn apply_env_overrides(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Ok(val) = std::env::var("HUDDLE_MAX_CONCURRENT_WRAPS") {
            self.max_concurrent_wraps = val
                .parse()
                .map_err(|_| format!("invalid HUDDLE_MAX_CONCURRENT_WRAPS value: {val}"))?;
        }
        if let Ok(val) = std::env::var("HUDDLE_MAX_PAYLOAD_BYTES") {
            self.max_payload_bytes = val
                .parse()
                .map_err(|_| format!("invalid HUDDLE_MAX_PAYLOAD_BYTES value: {val}"))?;
        }
        if let Ok(val) = std::env::var("HUDDLE_MAX_DISPLAY_NAME_LENGTH") {
            self.max_display_name_length = val
                .parse()
                .map_err(|_| format!("invalid HUDDLE_MAX_DISPLAY_NAME_LENGTH value: {val}"))?;
        }
        Ok(())
    }

    /// Reject limits that would make every seal fail.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.max_concurrent_wraps == 0 {
            return Err("max_concurrent_wraps must be at least 1".into());
        }
        if self.max_payload_bytes == 0 {
            return Err("max_payload_bytes must be at least 1".into());
        }
        if self.max_display_name_length == 0 {
            return Err("max_display_name_length must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn config_loads_from_valid_toml_string() {
        let toml = r#"
            max_concurrent_wraps = 4
            max_payload_bytes = 4096
            max_display_name_length = 24
        "#;
        let config = EngineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.max_concurrent_wraps, 4);
        assert_eq!(config.max_payload_bytes, 4096);
        assert_eq!(config.max_display_name_length, 24);
    }

    #[test]
    #[serial]
    fn config_has_correct_defaults_for_omitted_fields() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.max_concurrent_wraps, 16);
        assert_eq!(config.max_payload_bytes, 2 * 1024 * 1024);
        assert_eq!(config.max_display_name_length, 16);
    }

    #[test]
    #[serial]
    fn config_applies_env_var_overrides() {
        std::env::set_var("HUDDLE_MAX_CONCURRENT_WRAPS", "2");
        let config = EngineConfig::from_toml_str("max_concurrent_wraps = 8").unwrap();
        std::env::remove_var("HUDDLE_MAX_CONCURRENT_WRAPS");
        assert_eq!(config.max_concurrent_wraps, 2);
    }

    #[test]
    #[serial]
    fn config_rejects_unparsable_env_var() {
        std::env::set_var("HUDDLE_MAX_PAYLOAD_BYTES", "lots");
        let result = EngineConfig::from_toml_str("");
        std::env::remove_var("HUDDLE_MAX_PAYLOAD_BYTES");
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn config_rejects_zero_concurrency() {
        let result = EngineConfig::from_toml_str("max_concurrent_wraps = 0");
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn config_fails_on_malformed_toml() {
        let result = EngineConfig::from_toml_str("this is not valid = [[[toml");
        assert!(result.is_err());
    }
}
