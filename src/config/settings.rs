//! Application settings loaded from `config.toml`.
//!
//! Every table is optional. A missing file yields the defaults, so a fresh checkout
//! starts without any configuration; a file that exists but does not parse is an error.

use crate::{
    core::{pricing::PriceSheet, submission::DEFAULT_MAX_OTP_ATTEMPTS},
    errors::{Error, Result},
};
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tracing::{debug, info};

/// Default settings file location
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// The whole `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Per-page rates
    pub pricing: PriceSheet,
    /// OTP issuance
    pub otp: OtpConfig,
    /// Client polling and timeouts
    pub sync: SyncConfig,
    /// Stationery seeded into the inventory table
    pub stationery: Vec<StationeryConfig>,
}

/// `[otp]`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Candidates drawn before a submission fails
    pub max_attempts: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_OTP_ATTEMPTS,
        }
    }
}

/// `[sync]`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between order list polls
    pub poll_interval_secs: u64,
    /// Upper bound on a single submission or transition call
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            request_timeout_secs: 10,
        }
    }
}

impl SyncConfig {
    /// Poll interval, never shorter than one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Request timeout, never shorter than one second.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// One `[[stationery]]` seed entry
#[derive(Debug, Clone, Deserialize)]
pub struct StationeryConfig {
    /// Display name, also the seeding key
    pub name: String,
    /// Unit price
    pub price: i64,
    /// Units on hand
    #[serde(default)]
    pub stock: i32,
    /// Grouping shown in the catalog
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path.display()),
    })
}

/// Loads settings from `JPRINT_CONFIG` (default `config.toml`), falling back to the
/// defaults when the file does not exist.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("JPRINT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if Path::new(&path).exists() {
        let config = load_config(&path)?;
        info!(
            "Loaded {path}: {} stationery seed(s), color {} / b&w {} per page",
            config.stationery.len(),
            config.pricing.color_per_page,
            config.pricing.black_white_per_page
        );
        Ok(config)
    } else {
        info!("No {path} found, using default settings");
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [pricing]
            color_per_page = 12
            black_white_per_page = 3

            [otp]
            max_attempts = 8

            [sync]
            poll_interval_secs = 5

            [[stationery]]
            name = "Blue Pen"
            price = 10
            stock = 40
            category = "pens"

            [[stationery]]
            name = "A4 Notebook"
            price = 50
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pricing.color_per_page, 12);
        assert_eq!(config.pricing.black_white_per_page, 3);
        assert_eq!(config.otp.max_attempts, 8);
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.sync.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.stationery.len(), 2);
        assert_eq!(config.stationery[1].category, "general");
        assert_eq!(config.stationery[1].stock, 0);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.pricing, PriceSheet::default());
        assert_eq!(config.otp.max_attempts, DEFAULT_MAX_OTP_ATTEMPTS);
        assert!(config.stationery.is_empty());
    }

    #[test]
    fn test_partial_pricing_keeps_other_default() {
        let config: AppConfig = toml::from_str("[pricing]\ncolor_per_page = 15").unwrap();
        assert_eq!(config.pricing.color_per_page, 15);
        assert_eq!(config.pricing.black_white_per_page, 2);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let sync = SyncConfig {
            poll_interval_secs: 0,
            request_timeout_secs: 0,
        };
        assert_eq!(sync.poll_interval(), Duration::from_secs(1));
        assert_eq!(sync.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = load_config("definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
