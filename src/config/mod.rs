/// Database configuration and connection management
pub mod database;

/// HTTP server settings from environment variables
pub mod server;

/// Pricing, OTP, sync and stationery settings from config.toml
pub mod settings;

pub use settings::{AppConfig, load_app_configuration};
