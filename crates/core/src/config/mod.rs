//! Configuration loading and management.
//!
//! This module loads `.sas/config.toml` and resolves the paths it names.

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
pub use models::AppConfig;
