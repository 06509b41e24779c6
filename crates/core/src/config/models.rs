//! Resolved application configuration.

use sas_protocol::GlobalConfig;
use std::path::{Path, PathBuf};

/// Configuration loaded from `<root>/.sas/config.toml`, plus the root it was
/// loaded from so relative paths in it can be resolved.
///
/// # Example
///
/// ```rust,no_run
/// use sas_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Catalog at {}", config.catalog_dir().display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Project root containing `.sas/`.
    pub root: PathBuf,

    /// Settings from `config.toml`.
    pub global: GlobalConfig,
}

impl AppConfig {
    pub fn new(root: impl Into<PathBuf>, global: GlobalConfig) -> Self {
        Self {
            root: root.into(),
            global,
        }
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, configured: &str) -> PathBuf {
        let path = Path::new(configured);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.resolve(&self.global.catalog.dir)
    }

    pub fn parameter_store_path(&self) -> PathBuf {
        self.resolve(&self.global.parameters.store)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.resolve(&self.global.pipeline.runs_dir)
    }
}
