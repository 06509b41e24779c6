//! Extractor factory for building the extraction manager from configuration.

use crate::extraction::adapters::{ClaudeCliExtractor, CommandExtractor, MockExtractor};
use crate::extraction::base::ExtractionService;
use crate::extraction::extractor_kind::ExtractorKind;
use crate::extraction::manager::ExtractionManager;
use anyhow::Result;
use sas_protocol::ExtractionSettings;
use std::sync::Arc;

/// Factory for creating extraction backends based on configuration.
pub struct ExtractorFactory;

impl ExtractorFactory {
    /// Create one backend for `model`.
    ///
    /// The configured command, if any, applies to every model that is not a
    /// mock; it is how non-Claude models are reached.
    pub fn create(model: &str, command: &[String]) -> Result<Arc<dyn ExtractionService>> {
        match ExtractorKind::from_model_name(model, !command.is_empty()) {
            ExtractorKind::ClaudeCli => Ok(Arc::new(ClaudeCliExtractor::new(model))),
            ExtractorKind::Command => Ok(Arc::new(CommandExtractor::new(command)?)),
            ExtractorKind::Mock => {
                if !model.to_lowercase().starts_with("mock") {
                    tracing::warn!(model, "unrecognized extraction model, using mock extractor");
                }
                Ok(Arc::new(MockExtractor::replying("")))
            }
        }
    }

    /// Build a manager with the primary model and optional fallback model.
    ///
    /// # Examples
    ///
    /// ```
    /// use sas_core::extraction::ExtractorFactory;
    /// use sas_protocol::ExtractionSettings;
    ///
    /// let settings = ExtractionSettings {
    ///     model: "claude-sonnet-4.5".to_string(),
    ///     fallback_model: Some("mock".to_string()),
    ///     command: Vec::new(),
    /// };
    /// let manager = ExtractorFactory::manager(&settings).unwrap();
    /// assert!(manager.has_fallback());
    /// ```
    pub fn manager(settings: &ExtractionSettings) -> Result<ExtractionManager> {
        let primary = Self::create(&settings.model, &settings.command)?;
        let mut manager = ExtractionManager::new(primary);

        if let Some(fallback_model) = &settings.fallback_model {
            manager = manager.with_fallback(Self::create(fallback_model, &settings.command)?);
        }

        Ok(manager)
    }
}
