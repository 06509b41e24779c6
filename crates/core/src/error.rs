//! Stage-level errors and their mapping onto the shared taxonomy.

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::extraction::ExtractionError;
use crate::params::StoreError;
use sas_protocol::{DialogState, ErrorKind};
use thiserror::Error;

/// A pipeline-fatal failure raised by one stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("extraction failed: {message}")]
    ExtractionFailure {
        message: String,
        raw: Option<String>,
    },

    #[error("output did not match the expected shape: {message}")]
    SchemaViolation { message: String, raw: Option<String> },

    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// A move the dialog transition table forbids. Never recorded as
    /// `last_error`; the engine surfaces it to its caller.
    #[error("illegal dialog transition {from:?} -> {to:?}")]
    IllegalTransition { from: DialogState, to: DialogState },
}

impl StageError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            message: message.into(),
            raw: None,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageFailure(message.into())
    }

    /// Taxonomy entry for recording in `LastError`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ExtractionFailure { .. } => ErrorKind::ExtractionFailure,
            Self::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            Self::MissingArtifact(_) => ErrorKind::MissingArtifact,
            Self::StorageFailure(_) => ErrorKind::StorageFailure,
            Self::ConfigurationError(_) | Self::IllegalTransition { .. } => {
                ErrorKind::ConfigurationError
            }
        }
    }

    /// Upstream payload kept for diagnostics.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::ExtractionFailure { raw, .. } | Self::SchemaViolation { raw, .. } => raw.as_deref(),
            _ => None,
        }
    }
}

impl From<ExtractionError> for StageError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::SchemaViolation { message, raw } => Self::SchemaViolation {
                message,
                raw: Some(raw),
            },
            other => Self::ExtractionFailure {
                message: other.to_string(),
                raw: None,
            },
        }
    }
}

impl From<StoreError> for StageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::YamlParse { .. } => Self::ConfigurationError(err.to_string()),
            other => Self::StorageFailure(other.to_string()),
        }
    }
}

impl From<CatalogError> for StageError {
    fn from(err: CatalogError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

impl From<ConfigError> for StageError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

pub type StageResult<T> = Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_schema_violation_keeps_raw() {
        let err: StageError = ExtractionError::SchemaViolation {
            message: "expected array".to_string(),
            raw: "{}".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert_eq!(err.raw(), Some("{}"));
    }

    #[test]
    fn test_extraction_call_failure_maps_to_extraction_kind() {
        let err: StageError = ExtractionError::ApiError("timeout".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailure);
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_store_write_maps_to_storage() {
        let err: StageError = StoreError::FileWrite {
            path: "p.yaml".into(),
            reason: "read-only".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }
}
