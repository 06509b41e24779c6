//! Extraction service abstraction and management.
//!
//! This module provides the `ExtractionService` trait (Adapter Pattern),
//! its adapters, and the `ExtractionManager` every stage calls through.

pub mod adapters;
pub mod base;
pub mod cli_executor;
pub mod extractor_kind;
pub mod factory;
pub mod manager;
pub mod structured;

pub use adapters::{ClaudeCliExtractor, CommandExtractor, MockExtractor};
pub use base::{
    ExtractionError, ExtractionEvent, ExtractionRequest, ExtractionService, ExtractionStream,
};
pub use extractor_kind::ExtractorKind;
pub use factory::ExtractorFactory;
pub use manager::{ExtractionManager, ProgressTag};
pub use structured::{fenced_block, locate_json, parse_structured};
