//! # sas-protocol
//!
//! Core data models for the Structured-Agent-Spec (SAS) pipeline.
//!
//! This crate defines every structure that crosses the pipeline boundary:
//! - The persisted [`PipelineState`] threaded through every invocation
//! - Tasks, blocks, relation trees and parameter mappings produced by stages
//! - Operation catalog entries
//! - Configuration file models for `.sas/config.toml`
//! - Progress [`Event`]s streamed to the chat transport
//!
//! ## Modules
//!
//! - [`dialog_models`]: Dialog state machine tags, transcript and errors
//! - [`task_models`]: Decomposed tasks and their operation steps
//! - [`block_models`]: Generated blocks, relation tree, final document
//! - [`parameter_models`]: Parameter slot assignments
//! - [`catalog_models`]: Operation catalog entries
//! - [`config_models`]: Settings from `.sas/config.toml`
//! - [`pipeline_models`]: The persisted pipeline state
//! - [`ipc`]: Progress events for the transport layer
//!
//! ## Design Principles
//!
//! - Minimal dependencies: serde, ts-rs, uuid, chrono
//! - TypeScript generation: all transport-facing types derive `TS`
//! - No dependencies on other SAS crates

pub mod block_models;
pub mod catalog_models;
pub mod config_models;
pub mod dialog_models;
pub mod ipc;
pub mod parameter_models;
pub mod pipeline_models;
pub mod task_models;

// Re-export all public types for convenience
pub use block_models::*;
pub use catalog_models::*;
pub use config_models::*;
pub use dialog_models::*;
pub use ipc::*;
pub use parameter_models::*;
pub use pipeline_models::*;
pub use task_models::*;
