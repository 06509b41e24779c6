//! # sas-core
//!
//! Pipeline engine, stages and extraction adapters for SAS Kit.
//!
//! This crate provides:
//! - Configuration loading from the `.sas/` directory
//! - The extraction service abstraction and its adapters
//! - The operation catalog and the parameter store
//! - The six pipeline stages and the reviewer gate
//! - The resumable `PipelineEngine` and state persistence
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and management
//! - [`extraction`]: Extraction service trait, adapters and manager
//! - [`catalog`]: Operation catalog loading
//! - [`params`]: Parameter slot store
//! - [`stages`]: Task decomposition through program assembly
//! - [`engine`]: The pipeline orchestrator
//! - [`state`]: Dialog transitions and state persistence
//! - [`init`]: `.sas/` project generation

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod init;
pub mod params;
pub mod stages;
pub mod state;

pub use engine::{InvokeOutcome, PipelineEngine};
pub use error::{StageError, StageResult};
