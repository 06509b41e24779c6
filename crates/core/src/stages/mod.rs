//! The six pipeline stages.
//!
//! Stages are plain functions over a read-only [`StageContext`] and the
//! pieces of `PipelineState` they need. They return their outputs instead of
//! mutating state; only the engine applies results and moves the dialog on.
//!
//! ## Modules
//!
//! - [`decomposer`]: stage 1, description to task list
//! - [`synthesizer`]: stage 2, tasks to operation steps
//! - [`mapper`]: stage 3, parameter references to store slots
//! - [`blocks`]: stage 4, steps to XML blocks
//! - [`relation`]: stage 5, blocks to a nesting tree
//! - [`assembler`]: stage 6, tree and blocks to one program
//! - [`review`]: the reviewer gate used after stages 1 and 2

pub mod assembler;
pub mod blocks;
pub mod decomposer;
pub mod mapper;
pub mod relation;
pub mod review;
pub mod steps;
pub mod synthesizer;
pub mod xml;

use crate::catalog::Catalog;
use crate::extraction::ExtractionManager;
use sas_protocol::ChatMessage;
use std::path::Path;
use uuid::Uuid;

/// Shared read-only inputs of a stage invocation.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub run_id: Uuid,
    pub catalog: &'a Catalog,
    pub extraction: &'a ExtractionManager,
    pub run_dir: &'a Path,
    /// Transcript so far, passed to the decomposer for context.
    pub history: &'a [ChatMessage],
}

impl StageContext<'_> {
    pub fn working_dir(&self) -> String {
        self.run_dir.display().to_string()
    }
}
