//! Global configuration models for `.sas/config.toml`.
//!
//! # Example
//!
//! ```toml
//! # .sas/config.toml
//! [pipeline]
//! auto_accept_task_list = false
//! auto_accept_module_steps = false
//! runs_dir = ".sas/runs"
//! snapshots = true
//!
//! [catalog]
//! dir = ".sas/catalog"
//!
//! [extraction]
//! model = "claude-sonnet-4.5"
//!
//! [parameters]
//! store = ".sas/parameters.yaml"
//! point_slots = 20
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Orchestrator behavior.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct PipelineSettings {
    /// Skip the reviewer gate after task decomposition.
    pub auto_accept_task_list: bool,

    /// Skip the reviewer gate after step synthesis.
    pub auto_accept_module_steps: bool,

    /// Directory under which one run directory per pipeline run is created.
    pub runs_dir: String,

    /// Write a `PipelineState` snapshot after every stage for audit.
    pub snapshots: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            auto_accept_task_list: false,
            auto_accept_module_steps: false,
            runs_dir: ".sas/runs".to_string(),
            snapshots: true,
        }
    }
}

/// Where the operation catalog lives.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct CatalogSettings {
    pub dir: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            dir: ".sas/catalog".to_string(),
        }
    }
}

/// Which extraction backend to use.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Model name; also selects the adapter (see `ExtractorKind`).
    pub model: String,

    /// Model tried when the primary backend is unavailable.
    pub fallback_model: Option<String>,

    /// Command line for the generic command adapter, e.g. `["ollama", "run", "llama3"]`.
    pub command: Vec<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4.5".to_string(),
            fallback_model: None,
            command: Vec::new(),
        }
    }
}

/// Parameter store location and capacity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct ParameterSettings {
    pub store: String,
    pub point_slots: usize,
    pub number_slots: usize,
    pub flag_slots: usize,
}

impl Default for ParameterSettings {
    fn default() -> Self {
        Self {
            store: ".sas/parameters.yaml".to_string(),
            point_slots: 20,
            number_slots: 10,
            flag_slots: 10,
        }
    }
}

/// Represents all settings from `.sas/config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
#[serde(default)]
pub struct GlobalConfig {
    pub pipeline: PipelineSettings,
    pub catalog: CatalogSettings,
    pub extraction: ExtractionSettings,
    pub parameters: ParameterSettings,
}
