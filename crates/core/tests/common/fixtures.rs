//! Test fixtures for catalogs, projects and engines.

use sas_core::catalog::Catalog;
use sas_core::config::AppConfig;
use sas_core::extraction::{ExtractionManager, MockExtractor};
use sas_core::PipelineEngine;
use sas_protocol::{CatalogEntry, GlobalConfig, ScopeRole};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Catalog entry with a bare `<block type="..."/>` skeleton.
pub fn catalog_entry(operation_type: &str, scope: ScopeRole) -> CatalogEntry {
    CatalogEntry {
        operation_type: operation_type.to_string(),
        skeleton_xml: format!(r#"<block type="{operation_type}"/>"#),
        description: format!("{operation_type} operation"),
        parameters: Vec::new(),
        scope,
        body_slot: (scope == ScopeRole::Open).then(|| "DO".to_string()),
    }
}

/// `moveP`, `grip`, `wait`, `loop` and `loop_end`.
pub fn robot_catalog() -> Catalog {
    Catalog::from_entries([
        catalog_entry("moveP", ScopeRole::None),
        catalog_entry("grip", ScopeRole::None),
        catalog_entry("wait", ScopeRole::None),
        catalog_entry("loop", ScopeRole::Open),
        catalog_entry("loop_end", ScopeRole::Close),
    ])
}

/// Configuration rooted at `root` with both reviewer gates as given.
pub fn config(root: &Path, auto_accept: bool) -> AppConfig {
    let mut global = GlobalConfig::default();
    global.pipeline.auto_accept_task_list = auto_accept;
    global.pipeline.auto_accept_module_steps = auto_accept;
    AppConfig::new(root, global)
}

/// Engine over [`robot_catalog`] driven by `mock`.
#[allow(dead_code)]
pub fn engine(root: &Path, mock: MockExtractor, auto_accept: bool) -> PipelineEngine {
    PipelineEngine::new(
        config(root, auto_accept),
        robot_catalog(),
        ExtractionManager::new(Arc::new(mock)),
    )
}

/// Engine over `catalog`, e.g. after the project catalog was edited between turns.
#[allow(dead_code)]
pub fn engine_with_catalog(root: &Path, mock: MockExtractor, auto_accept: bool, catalog: Catalog) -> PipelineEngine {
    PipelineEngine::new(
        config(root, auto_accept),
        catalog,
        ExtractionManager::new(Arc::new(mock)),
    )
}

/// Engine that also streams events into the returned receiver.
#[allow(dead_code)]
pub fn engine_with_events(
    root: &Path,
    mock: MockExtractor,
    auto_accept: bool,
) -> (PipelineEngine, mpsc::Receiver<sas_protocol::Event>) {
    let (tx, rx) = mpsc::channel(1024);
    (engine(root, mock, auto_accept).with_events(tx), rx)
}
