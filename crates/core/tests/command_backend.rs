//! A whole run against an external command backend.
//!
//! The project is generated with `generate_sas_structure`, configured to pipe
//! prompts through a shell script, and loaded the way the CLI loads it.

#![cfg(unix)]

mod common;

use common::*;
use sas_core::config::load_config;
use sas_core::init::{generate_sas_structure, InitOptions};
use sas_core::PipelineEngine;
use sas_protocol::DialogState;
use std::path::Path;
use tempfile::tempdir;

const BACKEND: &str = r#"#!/bin/sh
input=$(cat)
case "$input" in
  *"Operation type: moveP"*) echo '```xml'; echo '<block type="moveP"><field name="point">P1</field></block>'; echo '```' ;;
  *"Operation type: grip"*) echo '<block type="grip"><field name="state">close</field></block>' ;;
  *"Task: Grasp"*) echo '["Move to pick point (Block Type: moveP)", "Close gripper (Block Type: grip)"]' ;;
  *) echo 'Here is the plan:'; echo '[{"name": "Grasp", "type": "GraspTask", "description": "pick up part"}]' ;;
esac
"#;

fn write_config(root: &Path, script: &Path) {
    let config = format!(
        r#"[pipeline]
auto_accept_task_list = true
auto_accept_module_steps = true

[extraction]
model = "local-llm"
command = ["sh", "{}"]
"#,
        script.display()
    );
    std::fs::write(root.join(".sas/config.toml"), config).unwrap();
}

#[tokio::test]
async fn test_generated_project_runs_through_command_backend() {
    let dir = tempdir().unwrap();
    generate_sas_structure(InitOptions {
        target_dir: dir.path().to_path_buf(),
        force: false,
        minimal: false,
    })
    .await
    .unwrap();

    let script = dir.path().join("backend.sh");
    std::fs::write(&script, BACKEND).unwrap();
    write_config(dir.path(), &script);

    let config = load_config(dir.path()).await.unwrap();
    let engine = PipelineEngine::from_config(config).unwrap();

    let state = engine.invoke(None, None).await.unwrap().state;
    let outcome = engine
        .invoke(Some(state), Some("pick up the part"))
        .await
        .unwrap();

    assert!(outcome.is_done, "run stopped at {:?}: {:?}", outcome.state.dialog_state, outcome.state.last_error);
    let state = outcome.state;
    assert_eq!(state.dialog_state, DialogState::Done);
    assert_eq!(state.successful_blocks().count(), 2);

    let program = std::fs::read_to_string(&state.final_document.unwrap().path).unwrap();
    let first = program_root(&program);
    assert_eq!(first.attr("type"), Some("moveP"));
    assert_eq!(chain_ids(&first), vec!["1", "2"]);

    // The template store labels P1 as home, so the pick point takes the next slot.
    let mapping = state.parameter_mapping.unwrap();
    assert_eq!(mapping.points.values().next().map(|a| a.slot_id.as_str()), Some("P2"));
    let store = std::fs::read_to_string(dir.path().join(".sas/parameters.yaml")).unwrap();
    assert!(store.contains("pick"));
}

#[tokio::test]
async fn test_failing_command_waits_for_correction() {
    let dir = tempdir().unwrap();
    generate_sas_structure(InitOptions {
        target_dir: dir.path().to_path_buf(),
        force: false,
        minimal: true,
    })
    .await
    .unwrap();

    let script = dir.path().join("backend.sh");
    std::fs::write(&script, "#!/bin/sh\ncat > /dev/null\necho 'model offline' >&2\nexit 1\n").unwrap();
    write_config(dir.path(), &script);

    let engine = PipelineEngine::from_config(load_config(dir.path()).await.unwrap()).unwrap();
    let state = engine.invoke(None, None).await.unwrap().state;
    let outcome = engine.invoke(Some(state), Some("pick up the part")).await.unwrap();

    assert!(outcome.is_error);
    let error = outcome.state.last_error.unwrap();
    assert!(error.message.contains("model offline"), "{}", error.message);
}
