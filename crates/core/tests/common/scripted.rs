//! Scripted extraction replies for whole pipeline runs.

use sas_core::extraction::MockExtractor;

/// Task list JSON for `(name, type, description)` triples.
pub fn task_list(tasks: &[(&str, &str, &str)]) -> String {
    let items: Vec<serde_json::Value> = tasks
        .iter()
        .map(|(name, task_type, description)| {
            serde_json::json!({
                "name": name,
                "type": task_type,
                "description": description,
                "subTasks": []
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

/// Step list JSON.
pub fn steps(steps: &[&str]) -> String {
    serde_json::to_string(steps).unwrap_or_default()
}

/// A block reply echoing the operation type.
pub fn block_reply(operation_type: &str) -> String {
    format!("```xml\n<block type=\"{operation_type}\"><field name=\"NOTE\">ok</field></block>\n```")
}

/// Mock that answers the decomposer with `tasks`, each task's synthesis with
/// its steps, and every block prompt with a block of the cited type.
///
/// Block types are recognized from the `Operation type:` line of the block
/// prompt, so any catalog type works.
pub fn pipeline_mock(tasks: &[(&str, &str, &str)], steps_per_task: &[(&str, &[&str])]) -> MockExtractor {
    let mut mock = MockExtractor::replying("unexpected prompt");
    for operation_type in ["moveP", "grip", "wait", "loop_end", "loop"] {
        mock = mock.when(format!("Operation type: {operation_type}\n"), block_reply(operation_type));
    }
    for (task, task_steps) in steps_per_task {
        mock = mock.when(format!("Task: {task}\n"), steps(task_steps));
    }
    mock.when("Task description:", task_list(tasks))
}

/// The single-task Grasp scenario.
pub fn grasp_mock() -> MockExtractor {
    pipeline_mock(
        &[("Grasp", "GraspTask", "pick up part")],
        &[(
            "Grasp",
            &[
                "Move to pick point (Block Type: moveP)",
                "Close gripper (Block Type: grip)",
            ],
        )],
    )
}
