//! Stage 1: split a task description into named sub-tasks.

use crate::error::{StageError, StageResult};
use crate::extraction::{ExtractionRequest, ProgressTag};
use crate::stages::StageContext;
use schemars::JsonSchema;
use sas_protocol::{StageKind, Task, TaskType};
use serde::Deserialize;
use serde_json::Value;

/// Shape the extraction service must return, one entry per task.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub description: String,
    #[serde(default, alias = "sub_tasks")]
    pub sub_tasks: Vec<String>,
}

impl From<TaskDraft> for Task {
    fn from(draft: TaskDraft) -> Self {
        let mut task = Task::new(draft.name.trim(), draft.task_type, draft.description);
        task.sub_tasks = draft.sub_tasks;
        task
    }
}

/// JSON schema for a non-empty array of [`TaskDraft`].
pub fn task_list_schema() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(Vec<TaskDraft>))
        .unwrap_or_else(|_| Value::Object(Default::default()));
    if let Some(object) = schema.as_object_mut() {
        object.insert("minItems".to_string(), Value::from(1));
    }
    schema
}

fn system_prompt(ctx: &StageContext<'_>) -> String {
    let task_types = TaskType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let operation_types = ctx.catalog.types().join(", ");

    format!(
        "You plan robot programs. Split the user's task description into an ordered list of \
         sub-tasks.\n\
         Each sub-task has a short unique `name`, a `type` from: {task_types}, a one-sentence \
         `description`, and `subTasks` naming related sub-tasks (may be empty).\n\
         The robot can only perform these operations: {operation_types}.\n\
         Answer with a JSON array only."
    )
}

/// Run stage 1 over `description`.
///
/// Returns the new task list with empty `details`. An empty or malformed
/// answer is a schema violation carrying the raw output.
pub async fn decompose(ctx: &StageContext<'_>, description: &str) -> StageResult<Vec<Task>> {
    let request = ExtractionRequest::new(system_prompt(ctx), format!("Task description:\n{description}"))
        .with_history(ctx.history.to_vec())
        .with_working_dir(ctx.working_dir());

    let value = ctx
        .extraction
        .complete_structured(
            &request,
            &task_list_schema(),
            ProgressTag::new(ctx.run_id, StageKind::TaskDecomposition),
        )
        .await?;

    let raw = value.to_string();
    let drafts: Vec<TaskDraft> = serde_json::from_value(value).map_err(|e| StageError::SchemaViolation {
        message: format!("task list does not match the expected shape: {e}"),
        raw: Some(raw.clone()),
    })?;

    if drafts.is_empty() {
        return Err(StageError::SchemaViolation {
            message: "task list is empty".to_string(),
            raw: Some(raw),
        });
    }

    let tasks: Vec<Task> = drafts.into_iter().map(Task::from).collect();
    tracing::info!(count = tasks.len(), "decomposed description into tasks");
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::structured::parse_structured;
    use serde_json::json;

    #[test]
    fn test_schema_rejects_empty_array() {
        let result = parse_structured("[]", &task_list_schema());
        assert!(result.is_err());
    }

    #[test]
    fn test_schema_rejects_unknown_type() {
        let raw = r#"[{"name":"X","type":"DanceTask","description":"?"}]"#;
        assert!(parse_structured(raw, &task_list_schema()).is_err());
    }

    #[test]
    fn test_schema_accepts_task_list() {
        let raw = r#"[{"name":"Grasp","type":"GraspTask","description":"pick up part","subTasks":["Place"]}]"#;
        let value = parse_structured(raw, &task_list_schema()).unwrap();
        let drafts: Vec<TaskDraft> = serde_json::from_value(value).unwrap();
        let task = Task::from(drafts.into_iter().next().unwrap());
        assert_eq!(task.name, "Grasp");
        assert_eq!(task.sub_tasks, vec!["Place".to_string()]);
        assert!(task.details.is_empty());
    }

    #[test]
    fn test_snake_case_sub_tasks_alias() {
        let draft: TaskDraft = serde_json::from_value(json!({
            "name": "Place",
            "type": "PlaceTask",
            "description": "put it down",
            "sub_tasks": ["Grasp"]
        }))
        .unwrap();
        assert_eq!(draft.sub_tasks, vec!["Grasp".to_string()]);
    }
}
