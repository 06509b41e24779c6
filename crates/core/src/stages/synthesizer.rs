//! Stage 2: expand every task into catalog-cited operation steps.
//!
//! One extraction call per task, all dispatched together and joined before
//! the results are written back by index. A failing task only affects its
//! own `details`.

use crate::error::StageError;
use crate::extraction::{ExtractionRequest, ProgressTag};
use crate::stages::steps::{citation_error, parse_step};
use crate::stages::StageContext;
use futures::future::join_all;
use sas_protocol::{StageKind, Task};
use serde_json::{json, Value};

/// Which tasks a synthesis pass touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisScope {
    /// Every task, e.g. after the task list was accepted or revised.
    All,
    /// Only tasks whose previous synthesis failed.
    FailedOnly,
}

/// Updated task list plus the indices that failed in this pass.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub tasks: Vec<Task>,
    pub failed: Vec<usize>,
}

impl SynthesisOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// One line per failed task, for the aggregate error message.
    pub fn failure_summary(&self) -> String {
        self.failed
            .iter()
            .filter_map(|&index| self.tasks.get(index))
            .map(|task| {
                format!(
                    "- {}: {}",
                    task.name,
                    task.synthesis_error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn step_list_schema() -> Value {
    json!({
        "type": "array",
        "items": { "type": "string", "minLength": 1 },
        "minItems": 1
    })
}

/// Placeholder stored in `details` of a task whose synthesis failed.
pub fn failure_placeholder(message: &str) -> String {
    format!("[step synthesis failed: {message}]")
}

fn system_prompt(ctx: &StageContext<'_>) -> String {
    format!(
        "You turn one robot sub-task into an ordered list of concrete operation steps.\n\
         Available operation types:\n{catalog}\n\n\
         Rules:\n\
         - Every step must end with a citation `(Block Type: <type>)` using exactly one of the \
           types above.\n\
         - Prefix a step with `[disabled]` to include it in the program but switched off.\n\
         - Mark parameter references explicitly: `{{point: name}}`, `{{number: name}}`, \
           `{{flag: name}}`.\n\
         - To open a loop or condition use its type; close it with the matching end type.\n\
         Answer with a JSON array of strings only.",
        catalog = ctx.catalog.prompt_listing()
    )
}

fn user_prompt(task: &Task, description: &str) -> String {
    let mut prompt = format!(
        "Task: {}\nType: {}\nDescription: {}\n",
        task.name,
        task.task_type.as_str(),
        task.description
    );
    if !task.sub_tasks.is_empty() {
        prompt.push_str(&format!("Related tasks: {}\n", task.sub_tasks.join(", ")));
    }
    prompt.push_str(&format!("\nOverall goal:\n{description}"));
    prompt
}

async fn synthesize_task(
    ctx: &StageContext<'_>,
    index: usize,
    task: &Task,
    description: &str,
) -> Result<Vec<String>, StageError> {
    let request = ExtractionRequest::new(system_prompt(ctx), user_prompt(task, description))
        .with_working_dir(ctx.working_dir());

    let value = ctx
        .extraction
        .complete_structured(
            &request,
            &step_list_schema(),
            ProgressTag::new(ctx.run_id, StageKind::StepSynthesis).item(index),
        )
        .await?;

    let steps: Vec<String> = serde_json::from_value(value.clone())
        .map_err(|e| StageError::schema(format!("steps are not a list of strings: {e}")))?;
    let steps: Vec<String> = steps.into_iter().map(|s| s.trim().to_string()).collect();

    // Every step must become a block later; catch bad citations while the
    // task can still be re-synthesized on its own.
    let problems: Vec<String> = steps
        .iter()
        .filter_map(|detail| citation_error(&parse_step(&task.name, detail), ctx.catalog))
        .collect();
    if !problems.is_empty() {
        return Err(StageError::SchemaViolation {
            message: problems.join("; "),
            raw: Some(value.to_string()),
        });
    }

    Ok(steps)
}

/// Run stage 2 over `tasks`.
///
/// Tasks outside `scope` are returned untouched. Each selected task either
/// gets fresh `details` and a cleared `synthesis_error`, or a single
/// placeholder detail and `synthesis_error` set.
pub async fn synthesize_steps(
    ctx: &StageContext<'_>,
    tasks: &[Task],
    description: &str,
    scope: SynthesisScope,
) -> SynthesisOutcome {
    let selected: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| scope == SynthesisScope::All || task.synthesis_error.is_some())
        .map(|(index, _)| index)
        .collect();

    let calls = selected.iter().map(|&index| {
        let task = &tasks[index];
        async move { (index, synthesize_task(ctx, index, task, description).await) }
    });
    let results = join_all(calls).await;

    let mut updated = tasks.to_vec();
    let mut failed = Vec::new();

    for (index, result) in results {
        let task = &mut updated[index];
        match result {
            Ok(steps) => {
                task.details = steps;
                task.synthesis_error = None;
            }
            Err(err) => {
                tracing::warn!(task = %task.name, error = %err, "step synthesis failed");
                let message = err.to_string();
                task.details = vec![failure_placeholder(&message)];
                task.synthesis_error = Some(message);
                failed.push(index);
            }
        }
    }

    SynthesisOutcome {
        tasks: updated,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::extraction::adapters::MockExtractor;
    use crate::extraction::structured::parse_structured;
    use crate::extraction::ExtractionManager;
    use sas_protocol::{CatalogEntry, ScopeRole, TaskType};
    use std::sync::Arc;

    fn catalog() -> Catalog {
        Catalog::from_entries(["moveP", "grip"].map(|operation_type| CatalogEntry {
            operation_type: operation_type.to_string(),
            skeleton_xml: format!(r#"<block type="{operation_type}"/>"#),
            description: String::new(),
            parameters: Vec::new(),
            scope: ScopeRole::None,
            body_slot: None,
        }))
    }

    #[test]
    fn test_user_prompt_names_task() {
        let mut task = Task::new("Grasp", TaskType::GraspTask, "pick up part");
        task.sub_tasks = vec!["Place".to_string()];
        let prompt = user_prompt(&task, "pick and place");
        assert!(prompt.starts_with("Task: Grasp\n"));
        assert!(prompt.contains("Related tasks: Place"));
        assert!(prompt.ends_with("pick and place"));
    }

    #[test]
    fn test_step_schema() {
        assert!(parse_structured("[\"a (Block Type: grip)\"]", &step_list_schema()).is_ok());
        assert!(parse_structured("[]", &step_list_schema()).is_err());
        assert!(parse_structured("[\"\"]", &step_list_schema()).is_err());
    }

    #[test]
    fn test_failure_summary() {
        let mut failed = Task::new("Place", TaskType::PlaceTask, "put down");
        failed.synthesis_error = Some("timeout".to_string());
        let outcome = SynthesisOutcome {
            tasks: vec![Task::new("Grasp", TaskType::GraspTask, "pick"), failed],
            failed: vec![1],
        };
        assert!(!outcome.is_complete());
        assert_eq!(outcome.failure_summary(), "- Place: timeout");
    }

    #[tokio::test]
    async fn test_uncited_step_fails_only_its_task() {
        let catalog = catalog();
        let mock = MockExtractor::replying("[]")
            .when("Task: Grasp\n", r#"["Move to pick point (Block Type: moveP)", "Close gripper"]"#)
            .when("Task: Spin\n", r#"["Spin around (Block Type: tango)"]"#)
            .when("Task: Place\n", r#"["Open gripper (Block Type: grip)"]"#);
        let manager = ExtractionManager::new(Arc::new(mock));
        let ctx = StageContext {
            run_id: uuid::Uuid::new_v4(),
            catalog: &catalog,
            extraction: &manager,
            run_dir: std::path::Path::new("."),
            history: &[],
        };
        let tasks = vec![
            Task::new("Grasp", TaskType::GraspTask, "pick"),
            Task::new("Spin", TaskType::MoveTask, "spin"),
            Task::new("Place", TaskType::PlaceTask, "put down"),
        ];

        let outcome = synthesize_steps(&ctx, &tasks, "pick, spin and place", SynthesisScope::All).await;

        assert_eq!(outcome.failed, vec![0, 1]);
        let grasp_error = outcome.tasks[0].synthesis_error.as_deref().unwrap();
        assert!(grasp_error.contains("\"Close gripper\" does not cite"));
        assert!(outcome.tasks[1]
            .synthesis_error
            .as_deref()
            .unwrap()
            .contains("unknown operation type \"tango\""));
        assert_eq!(outcome.tasks[2].details, vec!["Open gripper (Block Type: grip)"]);
        assert!(outcome.tasks[2].synthesis_error.is_none());
    }
}
