//! Parsing of operation-step strings produced by step synthesis.
//!
//! A step reads like `Move to pick point (Block Type: moveP)`, optionally
//! marked `[disabled]`.

use crate::catalog::Catalog;
use regex::Regex;
use sas_protocol::{OperationStep, Task};
use std::sync::LazyLock;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\s*block\s*type\s*[:：]\s*([A-Za-z0-9_\-]+)\s*\)").expect("static regex")
});

static DISABLED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\s*disabled\s*\]").expect("static regex"));

/// Parse one detail string of `task_name`.
pub fn parse_step(task_name: &str, detail: &str) -> OperationStep {
    let operation_type = CITATION_RE
        .captures(detail)
        .map(|captures| captures[1].to_string());
    let disabled = DISABLED_RE.is_match(detail);
    let text = DISABLED_RE.replace_all(detail, "").trim().to_string();

    OperationStep {
        task_name: task_name.to_string(),
        text,
        operation_type,
        disabled,
    }
}

/// Why `step` cannot become a block with `catalog`, if it cannot.
pub fn citation_error(step: &OperationStep, catalog: &Catalog) -> Option<String> {
    match step.operation_type.as_deref() {
        None => Some(format!("step \"{}\" does not cite an operation type", step.text)),
        Some(operation_type) if !catalog.contains(operation_type) => {
            Some(format!("unknown operation type \"{operation_type}\""))
        }
        Some(_) => None,
    }
}

/// All steps in task order, then appearance order.
///
/// Tasks whose synthesis failed contribute nothing: their details hold only
/// a placeholder.
pub fn operation_steps(tasks: &[Task]) -> Vec<OperationStep> {
    tasks
        .iter()
        .filter(|task| task.synthesis_error.is_none())
        .flat_map(|task| task.details.iter().map(|detail| parse_step(&task.name, detail)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sas_protocol::{CatalogEntry, ScopeRole, TaskType};

    #[test]
    fn test_parse_step_with_citation() {
        let step = parse_step("Grasp", "Move to pick point (Block Type: moveP)");
        assert_eq!(step.operation_type.as_deref(), Some("moveP"));
        assert!(!step.disabled);
        assert_eq!(step.text, "Move to pick point (Block Type: moveP)");
    }

    #[test]
    fn test_parse_step_disabled_marker() {
        let step = parse_step("Grasp", "[disabled] Wait 2 seconds (block type: wait)");
        assert!(step.disabled);
        assert_eq!(step.operation_type.as_deref(), Some("wait"));
        assert_eq!(step.text, "Wait 2 seconds (block type: wait)");
    }

    #[test]
    fn test_parse_step_without_citation() {
        let step = parse_step("Grasp", "Do something clever");
        assert_eq!(step.operation_type, None);
    }

    #[test]
    fn test_citation_error() {
        let catalog = Catalog::from_entries([CatalogEntry {
            operation_type: "moveP".to_string(),
            skeleton_xml: r#"<block type="moveP"/>"#.to_string(),
            description: String::new(),
            parameters: Vec::new(),
            scope: ScopeRole::None,
            body_slot: None,
        }]);

        assert_eq!(citation_error(&parse_step("A", "Go (Block Type: moveP)"), &catalog), None);
        assert!(citation_error(&parse_step("A", "Close gripper"), &catalog)
            .unwrap()
            .contains("does not cite"));
        assert_eq!(
            citation_error(&parse_step("A", "Spin (Block Type: tango)"), &catalog).as_deref(),
            Some("unknown operation type \"tango\"")
        );
    }

    #[test]
    fn test_operation_steps_skip_failed_tasks() {
        let mut ok = Task::new("A", TaskType::MoveTask, "a");
        ok.details = vec!["one (Block Type: moveP)".to_string(), "two (Block Type: grip)".to_string()];
        let mut failed = Task::new("B", TaskType::MoveTask, "b");
        failed.details = vec!["[synthesis failed]".to_string()];
        failed.synthesis_error = Some("boom".to_string());

        let steps = operation_steps(&[ok, failed]);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].operation_type.as_deref(), Some("grip"));
        assert!(steps.iter().all(|s| s.task_name == "A"));
    }
}
