//! Reviewer gate run after task decomposition and step synthesis.
//!
//! The gate renders the artifact as a confirmation question and classifies
//! the reply. Only replies from a fixed affirmative vocabulary accept; any
//! other reply is treated as revision feedback.

use sas_protocol::Task;

const AFFIRMATIVE: &[&str] = &[
    "yes", "y", "ok", "okay", "sure", "confirm", "confirmed", "accept", "approve", "approved",
    "correct", "lgtm", "looks good", "go ahead", "proceed", "continue", "好", "好的", "是",
    "确认", "可以",
];

/// How a reviewer reply is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    Revise(String),
}

fn normalize(reply: &str) -> String {
    reply
        .trim()
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || "。！？，、～".contains(c))
        .trim()
        .to_string()
}

pub fn is_affirmative(reply: &str) -> bool {
    AFFIRMATIVE.contains(&normalize(reply).as_str())
}

pub fn classify(reply: &str) -> ReviewDecision {
    if is_affirmative(reply) {
        ReviewDecision::Accept
    } else {
        ReviewDecision::Revise(reply.trim().to_string())
    }
}

/// Fold reviewer feedback into the working description.
pub fn fold_feedback(description: &str, feedback: &str, label: &str) -> String {
    let feedback = feedback.trim();
    if description.trim().is_empty() {
        return feedback.to_string();
    }
    format!("{}\n\n{label}: {feedback}", description.trim_end())
}

const REPLY_HINT: &str = "Reply \"yes\" to continue, or describe what should change.";

/// Confirmation question for a freshly decomposed task list.
pub fn task_list_prompt(tasks: &[Task]) -> String {
    let mut out = String::from("I split the job into these tasks:\n");
    for (position, task) in tasks.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} [{}]: {}\n",
            position + 1,
            task.name,
            task.task_type.as_str(),
            task.description
        ));
        if !task.sub_tasks.is_empty() {
            out.push_str(&format!("   related: {}\n", task.sub_tasks.join(", ")));
        }
    }
    out.push('\n');
    out.push_str(REPLY_HINT);
    out
}

/// Confirmation question for synthesized operation steps.
pub fn module_steps_prompt(tasks: &[Task]) -> String {
    let mut out = String::from("Operation steps per task:\n");
    for task in tasks {
        out.push_str(&format!("\n{}:\n", task.name));
        for (position, detail) in task.details.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", position + 1, detail));
        }
    }
    out.push('\n');
    out.push_str(REPLY_HINT);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sas_protocol::TaskType;

    #[test]
    fn test_affirmative_is_case_and_punctuation_tolerant() {
        for reply in ["yes", "Yes!", "  OK. ", "Looks good!", "LGTM", "好的。", "确认！", "go ahead..."] {
            assert!(is_affirmative(reply), "{reply:?} should accept");
        }
    }

    #[test]
    fn test_anything_else_is_revision() {
        for reply in ["", "no", "yes but add a wait", "move faster", "not ok"] {
            assert!(!is_affirmative(reply), "{reply:?} should revise");
        }
        assert_eq!(
            classify("  add a wait step "),
            ReviewDecision::Revise("add a wait step".to_string())
        );
    }

    #[test]
    fn test_fold_feedback() {
        assert_eq!(fold_feedback("", "pick parts", "Revision"), "pick parts");
        assert_eq!(
            fold_feedback("pick parts\n", "also place them", "Revision"),
            "pick parts\n\nRevision: also place them"
        );
    }

    #[test]
    fn test_task_list_prompt() {
        let mut grasp = Task::new("Grasp", TaskType::GraspTask, "pick up the part");
        grasp.sub_tasks = vec!["Place".to_string()];
        let prompt = task_list_prompt(&[grasp]);
        assert!(prompt.contains("1. Grasp [GraspTask]: pick up the part"));
        assert!(prompt.contains("related: Place"));
        assert!(prompt.ends_with(REPLY_HINT));
    }

    #[test]
    fn test_module_steps_prompt() {
        let mut grasp = Task::new("Grasp", TaskType::GraspTask, "pick");
        grasp.details = vec!["Close gripper (Block Type: grip)".to_string()];
        let prompt = module_steps_prompt(&[grasp]);
        assert!(prompt.contains("Grasp:\n  1. Close gripper (Block Type: grip)"));
    }
}
