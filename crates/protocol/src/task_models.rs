//! Task models produced by decomposition and step synthesis.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The fixed tag set a decomposed task may carry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS, JsonSchema)]
pub enum TaskType {
    GraspTask,
    PlaceTask,
    MoveTask,
    LoopTask,
    ConditionTask,
    WaitTask,
    IoTask,
    CustomTask,
}

impl TaskType {
    pub const ALL: [TaskType; 8] = [
        TaskType::GraspTask,
        TaskType::PlaceTask,
        TaskType::MoveTask,
        TaskType::LoopTask,
        TaskType::ConditionTask,
        TaskType::WaitTask,
        TaskType::IoTask,
        TaskType::CustomTask,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GraspTask => "GraspTask",
            Self::PlaceTask => "PlaceTask",
            Self::MoveTask => "MoveTask",
            Self::LoopTask => "LoopTask",
            Self::ConditionTask => "ConditionTask",
            Self::WaitTask => "WaitTask",
            Self::IoTask => "IoTask",
            Self::CustomTask => "CustomTask",
        }
    }
}

/// A named sub-task of the user's description.
///
/// `details` is empty after decomposition and holds the ordered operation
/// steps once step synthesis has run for this task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,

    #[serde(rename = "type")]
    pub task_type: TaskType,

    pub description: String,

    /// Names of related tasks.
    #[serde(default)]
    pub sub_tasks: Vec<String>,

    /// Ordered operation-step strings, each citing `(Block Type: name)`.
    #[serde(default)]
    pub details: Vec<String>,

    /// Set when step synthesis failed for this task. `details` then holds a
    /// single placeholder line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis_error: Option<String>,
}

impl Task {
    pub fn new(name: impl Into<String>, task_type: TaskType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_type,
            description: description.into(),
            sub_tasks: Vec::new(),
            details: Vec::new(),
            synthesis_error: None,
        }
    }

    /// True when step synthesis produced real steps for this task.
    pub fn has_steps(&self) -> bool {
        self.synthesis_error.is_none() && !self.details.is_empty()
    }
}

/// One operation step parsed out of a task's `details`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct OperationStep {
    /// Owning task name.
    pub task_name: String,

    /// The full step text as synthesized.
    pub text: String,

    /// Operation type cited by `(Block Type: name)`, if any.
    pub operation_type: Option<String>,

    /// Whether the step was marked `[disabled]`.
    pub disabled: bool,
}
