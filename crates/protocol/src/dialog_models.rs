//! Dialog state machine tags, transcript entries and error records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Position of a pipeline run in its dialog.
///
/// Normal progression:
/// Initial -> AwaitingTaskListReview -> AwaitingModuleStepsReview ->
/// GeneratingBlocks -> GeneratingRelation -> AssemblingProgram -> Done
///
/// Special states:
/// - Error: a stage failed (reachable from any non-terminal state)
/// - AwaitingCorrection: waiting for a corrective reply (reachable from Error)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "camelCase")]
pub enum DialogState {
    /// No description has been processed yet.
    Initial,

    /// A task list is waiting for human confirmation.
    AwaitingTaskListReview,

    /// Per-task operation steps are waiting for human confirmation.
    AwaitingModuleStepsReview,

    /// Parameters are being mapped and blocks synthesized.
    GeneratingBlocks,

    /// The relation tree is being built.
    GeneratingRelation,

    /// The final program is being assembled.
    AssemblingProgram,

    /// The final program has been written.
    Done,

    /// A stage failed; `last_error` describes why.
    Error,

    /// Waiting for a reply that corrects the failed stage's input.
    AwaitingCorrection,
}

impl DialogState {
    /// Whether the run has finished and will not advance any further.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Whether the run is paused waiting for a human reply.
    pub fn is_awaiting_reply(self) -> bool {
        matches!(
            self,
            Self::AwaitingTaskListReview
                | Self::AwaitingModuleStepsReview
                | Self::AwaitingCorrection
        )
    }

    /// Explicit transition table.
    ///
    /// Review states may loop onto themselves because a revision re-runs the
    /// owning stage and pauses again at the same gate.
    pub fn can_transition_to(self, next: DialogState) -> bool {
        use DialogState::*;

        if next == Error {
            return self != Done;
        }

        matches!(
            (self, next),
            (Initial, AwaitingTaskListReview)
                | (AwaitingTaskListReview, AwaitingTaskListReview)
                | (AwaitingTaskListReview, AwaitingModuleStepsReview)
                | (AwaitingModuleStepsReview, AwaitingModuleStepsReview)
                | (AwaitingModuleStepsReview, GeneratingBlocks)
                | (GeneratingBlocks, GeneratingRelation)
                | (GeneratingRelation, AssemblingProgram)
                | (AssemblingProgram, Done)
                | (Error, AwaitingCorrection)
                | (AwaitingCorrection, AwaitingTaskListReview)
                | (AwaitingCorrection, AwaitingModuleStepsReview)
                | (AwaitingCorrection, GeneratingBlocks)
                | (AwaitingCorrection, GeneratingRelation)
                | (AwaitingCorrection, AssemblingProgram)
        )
    }

    /// Stable snake_case label used in file names and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::AwaitingTaskListReview => "awaiting_task_list_review",
            Self::AwaitingModuleStepsReview => "awaiting_module_steps_review",
            Self::GeneratingBlocks => "generating_blocks",
            Self::GeneratingRelation => "generating_relation",
            Self::AssemblingProgram => "assembling_program",
            Self::Done => "done",
            Self::Error => "error",
            Self::AwaitingCorrection => "awaiting_correction",
        }
    }
}

/// The pipeline stage that produced an artifact or an error.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "camelCase")]
pub enum StageKind {
    TaskDecomposition,
    StepSynthesis,
    ParameterMapping,
    BlockSynthesis,
    RelationBuilding,
    ProgramAssembly,
}

impl StageKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::TaskDecomposition => "task decomposition",
            Self::StepSynthesis => "step synthesis",
            Self::ParameterMapping => "parameter mapping",
            Self::BlockSynthesis => "block synthesis",
            Self::RelationBuilding => "relation building",
            Self::ProgramAssembly => "program assembly",
        }
    }
}

/// Error taxonomy shared with the transport layer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The extraction service call failed or timed out.
    ExtractionFailure,
    /// Malformed JSON/XML or an unknown operation type.
    SchemaViolation,
    /// A needed upstream block or relation is absent or failed.
    MissingArtifact,
    /// A file read or write failed.
    StorageFailure,
    /// Catalog or paths missing or invalid.
    ConfigurationError,
}

/// The most recent pipeline-fatal error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    pub kind: ErrorKind,

    /// Stage whose input must be corrected.
    pub stage: StageKind,

    /// Human-readable description.
    pub message: String,

    /// Raw upstream payload kept for diagnostics, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Author of a transcript entry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    User,
    Assistant,
}

/// One append-only transcript entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions_are_allowed() {
        use DialogState::*;
        let path = [
            Initial,
            AwaitingTaskListReview,
            AwaitingModuleStepsReview,
            GeneratingBlocks,
            GeneratingRelation,
            AssemblingProgram,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{:?} -> {:?} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_skipping_stages_is_rejected() {
        use DialogState::*;
        assert!(!Initial.can_transition_to(GeneratingBlocks));
        assert!(!AwaitingTaskListReview.can_transition_to(Done));
        assert!(!GeneratingBlocks.can_transition_to(AssemblingProgram));
        assert!(!Done.can_transition_to(Initial));
    }

    #[test]
    fn test_error_reachable_from_everywhere_but_done() {
        use DialogState::*;
        for state in [
            Initial,
            AwaitingTaskListReview,
            AwaitingModuleStepsReview,
            GeneratingBlocks,
            GeneratingRelation,
            AssemblingProgram,
            AwaitingCorrection,
        ] {
            assert!(state.can_transition_to(Error));
        }
        assert!(!Done.can_transition_to(Error));
    }

    #[test]
    fn test_awaiting_correction_only_from_error() {
        use DialogState::*;
        assert!(Error.can_transition_to(AwaitingCorrection));
        assert!(!Initial.can_transition_to(AwaitingCorrection));
        assert!(!GeneratingBlocks.can_transition_to(AwaitingCorrection));
    }

    #[test]
    fn test_dialog_state_serializes_camel_case() {
        let json = serde_json::to_value(DialogState::AwaitingTaskListReview).unwrap();
        assert_eq!(json, "awaitingTaskListReview");
    }
}
