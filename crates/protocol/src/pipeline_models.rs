//! The persisted pipeline state.
//!
//! A single [`PipelineState`] is created per robot task and threaded through
//! every pipeline invocation. It is serialized after every stage so a run can
//! be resumed from nothing but this object and the next user reply.

use crate::block_models::{Block, FinalDocument, RelationDocument};
use crate::dialog_models::{ChatMessage, DialogState, LastError};
use crate::parameter_models::ParameterMapping;
use crate::task_models::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    /// Unique identifier for this run.
    #[ts(type = "string")]
    pub run_id: Uuid,

    /// Append-only transcript.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// The task description with all accepted feedback folded in.
    #[serde(default)]
    pub active_description: String,

    pub dialog_state: DialogState,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub task_list_accepted: bool,

    #[serde(default)]
    pub module_steps_accepted: bool,

    /// Monotonic count of revisions and corrections.
    #[serde(default)]
    pub revision_iteration: u32,

    /// Next block id to hand out. Never reused within a run.
    #[serde(default = "first_block_id")]
    pub next_block_id: u32,

    #[serde(default)]
    pub generated_blocks: Vec<Block>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_mapping: Option<ParameterMapping>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_document: Option<RelationDocument>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_document: Option<FinalDocument>,

    /// The question the run is paused on, re-emitted verbatim until answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_question: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,

    /// Directory receiving this run's artifacts.
    pub run_directory: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn first_block_id() -> u32 {
    1
}

impl PipelineState {
    /// Create an empty state in `Initial`.
    pub fn new(run_id: Uuid, run_directory: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            messages: Vec::new(),
            active_description: String::new(),
            dialog_state: DialogState::Initial,
            tasks: Vec::new(),
            task_list_accepted: false,
            module_steps_accepted: false,
            revision_iteration: 0,
            next_block_id: first_block_id(),
            generated_blocks: Vec::new(),
            parameter_mapping: None,
            relation_document: None,
            final_document: None,
            pending_question: None,
            last_error: None,
            run_directory: run_directory.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a block by id.
    pub fn block(&self, id: u32) -> Option<&Block> {
        self.generated_blocks.iter().find(|block| block.id == id)
    }

    /// Blocks that succeeded, in generation order.
    pub fn successful_blocks(&self) -> impl Iterator<Item = &Block> {
        self.generated_blocks.iter().filter(|block| block.is_success())
    }

    /// Content of the latest assistant message, if any.
    pub fn last_assistant_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == crate::dialog_models::Role::Assistant)
            .map(|message| message.content.as_str())
    }
}
