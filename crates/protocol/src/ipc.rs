//! Progress events streamed to the chat transport.
//!
//! Events are best-effort: they exist for progress display only, and the
//! pipeline's correctness never depends on their delivery.
//!
//! Uses tagged enum serialization for TypeScript compatibility:
//! ```json
//! {
//!   "type": "stageStarted",
//!   "payload": {
//!     "run_id": "uuid-here",
//!     "stage": "blockSynthesis"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::dialog_models::{DialogState, ErrorKind, StageKind};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A new run has been created.
    RunStarted {
        #[ts(type = "string")]
        run_id: Uuid,
        run_directory: String,
    },

    /// The run moved between dialog states.
    DialogStateChanged {
        #[ts(type = "string")]
        run_id: Uuid,
        from: DialogState,
        to: DialogState,
    },

    /// A stage began executing.
    StageStarted {
        #[ts(type = "string")]
        run_id: Uuid,
        stage: StageKind,
    },

    /// A stage finished; `failed` counts item-local failures.
    StageCompleted {
        #[ts(type = "string")]
        run_id: Uuid,
        stage: StageKind,
        items: usize,
        failed: usize,
    },

    /// Partial text from an extraction call.
    ///
    /// `item` identifies the fan-out item (task or block index), if any.
    ProgressChunk {
        #[ts(type = "string")]
        run_id: Uuid,
        stage: StageKind,
        item: Option<usize>,
        content: String,
    },

    /// The run is waiting for a reply.
    Paused {
        #[ts(type = "string")]
        run_id: Uuid,
        question: String,
    },

    /// A stage failed fatally.
    RunError {
        #[ts(type = "string")]
        run_id: Uuid,
        kind: ErrorKind,
        message: String,
    },

    /// The final program has been written.
    RunCompleted {
        #[ts(type = "string")]
        run_id: Uuid,
        program_path: String,
    },
}
