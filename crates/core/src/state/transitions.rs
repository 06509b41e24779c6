//! Dialog state transitions and their event emission.
//!
//! Every state change goes through [`transition`], which consults the
//! transition table on `DialogState` and emits `DialogStateChanged`. Events
//! are best-effort: a missing or full channel never affects the run.

use crate::error::StageError;
use chrono::Utc;
use sas_protocol::{ChatMessage, DialogState, Event, LastError, PipelineState, StageKind};
use std::path::Path;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

/// Send `event` if a channel is attached, dropping it when the channel is full.
pub fn emit(events_tx: Option<&Sender<Event>>, event: Event) {
    if let Some(tx) = events_tx {
        let _ = tx.try_send(event);
    }
}

/// Create a fresh run in `Initial` with its own directory under `runs_dir`.
///
/// # Arguments
///
/// * `runs_dir` - Parent directory of all run directories
///
/// # Returns
///
/// A new state with a unique `run_id`. The directory itself is created
/// lazily by the first artifact write.
pub fn create_state(runs_dir: &Path) -> PipelineState {
    let run_id = Uuid::new_v4();
    let run_directory = runs_dir.join(run_id.to_string());
    PipelineState::new(run_id, run_directory.display().to_string())
}

/// Move `state` to `to`.
///
/// # Errors
///
/// Returns `StageError::IllegalTransition` when the table forbids the move;
/// the state is left unchanged in that case.
pub fn transition(
    state: &mut PipelineState,
    to: DialogState,
    events_tx: Option<&Sender<Event>>,
) -> Result<(), StageError> {
    let from = state.dialog_state;
    if !from.can_transition_to(to) {
        return Err(StageError::IllegalTransition { from, to });
    }

    state.dialog_state = to;
    state.updated_at = Utc::now();
    tracing::debug!(run_id = %state.run_id, from = from.label(), to = to.label(), "dialog transition");
    emit(
        events_tx,
        Event::DialogStateChanged {
            run_id: state.run_id,
            from,
            to,
        },
    );
    Ok(())
}

/// Append an assistant question and pause on it.
pub fn pause(state: &mut PipelineState, question: String, events_tx: Option<&Sender<Event>>) {
    state.messages.push(ChatMessage::assistant(question.clone()));
    state.pending_question = Some(question.clone());
    state.updated_at = Utc::now();
    emit(
        events_tx,
        Event::Paused {
            run_id: state.run_id,
            question,
        },
    );
}

/// Plain-language explanation of a stage failure.
pub fn error_message(stage: StageKind, error: &StageError) -> String {
    format!(
        "{} failed: {error}\n\nReply with a correction and I will run this stage again with it.",
        stage.title()
    )
}

/// Record `error` raised by `stage` and wait for a correction.
///
/// Moves the run through `Error` into `AwaitingCorrection`, stores
/// `last_error` with the raw payload, and pauses on an explanatory message.
///
/// # Errors
///
/// Only an illegal transition (the run is already `Done`) is returned.
pub fn record_error(
    state: &mut PipelineState,
    stage: StageKind,
    error: &StageError,
    events_tx: Option<&Sender<Event>>,
) -> Result<(), StageError> {
    tracing::warn!(run_id = %state.run_id, stage = ?stage, error = %error, "stage failed");

    transition(state, DialogState::Error, events_tx)?;
    state.last_error = Some(LastError {
        kind: error.kind(),
        stage,
        message: error.to_string(),
        raw: error.raw().map(str::to_string),
    });
    emit(
        events_tx,
        Event::RunError {
            run_id: state.run_id,
            kind: error.kind(),
            message: error.to_string(),
        },
    );

    transition(state, DialogState::AwaitingCorrection, events_tx)?;
    pause(state, error_message(stage, error), events_tx);
    Ok(())
}
