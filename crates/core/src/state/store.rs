//! Persistence of `PipelineState` inside its run directory.
//!
//! Layout:
//! - `<run_dir>/state.json`: latest state, replaced atomically
//! - `<run_dir>/snapshots/<rev>-<state>.json`: one audit copy per stage

use sas_protocol::PipelineState;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STATE_FILE: &str = "state.json";
pub const SNAPSHOT_DIR: &str = "snapshots";

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StateResult<T> = Result<T, StateError>;

/// Writes and reads persisted pipeline state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateStore {
    snapshots: bool,
}

impl StateStore {
    pub fn new(snapshots: bool) -> Self {
        Self { snapshots }
    }

    /// Persist `state` to `state.json` in its run directory.
    ///
    /// A snapshot is written as well when enabled. Snapshot failures are
    /// logged and otherwise ignored.
    ///
    /// # Returns
    ///
    /// The path of `state.json`.
    pub async fn save(&self, state: &PipelineState) -> StateResult<PathBuf> {
        let run_dir = Path::new(&state.run_directory);
        let json = serde_json::to_string_pretty(state).map_err(|source| StateError::Json {
            path: run_dir.join(STATE_FILE),
            source,
        })?;

        let path = run_dir.join(STATE_FILE);
        write_atomic(&path, &json).await?;

        if self.snapshots {
            let snapshot = snapshot_path(run_dir, state);
            if let Err(e) = write_atomic(&snapshot, &json).await {
                tracing::warn!(path = %snapshot.display(), error = %e, "failed to write state snapshot");
            }
        }

        Ok(path)
    }

    /// Load a state previously written by [`StateStore::save`].
    pub async fn load(path: &Path) -> StateResult<PipelineState> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StateError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| StateError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// `snapshots/<revision>-<dialog state>.json` under `run_dir`.
pub fn snapshot_path(run_dir: &Path, state: &PipelineState) -> PathBuf {
    run_dir.join(SNAPSHOT_DIR).join(format!(
        "{:03}-{}.json",
        state.revision_iteration,
        state.dialog_state.label()
    ))
}

async fn write_atomic(path: &Path, content: &str) -> StateResult<()> {
    let io_error = |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await.map_err(io_error)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sas_protocol::DialogState;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::new(Uuid::new_v4(), dir.path().display().to_string());
        state.active_description = "pick and place".to_string();
        state.dialog_state = DialogState::AwaitingTaskListReview;

        let path = StateStore::new(false).save(&state).await.unwrap();
        let loaded = StateStore::load(&path).await.unwrap();

        assert_eq!(loaded, state);
        assert!(!dir.path().join(SNAPSHOT_DIR).exists());
    }

    #[tokio::test]
    async fn test_snapshots_are_named_by_revision_and_state() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::new(Uuid::new_v4(), dir.path().display().to_string());
        state.revision_iteration = 2;
        state.dialog_state = DialogState::AwaitingModuleStepsReview;

        StateStore::new(true).save(&state).await.unwrap();

        assert!(dir
            .path()
            .join("snapshots/002-awaiting_module_steps_review.json")
            .exists());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = StateStore::load(&dir.path().join(STATE_FILE)).await;
        assert!(matches!(result, Err(StateError::Io { .. })));
    }

    #[tokio::test]
    async fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(StateStore::load(&path).await, Err(StateError::Json { .. })));
    }
}
