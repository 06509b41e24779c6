//! Pipeline orchestration engine.
//!
//! The PipelineEngine owns no run state. Every call to
//! [`PipelineEngine::invoke`] receives the previous `PipelineState` (or none)
//! plus the next user reply, drives stages until the run pauses, finishes or
//! fails, persists the state, and hands it back.

use crate::catalog::{load_catalog, Catalog};
use crate::config::AppConfig;
use crate::error::StageError;
use crate::extraction::{ExtractionManager, ExtractorFactory};
use crate::params::ParameterStore;
use crate::stages::assembler::write_program;
use crate::stages::blocks::{merge_blocks, needs_new_steps, plan_blocks, synthesize_blocks, BlockJob};
use crate::stages::decomposer::decompose;
use crate::stages::mapper::map_parameters;
use crate::stages::relation::generate_relation;
use crate::stages::review::{classify, fold_feedback, module_steps_prompt, task_list_prompt, ReviewDecision};
use crate::stages::synthesizer::{synthesize_steps, SynthesisScope};
use crate::stages::StageContext;
use crate::state::transitions::pause;
use crate::state::{create_state, emit, record_error, transition, StateStore};
use anyhow::{Context, Result};
use sas_protocol::{ChatMessage, DialogState, Event, ParameterMapping, PipelineState, StageKind};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::Sender;
use tracing::Instrument;

const DESCRIPTION_QUESTION: &str =
    "Describe the robot task you want to program, e.g. \"pick parts from the conveyor and place them in the bin\".";

/// Result of one [`PipelineEngine::invoke`] call.
#[derive(Debug, Clone)]
pub struct InvokeOutcome {
    pub state: PipelineState,

    /// The question or report to show the user, if any.
    pub assistant_message: Option<String>,

    /// The run is waiting for a reply.
    pub is_paused: bool,

    /// The program has been written.
    pub is_done: bool,

    /// The run is waiting for a correction after a stage failure.
    pub is_error: bool,
}

impl InvokeOutcome {
    fn from_state(state: PipelineState) -> Self {
        let is_done = state.dialog_state == DialogState::Done;
        let assistant_message = match &state.pending_question {
            Some(question) => Some(question.clone()),
            None if is_done => state.last_assistant_message().map(str::to_string),
            None => None,
        };
        Self {
            is_paused: state.pending_question.is_some(),
            is_error: state.dialog_state == DialogState::AwaitingCorrection,
            is_done,
            assistant_message,
            state,
        }
    }
}

/// The main pipeline orchestrator.
///
/// Collaborators are injected: the operation catalog, the extraction manager
/// and the resolved configuration. The engine itself is stateless between
/// calls and can serve any number of runs.
pub struct PipelineEngine {
    config: AppConfig,
    catalog: Catalog,
    extraction: ExtractionManager,
    store: StateStore,
    events_tx: Option<Sender<Event>>,
}

impl PipelineEngine {
    /// Create a new PipelineEngine.
    ///
    /// # Arguments
    ///
    /// * `config` - Resolved configuration (paths, gates, parameter store)
    /// * `catalog` - The operation catalog, read-only for every run
    /// * `extraction` - The manager every extraction call goes through
    pub fn new(config: AppConfig, catalog: Catalog, extraction: ExtractionManager) -> Self {
        let store = StateStore::new(config.global.pipeline.snapshots);
        Self {
            config,
            catalog,
            extraction,
            store,
            events_tx: None,
        }
    }

    /// Build an engine from configuration alone.
    ///
    /// Loads the catalog from the configured directory and creates the
    /// extraction backends named in `[extraction]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or no extraction
    /// backend can be constructed.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let catalog = load_catalog(&config.catalog_dir())
            .with_context(|| format!("loading catalog from {}", config.catalog_dir().display()))?;
        let extraction = ExtractorFactory::manager(&config.global.extraction)?;
        Ok(Self::new(config, catalog, extraction))
    }

    /// Stream progress events to `events_tx`.
    pub fn with_events(mut self, events_tx: Sender<Event>) -> Self {
        self.extraction = self.extraction.clone().with_events(events_tx.clone());
        self.events_tx = Some(events_tx);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn events(&self) -> Option<&Sender<Event>> {
        self.events_tx.as_ref()
    }

    /// Advance a run by one user turn.
    ///
    /// # Arguments
    ///
    /// * `prior` - State returned by the previous call, or `None` for a new run
    /// * `reply` - The user's reply, if any
    ///
    /// # Returns
    ///
    /// The updated state and what to show the user. When the run is paused
    /// and no reply is given, the same question is returned and the state is
    /// not touched.
    ///
    /// # Errors
    ///
    /// Stage failures are not errors: they are recorded in the state and the
    /// run waits for a correction. An error is returned only for an illegal
    /// dialog transition.
    pub async fn invoke(&self, prior: Option<PipelineState>, reply: Option<&str>) -> Result<InvokeOutcome> {
        let reply = reply.map(str::trim).filter(|reply| !reply.is_empty());

        let mut state = match prior {
            Some(state) if state.dialog_state == DialogState::Done && reply.is_some() => {
                tracing::info!(previous = %state.run_id, "reply to a finished run starts a new run");
                self.start_run()
            }
            Some(state) => state,
            None => self.start_run(),
        };

        if state.pending_question.is_some() && reply.is_none() {
            return Ok(InvokeOutcome::from_state(state));
        }

        let span = tracing::info_span!("invoke", run_id = %state.run_id, state = state.dialog_state.label());
        async {
            match reply {
                Some(reply) => {
                    state.messages.push(ChatMessage::user(reply));
                    state.pending_question = None;
                    self.handle_reply(&mut state, reply).await
                }
                None => self.resume(&mut state).await,
            }
        }
        .instrument(span)
        .await?;

        self.persist(&state).await;
        Ok(InvokeOutcome::from_state(state))
    }

    fn start_run(&self) -> PipelineState {
        let state = create_state(&self.config.runs_dir());
        tracing::info!(run_id = %state.run_id, dir = %state.run_directory, "starting run");
        emit(
            self.events(),
            Event::RunStarted {
                run_id: state.run_id,
                run_directory: state.run_directory.clone(),
            },
        );
        state
    }

    async fn handle_reply(&self, state: &mut PipelineState, reply: &str) -> Result<(), StageError> {
        match state.dialog_state {
            DialogState::Initial => {
                state.active_description = reply.to_string();
                self.run_decomposition(state).await
            }
            DialogState::AwaitingTaskListReview => match classify(reply) {
                ReviewDecision::Accept => {
                    state.task_list_accepted = true;
                    self.run_synthesis(state, SynthesisScope::All).await
                }
                ReviewDecision::Revise(feedback) => {
                    state.active_description = fold_feedback(&state.active_description, &feedback, "Revision");
                    state.revision_iteration += 1;
                    self.run_decomposition(state).await
                }
            },
            DialogState::AwaitingModuleStepsReview => match classify(reply) {
                ReviewDecision::Accept => self.accept_module_steps(state).await,
                ReviewDecision::Revise(feedback) => {
                    state.active_description = fold_feedback(&state.active_description, &feedback, "Revision");
                    state.revision_iteration += 1;
                    self.run_synthesis(state, SynthesisScope::All).await
                }
            },
            DialogState::Error => {
                transition(state, DialogState::AwaitingCorrection, self.events())?;
                self.apply_correction(state, reply).await
            }
            DialogState::AwaitingCorrection => self.apply_correction(state, reply).await,
            // An interrupted stage 4 takes the reply as block guidance.
            DialogState::GeneratingBlocks => {
                let regenerate = !state.generated_blocks.is_empty();
                self.run_generation(state, regenerate, Some(reply)).await
            }
            DialogState::GeneratingRelation | DialogState::AssemblingProgram => {
                tracing::debug!(
                    state = state.dialog_state.label(),
                    "reply ignored while resuming an interrupted stage"
                );
                self.resume(state).await
            }
            // Replies to finished runs were turned into new runs by the caller.
            DialogState::Done => Ok(()),
        }
    }

    /// Continue without a reply.
    async fn resume(&self, state: &mut PipelineState) -> Result<(), StageError> {
        match state.dialog_state {
            DialogState::Initial => {
                pause(state, DESCRIPTION_QUESTION.to_string(), self.events());
                Ok(())
            }
            DialogState::GeneratingBlocks => {
                let regenerate = !state.generated_blocks.is_empty();
                self.run_generation(state, regenerate, None).await
            }
            DialogState::GeneratingRelation => self.run_relation(state).await,
            DialogState::AssemblingProgram => self.run_assembly(state).await,
            // Paused states without a pending question (hand-edited state) and
            // finished runs have nothing to drive.
            _ => Ok(()),
        }
    }

    /// Feed a correction reply to the stage that failed last.
    async fn apply_correction(&self, state: &mut PipelineState, reply: &str) -> Result<(), StageError> {
        let stage = state
            .last_error
            .take()
            .map_or(StageKind::TaskDecomposition, |error| error.stage);

        state.active_description = fold_feedback(&state.active_description, reply, "Correction");
        state.revision_iteration += 1;
        tracing::info!(stage = ?stage, revision = state.revision_iteration, "applying correction");

        match stage {
            StageKind::TaskDecomposition => self.run_decomposition(state).await,
            StageKind::StepSynthesis => self.run_synthesis(state, SynthesisScope::FailedOnly).await,
            StageKind::ParameterMapping => self.run_generation(state, false, Some(reply)).await,
            StageKind::BlockSynthesis => {
                let stale = self.tasks_needing_new_steps(state);
                if stale.is_empty() {
                    return self.run_generation(state, true, Some(reply)).await;
                }
                tracing::info!(tasks = ?stale, "failed blocks need new steps");
                for index in stale {
                    state.tasks[index].synthesis_error =
                        Some("steps cite operation types that cannot be generated".to_string());
                }
                self.run_synthesis(state, SynthesisScope::FailedOnly).await
            }
            StageKind::RelationBuilding => self.run_relation(state).await,
            StageKind::ProgramAssembly => self.run_assembly(state).await,
        }
    }

    /// Indices of tasks owning a block that failed on its citation.
    fn tasks_needing_new_steps(&self, state: &PipelineState) -> Vec<usize> {
        state
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| {
                state
                    .generated_blocks
                    .iter()
                    .any(|block| block.task_name == task.name && needs_new_steps(block, &self.catalog))
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Record a stage failure, unless it is a programming error.
    fn fail(&self, state: &mut PipelineState, stage: StageKind, error: StageError) -> Result<(), StageError> {
        if matches!(error, StageError::IllegalTransition { .. }) {
            return Err(error);
        }
        record_error(state, stage, &error, self.events())
    }

    /// Move to `to` unless the run is already there (resuming a stage).
    fn enter(&self, state: &mut PipelineState, to: DialogState) -> Result<(), StageError> {
        if state.dialog_state == to {
            return Ok(());
        }
        transition(state, to, self.events())
    }

    fn stage_started(&self, state: &PipelineState, stage: StageKind) {
        tracing::info!(stage = ?stage, "stage started");
        emit(
            self.events(),
            Event::StageStarted {
                run_id: state.run_id,
                stage,
            },
        );
    }

    fn stage_completed(&self, state: &PipelineState, stage: StageKind, items: usize, failed: usize) {
        tracing::info!(stage = ?stage, items, failed, "stage completed");
        emit(
            self.events(),
            Event::StageCompleted {
                run_id: state.run_id,
                stage,
                items,
                failed,
            },
        );
    }

    async fn persist(&self, state: &PipelineState) {
        if let Err(e) = self.store.save(state).await {
            tracing::error!(run_id = %state.run_id, error = %e, "failed to persist pipeline state");
        }
    }

    /// Clear everything derived from the current task list.
    async fn reset_downstream(state: &mut PipelineState) {
        discard_blocks(state).await;
        state.parameter_mapping = None;
        state.relation_document = None;
        state.final_document = None;
    }

    async fn run_decomposition(&self, state: &mut PipelineState) -> Result<(), StageError> {
        let stage = StageKind::TaskDecomposition;
        self.stage_started(state, stage);

        let run_dir = PathBuf::from(&state.run_directory);
        let history = state.messages.clone();
        let ctx = self.context(state, &run_dir, &history);

        // Command backends run inside the run directory.
        if let Err(error) = ensure_dir(&run_dir).await {
            return self.fail(state, stage, error);
        }
        let tasks = match decompose(&ctx, &state.active_description).await {
            Ok(tasks) => tasks,
            Err(error) => return self.fail(state, stage, error),
        };
        self.stage_completed(state, stage, tasks.len(), 0);

        state.tasks = tasks;
        state.task_list_accepted = false;
        state.module_steps_accepted = false;
        Self::reset_downstream(state).await;

        transition(state, DialogState::AwaitingTaskListReview, self.events())?;
        self.persist(state).await;

        if self.config.global.pipeline.auto_accept_task_list {
            state.messages.push(ChatMessage::assistant(task_list_prompt(&state.tasks)));
            state.task_list_accepted = true;
            return self.run_synthesis(state, SynthesisScope::All).await;
        }

        pause(state, task_list_prompt(&state.tasks), self.events());
        Ok(())
    }

    async fn run_synthesis(&self, state: &mut PipelineState, scope: SynthesisScope) -> Result<(), StageError> {
        let stage = StageKind::StepSynthesis;
        self.stage_started(state, stage);

        let run_dir = PathBuf::from(&state.run_directory);
        let history = state.messages.clone();
        let ctx = self.context(state, &run_dir, &history);

        let outcome = synthesize_steps(&ctx, &state.tasks, &state.active_description, scope).await;
        let items = match scope {
            SynthesisScope::All => state.tasks.len(),
            SynthesisScope::FailedOnly => state.tasks.iter().filter(|t| t.synthesis_error.is_some()).count(),
        };
        self.stage_completed(state, stage, items, outcome.failed.len());

        let complete = outcome.is_complete();
        let summary = outcome.failure_summary();
        let failed = outcome.failed.len();
        state.tasks = outcome.tasks;
        state.module_steps_accepted = false;
        Self::reset_downstream(state).await;

        if !complete {
            let error = StageError::ExtractionFailure {
                message: format!(
                    "{failed} of {} tasks could not be expanded into steps:\n{summary}",
                    state.tasks.len()
                ),
                raw: None,
            };
            return self.fail(state, stage, error);
        }

        transition(state, DialogState::AwaitingModuleStepsReview, self.events())?;
        self.persist(state).await;

        if self.config.global.pipeline.auto_accept_module_steps {
            state.messages.push(ChatMessage::assistant(module_steps_prompt(&state.tasks)));
            return self.accept_module_steps(state).await;
        }

        pause(state, module_steps_prompt(&state.tasks), self.events());
        Ok(())
    }

    async fn accept_module_steps(&self, state: &mut PipelineState) -> Result<(), StageError> {
        state.module_steps_accepted = true;
        self.run_generation(state, false, None).await
    }

    /// Stages 3 and 4.
    ///
    /// With `regenerate_failed`, only blocks that failed before are
    /// synthesized again (keeping their ids) and the previous parameter
    /// mapping is reused.
    async fn run_generation(
        &self,
        state: &mut PipelineState,
        regenerate_failed: bool,
        guidance: Option<&str>,
    ) -> Result<(), StageError> {
        self.enter(state, DialogState::GeneratingBlocks)?;
        state.relation_document = None;
        state.final_document = None;

        let (jobs, mapping) = if regenerate_failed && state.parameter_mapping.is_some() {
            let jobs: Vec<BlockJob> = state
                .generated_blocks
                .iter()
                .filter(|block| !block.is_success())
                .map(BlockJob::from_block)
                .collect();
            (jobs, state.parameter_mapping.clone().unwrap_or_default())
        } else {
            let mapping = match self.run_mapping(state) {
                Ok(mapping) => mapping,
                Err(error) => return self.fail(state, StageKind::ParameterMapping, error),
            };
            state.messages.push(ChatMessage::assistant(mapping.report()));
            state.parameter_mapping = Some(mapping.clone());

            let (jobs, next_id) = plan_blocks(&state.tasks, state.next_block_id);
            state.next_block_id = next_id;
            discard_blocks(state).await;
            (jobs, mapping)
        };

        let stage = StageKind::BlockSynthesis;
        self.stage_started(state, stage);

        let run_dir = PathBuf::from(&state.run_directory);
        let history = state.messages.clone();
        let ctx = self.context(state, &run_dir, &history);
        let outcome = synthesize_blocks(&ctx, &jobs, &mapping, guidance).await;
        self.stage_completed(state, stage, jobs.len(), outcome.failed.len());

        let complete = outcome.is_complete();
        let summary = outcome.failure_summary();
        let failed = outcome.failed.len();
        state.generated_blocks = merge_blocks(&state.generated_blocks, outcome.blocks);
        self.persist(state).await;

        if !complete {
            let error = StageError::ExtractionFailure {
                message: format!(
                    "{failed} of {} blocks could not be generated:\n{summary}",
                    state.generated_blocks.len()
                ),
                raw: None,
            };
            return self.fail(state, stage, error);
        }

        self.run_relation(state).await
    }

    /// Stage 3: bind references to store slots and persist newly claimed labels.
    fn run_mapping(&self, state: &PipelineState) -> Result<ParameterMapping, StageError> {
        self.stage_started(state, StageKind::ParameterMapping);

        let path = self.config.parameter_store_path();
        let mut store = ParameterStore::load_or_default(&path, &self.config.global.parameters)?;
        let mapping = map_parameters(&state.tasks, &mut store);

        let claimed = [&mapping.points, &mapping.numbers, &mapping.flags]
            .iter()
            .flat_map(|assignments| assignments.values())
            .any(|assignment| assignment.newly_claimed);
        if claimed {
            store.save(&path)?;
        }

        let items = mapping.points.len() + mapping.numbers.len() + mapping.flags.len();
        self.stage_completed(state, StageKind::ParameterMapping, items, mapping.unresolved.len());
        Ok(mapping)
    }

    async fn run_relation(&self, state: &mut PipelineState) -> Result<(), StageError> {
        self.enter(state, DialogState::GeneratingRelation)?;
        let stage = StageKind::RelationBuilding;
        self.stage_started(state, stage);

        let run_dir = PathBuf::from(&state.run_directory);
        let document = match ensure_dir(&run_dir).await {
            Ok(()) => generate_relation(&state.generated_blocks, &self.catalog, &run_dir).await,
            Err(error) => Err(error),
        };
        let document = match document {
            Ok(document) => document,
            Err(error) => return self.fail(state, stage, error),
        };

        self.stage_completed(state, stage, document.tree.nodes.len(), 0);
        state.relation_document = Some(document);
        self.persist(state).await;

        self.run_assembly(state).await
    }

    async fn run_assembly(&self, state: &mut PipelineState) -> Result<(), StageError> {
        self.enter(state, DialogState::AssemblingProgram)?;
        let stage = StageKind::ProgramAssembly;
        self.stage_started(state, stage);

        let Some(relation) = state.relation_document.clone() else {
            return self.fail(
                state,
                stage,
                StageError::MissingArtifact("no relation tree has been built".to_string()),
            );
        };

        let run_dir = PathBuf::from(&state.run_directory);
        let document = match write_program(&relation.tree, &state.generated_blocks, &run_dir).await {
            Ok(document) => document,
            Err(error) => return self.fail(state, stage, error),
        };
        self.stage_completed(state, stage, relation.tree.nodes.len(), 0);

        let program_path = document.path.clone();
        state.final_document = Some(document);
        transition(state, DialogState::Done, self.events())?;
        state
            .messages
            .push(ChatMessage::assistant(format!("Program written to {program_path}")));
        emit(
            self.events(),
            Event::RunCompleted {
                run_id: state.run_id,
                program_path,
            },
        );
        Ok(())
    }

    fn context<'a>(
        &'a self,
        state: &PipelineState,
        run_dir: &'a Path,
        history: &'a [ChatMessage],
    ) -> StageContext<'a> {
        StageContext {
            run_id: state.run_id,
            catalog: &self.catalog,
            extraction: &self.extraction,
            run_dir,
            history,
        }
    }
}

/// Drop all generated blocks and delete their files.
async fn discard_blocks(state: &mut PipelineState) {
    for block in std::mem::take(&mut state.generated_blocks) {
        let Some(path) = block.file_path else { continue };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path, error = %e, "cannot remove stale block file"),
        }
    }
}

async fn ensure_dir(dir: &Path) -> Result<(), StageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StageError::storage(format!("{}: {e}", dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::adapters::MockExtractor;
    use sas_protocol::{CatalogEntry, GlobalConfig, ScopeRole};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn engine(root: &Path, mock: MockExtractor) -> PipelineEngine {
        let catalog = Catalog::from_entries([CatalogEntry {
            operation_type: "moveP".to_string(),
            skeleton_xml: r#"<block type="moveP"/>"#.to_string(),
            description: "Move to a point".to_string(),
            parameters: vec!["point".to_string()],
            scope: ScopeRole::None,
            body_slot: None,
        }]);
        let config = AppConfig::new(root, GlobalConfig::default());
        PipelineEngine::new(config, catalog, ExtractionManager::new(Arc::new(mock)))
    }

    #[tokio::test]
    async fn test_new_run_asks_for_description() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path(), MockExtractor::replying("[]"));

        let outcome = engine.invoke(None, None).await.unwrap();

        assert!(outcome.is_paused);
        assert_eq!(outcome.assistant_message.as_deref(), Some(DESCRIPTION_QUESTION));
        assert_eq!(outcome.state.dialog_state, DialogState::Initial);
    }

    #[tokio::test]
    async fn test_re_ask_without_reply_changes_nothing() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path(), MockExtractor::replying("[]"));

        let first = engine.invoke(None, None).await.unwrap();
        let second = engine.invoke(Some(first.state.clone()), None).await.unwrap();
        let third = engine.invoke(Some(second.state.clone()), Some("   ")).await.unwrap();

        assert_eq!(second.state, first.state);
        assert_eq!(third.state, first.state);
        assert_eq!(third.assistant_message, first.assistant_message);
    }

    #[tokio::test]
    async fn test_decomposition_pauses_for_review() {
        let dir = tempdir().unwrap();
        let mock = MockExtractor::replying(
            r#"[{"name":"Approach","type":"MoveTask","description":"move over the part","subTasks":[]}]"#,
        );
        let engine = engine(dir.path(), mock);

        let outcome = engine.invoke(None, Some("move over the part")).await.unwrap();

        let state = &outcome.state;
        assert_eq!(state.dialog_state, DialogState::AwaitingTaskListReview);
        assert!(!state.task_list_accepted);
        assert_eq!(state.tasks.len(), 1);
        assert!(outcome.is_paused);
        assert!(Path::new(&state.run_directory).join("state.json").exists());
    }

    #[tokio::test]
    async fn test_schema_violation_waits_for_correction() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path(), MockExtractor::replying("[]"));

        let outcome = engine.invoke(None, Some("do something")).await.unwrap();

        assert!(outcome.is_error);
        assert_eq!(outcome.state.dialog_state, DialogState::AwaitingCorrection);
        let error = outcome.state.last_error.as_ref().unwrap();
        assert_eq!(error.stage, StageKind::TaskDecomposition);
        assert_eq!(error.raw.as_deref(), Some("[]"));
    }
}
