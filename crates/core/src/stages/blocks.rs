//! Stage 4: synthesize one XML block per operation step.
//!
//! Every step gets a run-unique id up front. Calls for all steps run
//! concurrently; results are written back by position, so block order always
//! follows task order then step order regardless of completion order.

use crate::error::StageError;
use crate::extraction::{fenced_block, ExtractionRequest, ProgressTag};
use crate::stages::mapper::slots_for_step;
use crate::catalog::Catalog;
use crate::stages::steps::{citation_error, operation_steps};
use crate::stages::xml::parse_fragment;
use crate::stages::StageContext;
use futures::future::join_all;
use sas_protocol::{Block, BlockStatus, CatalogEntry, OperationStep, ParameterMapping, StageKind, Task};
use std::path::Path;

/// A step waiting for its block, with the id it will carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockJob {
    pub id: u32,
    pub step: OperationStep,
}

impl BlockJob {
    /// Rebuild the job that produced `block`, keeping its id.
    pub fn from_block(block: &Block) -> Self {
        let operation_type = (!block.operation_type.is_empty()).then(|| block.operation_type.clone());
        Self {
            id: block.id,
            step: OperationStep {
                task_name: block.task_name.clone(),
                text: block.source_description.clone(),
                operation_type,
                disabled: block.disabled,
            },
        }
    }
}

/// Result of one stage-4 pass.
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    /// Blocks in job order.
    pub blocks: Vec<Block>,
    /// Ids of blocks that failed in this pass.
    pub failed: Vec<u32>,
}

impl BlockOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure_summary(&self) -> String {
        self.blocks
            .iter()
            .filter(|block| self.failed.contains(&block.id))
            .map(|block| {
                format!(
                    "- block {} ({}): {}",
                    block.id,
                    display_type(&block.operation_type),
                    block.error_message.as_deref().unwrap_or("unknown error")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn display_type(operation_type: &str) -> &str {
    if operation_type.is_empty() {
        "uncited"
    } else {
        operation_type
    }
}

/// Assign ids to every step of `tasks`, starting at `next_id`.
///
/// Returns the jobs and the next unused id.
pub fn plan_blocks(tasks: &[Task], next_id: u32) -> (Vec<BlockJob>, u32) {
    let mut id = next_id;
    let jobs = operation_steps(tasks)
        .into_iter()
        .map(|step| {
            let job = BlockJob { id, step };
            id += 1;
            job
        })
        .collect();
    (jobs, id)
}

/// Pull one XML element out of free-form model output.
///
/// A fenced code block wins; otherwise the span from the first `<` to the
/// last `>`. Returns `None` unless the candidate starts with `<` and ends
/// with `>`.
pub fn extract_xml(text: &str) -> Option<String> {
    let candidate = match fenced_block(text) {
        Some(fenced) => fenced.trim(),
        None => {
            let start = text.find('<')?;
            let end = text.rfind('>')?;
            if end < start {
                return None;
            }
            &text[start..=end]
        }
    };

    (candidate.starts_with('<') && candidate.ends_with('>')).then(|| candidate.to_string())
}

fn system_prompt() -> &'static str {
    "You write exactly one block of a Blockly-style XML robot program.\n\
     Start from the skeleton you are given, keep its `type` attribute, and fill in field \
     values for the operation described. Use the parameter slot ids listed for point, number \
     and flag references. Do not add `<next>` or `<statement>` children.\n\
     Answer with the XML block only."
}

fn user_prompt(step: &OperationStep, entry: &CatalogEntry, mapping: &ParameterMapping, guidance: Option<&str>) -> String {
    let mut prompt = format!(
        "Operation: {}\nOperation type: {}\n",
        step.text, entry.operation_type
    );
    if !entry.description.is_empty() {
        prompt.push_str(&format!("Type description: {}\n", entry.description));
    }

    let slots = slots_for_step(&step.text, mapping);
    if !slots.is_empty() {
        prompt.push_str("Parameter slots:\n");
        for (kind, name, slot_id) in slots {
            prompt.push_str(&format!("- {} \"{}\" -> {}\n", kind.label(), name, slot_id));
        }
    }

    prompt.push_str(&format!("Skeleton:\n{}\n", entry.skeleton_xml));

    if let Some(guidance) = guidance.filter(|g| !g.trim().is_empty()) {
        prompt.push_str(&format!("\nAdditional guidance:\n{guidance}\n"));
    }
    prompt
}

fn failed_block(job: &BlockJob, error: &StageError) -> Block {
    Block {
        id: job.id,
        operation_type: job.step.operation_type.clone().unwrap_or_default(),
        source_description: job.step.text.clone(),
        task_name: job.step.task_name.clone(),
        disabled: job.step.disabled,
        status: BlockStatus::Failure,
        xml_content: None,
        raw_output: error.raw().map(str::to_string),
        file_path: None,
        error_message: Some(error.to_string()),
    }
}

/// Relative path of a block file inside the run directory.
pub fn block_file_name(id: u32, operation_type: &str) -> String {
    format!("blocks/block_{id}_{operation_type}.xml")
}

async fn write_block(run_dir: &Path, id: u32, operation_type: &str, xml: &str) -> Result<String, StageError> {
    let path = run_dir.join(block_file_name(id, operation_type));
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StageError::storage(format!("{}: {e}", parent.display())))?;
    }
    tokio::fs::write(&path, xml)
        .await
        .map_err(|e| StageError::storage(format!("{}: {e}", path.display())))?;
    Ok(path.display().to_string())
}

async fn synthesize_block(
    ctx: &StageContext<'_>,
    position: usize,
    job: &BlockJob,
    mapping: &ParameterMapping,
    guidance: Option<&str>,
) -> Result<Block, StageError> {
    let Some(entry) = job.step.operation_type.as_deref().and_then(|t| ctx.catalog.get(t)) else {
        let message = citation_error(&job.step, ctx.catalog).unwrap_or_default();
        return Err(StageError::schema(message));
    };
    let operation_type = entry.operation_type.as_str();

    let request = ExtractionRequest::new(system_prompt(), user_prompt(&job.step, entry, mapping, guidance))
        .with_working_dir(ctx.working_dir());
    let text = ctx
        .extraction
        .complete(
            &request,
            ProgressTag::new(ctx.run_id, StageKind::BlockSynthesis).item(position),
        )
        .await?;

    let Some(xml) = extract_xml(&text) else {
        return Err(StageError::SchemaViolation {
            message: "output is not an XML element".to_string(),
            raw: Some(text),
        });
    };
    if let Err(e) = parse_fragment(&xml) {
        return Err(StageError::SchemaViolation {
            message: e.to_string(),
            raw: Some(text),
        });
    }

    let file_path = write_block(ctx.run_dir, job.id, operation_type, &xml).await?;

    Ok(Block {
        id: job.id,
        operation_type: operation_type.to_string(),
        source_description: job.step.text.clone(),
        task_name: job.step.task_name.clone(),
        disabled: job.step.disabled,
        status: BlockStatus::Success,
        xml_content: Some(xml),
        raw_output: None,
        file_path: Some(file_path),
        error_message: None,
    })
}

/// Run stage 4 for `jobs`.
///
/// `guidance` is the latest correction reply, forwarded to every prompt when
/// failed blocks are regenerated.
pub async fn synthesize_blocks(
    ctx: &StageContext<'_>,
    jobs: &[BlockJob],
    mapping: &ParameterMapping,
    guidance: Option<&str>,
) -> BlockOutcome {
    let calls = jobs.iter().enumerate().map(|(position, job)| async move {
        match synthesize_block(ctx, position, job, mapping, guidance).await {
            Ok(block) => block,
            Err(err) => {
                tracing::warn!(block_id = job.id, error = %err, "block synthesis failed");
                failed_block(job, &err)
            }
        }
    });
    let blocks = join_all(calls).await;

    let failed = blocks
        .iter()
        .filter(|block| !block.is_success())
        .map(|block| block.id)
        .collect();

    BlockOutcome { blocks, failed }
}

/// A failed block whose step cites no type, or a type `catalog` lacks.
///
/// Regenerating such a block can never succeed; its task needs new steps.
pub fn needs_new_steps(block: &Block, catalog: &Catalog) -> bool {
    !block.is_success() && (block.operation_type.is_empty() || !catalog.contains(&block.operation_type))
}

/// Replace blocks in `existing` by id with their regenerated versions.
pub fn merge_blocks(existing: &[Block], regenerated: Vec<Block>) -> Vec<Block> {
    let mut merged = existing.to_vec();
    for block in regenerated {
        match merged.iter_mut().find(|b| b.id == block.id) {
            Some(slot) => *slot = block,
            None => merged.push(block),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::adapters::MockExtractor;
    use crate::extraction::ExtractionManager;
    use sas_protocol::{ScopeRole, TaskType};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn entry(operation_type: &str) -> CatalogEntry {
        CatalogEntry {
            operation_type: operation_type.to_string(),
            skeleton_xml: format!(r#"<block type="{operation_type}"/>"#),
            description: String::new(),
            parameters: Vec::new(),
            scope: ScopeRole::None,
            body_slot: None,
        }
    }

    fn task(name: &str, details: &[&str]) -> Task {
        let mut task = Task::new(name, TaskType::MoveTask, name);
        task.details = details.iter().map(|d| d.to_string()).collect();
        task
    }

    #[test]
    fn test_extract_xml_prefers_fence() {
        let text = "Here <b>\n```xml\n<block type=\"grip\"/>\n```\n";
        assert_eq!(extract_xml(text).as_deref(), Some(r#"<block type="grip"/>"#));
    }

    #[test]
    fn test_extract_xml_span() {
        let text = "Sure: <block type=\"moveP\"><field name=\"point\">P1</field></block> done";
        assert_eq!(
            extract_xml(text).as_deref(),
            Some(r#"<block type="moveP"><field name="point">P1</field></block>"#)
        );
    }

    #[test]
    fn test_extract_xml_rejects_non_xml() {
        assert_eq!(extract_xml("no markup here"), None);
        assert_eq!(extract_xml("```\nnot xml\n```"), None);
        assert_eq!(extract_xml("> backwards <"), None);
    }

    #[test]
    fn test_plan_blocks_allocates_sequential_ids() {
        let tasks = vec![
            task("A", &["a1 (Block Type: moveP)", "a2 (Block Type: grip)"]),
            task("B", &["b1 (Block Type: moveP)"]),
        ];
        let (jobs, next) = plan_blocks(&tasks, 7);
        let ids: Vec<u32> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![7, 8, 9]);
        assert_eq!(next, 10);
        assert_eq!(jobs[2].step.task_name, "B");
    }

    #[tokio::test]
    async fn test_synthesize_blocks_isolates_failures() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::from_entries([entry("moveP"), entry("grip")]);
        let mock = MockExtractor::replying(r#"<block type="moveP"/>"#)
            .when("Operation: close", "I cannot do that")
            .fail_when("Operation: crash", "backend down");
        let manager = ExtractionManager::new(Arc::new(mock));
        let ctx = StageContext {
            run_id: uuid::Uuid::new_v4(),
            catalog: &catalog,
            extraction: &manager,
            run_dir: dir.path(),
            history: &[],
        };

        let tasks = vec![task(
            "A",
            &[
                "open (Block Type: moveP)",
                "close (Block Type: grip)",
                "crash (Block Type: moveP)",
                "dance (Block Type: tango)",
                "uncited step",
            ],
        )];
        let (jobs, _) = plan_blocks(&tasks, 1);
        let outcome = synthesize_blocks(&ctx, &jobs, &ParameterMapping::default(), None).await;

        assert_eq!(outcome.blocks.len(), 5);
        assert_eq!(outcome.failed, vec![2, 3, 4, 5]);
        assert!(outcome.blocks[0].is_success());
        assert!(dir.path().join("blocks/block_1_moveP.xml").exists());
        assert_eq!(outcome.blocks[1].raw_output.as_deref(), Some("I cannot do that"));
        assert!(outcome.blocks[3]
            .error_message
            .as_deref()
            .unwrap()
            .contains("unknown operation type"));
        assert!(outcome.failure_summary().contains("block 5 (uncited)"));

        let stale: Vec<u32> = outcome
            .blocks
            .iter()
            .filter(|block| needs_new_steps(block, &catalog))
            .map(|block| block.id)
            .collect();
        assert_eq!(stale, vec![4, 5]);
    }

    #[test]
    fn test_merge_blocks_keeps_ids_and_order() {
        let job = BlockJob {
            id: 2,
            step: OperationStep {
                task_name: "A".to_string(),
                text: "close (Block Type: grip)".to_string(),
                operation_type: Some("grip".to_string()),
                disabled: false,
            },
        };
        let failed = failed_block(&job, &StageError::schema("bad"));
        let mut fixed = failed.clone();
        fixed.status = BlockStatus::Success;
        fixed.xml_content = Some("<block type=\"grip\"/>".to_string());

        let first = failed_block(
            &BlockJob {
                id: 1,
                step: job.step.clone(),
            },
            &StageError::schema("bad"),
        );
        let merged = merge_blocks(&[first, failed.clone()], vec![fixed]);
        assert_eq!(merged.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(merged[1].is_success());
        assert_eq!(BlockJob::from_block(&failed), job);
    }
}
