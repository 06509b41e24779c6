//! Generated blocks, the relation tree, and assembled documents.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Outcome of synthesizing a single block.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub enum BlockStatus {
    Success,
    Failure,
}

/// One synthesized XML fragment for a single robot operation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Unique within a run, allocated from `PipelineState::next_block_id`.
    pub id: u32,

    pub operation_type: String,

    /// The operation-step text the block was generated from.
    pub source_description: String,

    /// Name of the task the step belongs to.
    pub task_name: String,

    /// The step was marked `[disabled]`.
    #[serde(default)]
    pub disabled: bool,

    pub status: BlockStatus,

    /// Extracted XML, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml_content: Option<String>,

    /// Raw service output, retained when extraction failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,

    /// Where the block was written, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Block {
    pub fn is_success(&self) -> bool {
        self.status == BlockStatus::Success
            && self
                .xml_content
                .as_deref()
                .is_some_and(|xml| !xml.trim().is_empty())
    }
}

/// Index of a node inside a [`RelationTree`] arena.
pub type NodeIndex = usize;

/// A named body slot (loop body, branch) holding an ordered child chain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct BodySlot {
    pub name: String,

    /// First node of the slot's chain; later children follow via `next`.
    pub first: Option<NodeIndex>,
}

/// Nesting/sequencing information for one block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct RelationNode {
    pub block_id: u32,
    pub operation_type: String,

    #[serde(default)]
    pub slots: Vec<BodySlot>,

    /// Sequential successor at the same depth.
    #[serde(default)]
    pub next: Option<NodeIndex>,
}

impl RelationNode {
    pub fn new(block_id: u32, operation_type: impl Into<String>) -> Self {
        Self {
            block_id,
            operation_type: operation_type.into(),
            slots: Vec::new(),
            next: None,
        }
    }

    pub fn slot(&self, name: &str) -> Option<&BodySlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }
}

/// Arena of relation nodes. Parent/child links are indices into `nodes`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct RelationTree {
    pub nodes: Vec<RelationNode>,

    /// First top-level node.
    pub root: Option<NodeIndex>,
}

impl RelationTree {
    pub fn node(&self, index: NodeIndex) -> Option<&RelationNode> {
        self.nodes.get(index)
    }

    /// Follow `next` links starting at `first`.
    pub fn chain(&self, first: Option<NodeIndex>) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut cursor = first;
        while let Some(index) = cursor {
            if out.contains(&index) {
                break;
            }
            out.push(index);
            cursor = self.nodes.get(index).and_then(|node| node.next);
        }
        out
    }

    /// Index of the node holding `block_id`.
    pub fn find_block(&self, block_id: u32) -> Option<NodeIndex> {
        self.nodes.iter().position(|node| node.block_id == block_id)
    }
}

/// The relation tree plus its serialized form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct RelationDocument {
    pub tree: RelationTree,
    pub xml: String,
    pub path: String,
}

/// The assembled program.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct FinalDocument {
    pub xml: String,
    pub path: String,
}
