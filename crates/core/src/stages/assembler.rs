//! Stage 6: materialize the relation tree into one program document.

use crate::error::{StageError, StageResult};
use crate::stages::xml::{link_chain, parse_fragment, Element};
use sas_protocol::{Block, FinalDocument, NodeIndex, RelationTree};
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const PROGRAM_FILE: &str = "program.xml";
pub const BLOCKLY_NAMESPACE: &str = "https://developers.google.com/blockly/xml";

struct Assembler<'a> {
    tree: &'a RelationTree,
    blocks: &'a [Block],
    templates: HashMap<u32, Element>,
    visited: HashSet<NodeIndex>,
}

impl<'a> Assembler<'a> {
    fn new(tree: &'a RelationTree, blocks: &'a [Block]) -> Self {
        Self {
            tree,
            blocks,
            templates: HashMap::new(),
            visited: HashSet::new(),
        }
    }

    /// Parsed block XML, memoized by block id.
    fn template(&mut self, block_id: u32) -> StageResult<Element> {
        if let Some(template) = self.templates.get(&block_id) {
            return Ok(template.clone());
        }

        let blocks = self.blocks;
        let block = blocks
            .iter()
            .find(|block| block.id == block_id)
            .ok_or_else(|| StageError::MissingArtifact(format!("block {block_id} was never generated")))?;
        if !block.is_success() {
            return Err(StageError::MissingArtifact(format!(
                "block {block_id} ({}) failed to generate",
                block.operation_type
            )));
        }
        let xml = block.xml_content.as_deref().unwrap_or_default();

        let mut element = parse_fragment(xml).map_err(|e| StageError::SchemaViolation {
            message: format!("block {block_id}: {e}"),
            raw: Some(xml.to_string()),
        })?;
        element.remove_children_named(&["next", "statement"]);
        element.set_attr("id", block_id.to_string());
        if block.disabled {
            element.set_attr("disabled", "true");
        }

        self.templates.insert(block_id, element.clone());
        Ok(element)
    }

    /// One node with its body slots filled, plus its successor.
    fn materialize_node(&mut self, index: NodeIndex) -> StageResult<(Element, Option<NodeIndex>)> {
        if !self.visited.insert(index) {
            return Err(StageError::schema(format!(
                "relation tree reaches node {index} twice"
            )));
        }
        let tree = self.tree;
        let node = tree
            .node(index)
            .ok_or_else(|| StageError::MissingArtifact(format!("relation node {index} does not exist")))?;

        let mut element = self.template(node.block_id)?;

        for slot in &node.slots {
            let mut statement = Element::new("statement").with_attr("name", slot.name.clone());
            if let Some(first) = slot.first {
                statement.push(self.materialize_chain(first)?);
            }
            element.push(statement);
        }

        Ok((element, node.next))
    }

    /// The sibling chain starting at `first`. Walks `next` links in a loop and
    /// recurses only into body slots.
    fn materialize_chain(&mut self, first: NodeIndex) -> StageResult<Element> {
        let mut elements = Vec::new();
        let mut cursor = Some(first);
        while let Some(index) = cursor {
            let (element, next) = self.materialize_node(index)?;
            elements.push(element);
            cursor = next;
        }
        link_chain(elements).ok_or_else(|| StageError::MissingArtifact(format!("relation node {first} is empty")))
    }
}

/// Build the program XML for `tree` from `blocks`.
pub fn assemble_program(tree: &RelationTree, blocks: &[Block]) -> StageResult<String> {
    let root = tree
        .root
        .ok_or_else(|| StageError::MissingArtifact("relation tree is empty".to_string()))?;

    let mut assembler = Assembler::new(tree, blocks);
    let first = assembler.materialize_chain(root)?;

    let document = Element::new("xml")
        .with_attr("xmlns", BLOCKLY_NAMESPACE)
        .with_child(first);
    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}\n",
        document.to_xml()
    ))
}

/// Run stage 6 and write `program.xml` into `run_dir`.
pub async fn write_program(tree: &RelationTree, blocks: &[Block], run_dir: &Path) -> StageResult<FinalDocument> {
    let xml = assemble_program(tree, blocks)?;
    let path = run_dir.join(PROGRAM_FILE);
    tokio::fs::write(&path, &xml)
        .await
        .map_err(|e| StageError::storage(format!("{}: {e}", path.display())))?;

    tracing::info!(path = %path.display(), "program assembled");
    Ok(FinalDocument {
        xml,
        path: path.display().to_string(),
    })
}
