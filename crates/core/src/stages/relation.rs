//! Stage 5: derive the nesting/sequencing tree of the generated blocks.
//!
//! Walks the successful blocks in order with an explicit stack of scope
//! frames. Each frame remembers where its first child goes (a body slot of
//! an opener, or the root) and the last sibling appended at that depth.

use crate::catalog::Catalog;
use crate::error::{StageError, StageResult};
use crate::stages::xml::{link_chain, Element};
use sas_protocol::{Block, BodySlot, NodeIndex, RelationDocument, RelationNode, RelationTree, ScopeRole};
use std::collections::HashSet;
use std::path::Path;

pub const RELATION_FILE: &str = "relation.xml";

struct Frame {
    /// Opener node and index of its body slot; `None` at the top level.
    parent: Option<(NodeIndex, usize)>,
    last: Option<NodeIndex>,
}

/// Build the relation tree over the successful blocks of `blocks`.
pub fn build_relation(blocks: &[Block], catalog: &Catalog) -> RelationTree {
    let mut tree = RelationTree::default();
    let mut frames = vec![Frame {
        parent: None,
        last: None,
    }];

    for block in blocks.iter().filter(|block| block.is_success()) {
        let index = tree.nodes.len();
        tree.nodes.push(RelationNode::new(block.id, block.operation_type.clone()));

        let depth = frames.len() - 1;
        let frame = &mut frames[depth];
        match (frame.last, frame.parent) {
            (Some(last), _) => tree.nodes[last].next = Some(index),
            (None, Some((parent, slot))) => tree.nodes[parent].slots[slot].first = Some(index),
            (None, None) => tree.root = Some(index),
        }
        frame.last = Some(index);

        match catalog.scope_of(&block.operation_type) {
            (ScopeRole::Open, body) => {
                let node = &mut tree.nodes[index];
                node.slots.push(BodySlot {
                    name: body.unwrap_or_else(|| "DO".to_string()),
                    first: None,
                });
                frames.push(Frame {
                    parent: Some((index, node.slots.len() - 1)),
                    last: None,
                });
            }
            (ScopeRole::Close, _) => {
                if depth > 0 {
                    frames.pop();
                } else {
                    tracing::warn!(
                        block_id = block.id,
                        operation_type = %block.operation_type,
                        "terminator without an open scope, ignoring"
                    );
                }
            }
            (ScopeRole::None, _) => {}
        }
    }

    if frames.len() > 1 {
        tracing::warn!(open = frames.len() - 1, "scopes left open at end of program");
    }
    tree
}

/// The sibling chain starting at `first`, looping over `next` links.
///
/// `seen` stops at any node reached twice; trees built here are acyclic but
/// state files can be edited by hand.
fn relation_chain(tree: &RelationTree, first: NodeIndex, seen: &mut HashSet<NodeIndex>) -> Option<Element> {
    let mut elements = Vec::new();
    let mut cursor = Some(first);
    while let Some(index) = cursor {
        let Some(node) = tree.node(index).filter(|_| seen.insert(index)) else {
            break;
        };
        let mut element = Element::new("block")
            .with_attr("id", node.block_id.to_string())
            .with_attr("type", node.operation_type.clone());

        for slot in &node.slots {
            let mut statement = Element::new("statement").with_attr("name", slot.name.clone());
            if let Some(child) = slot.first.and_then(|first| relation_chain(tree, first, seen)) {
                statement.push(child);
            }
            element.push(statement);
        }

        elements.push(element);
        cursor = node.next;
    }
    link_chain(elements)
}

/// Serialize `tree` as a relation document holding only ids, types and nesting.
pub fn relation_xml(tree: &RelationTree) -> String {
    let mut root = Element::new("relation");
    let mut seen = HashSet::new();
    if let Some(first) = tree.root.and_then(|root| relation_chain(tree, root, &mut seen)) {
        root.push(first);
    }
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}\n", root.to_xml())
}

/// Run stage 5 and write `relation.xml` into `run_dir`.
pub async fn generate_relation(
    blocks: &[Block],
    catalog: &Catalog,
    run_dir: &Path,
) -> StageResult<RelationDocument> {
    let tree = build_relation(blocks, catalog);
    if tree.root.is_none() {
        return Err(StageError::MissingArtifact(
            "no successful blocks to relate".to_string(),
        ));
    }

    let xml = relation_xml(&tree);
    let path = run_dir.join(RELATION_FILE);
    tokio::fs::write(&path, &xml)
        .await
        .map_err(|e| StageError::storage(format!("{}: {e}", path.display())))?;

    tracing::info!(nodes = tree.nodes.len(), "relation tree built");
    Ok(RelationDocument {
        tree,
        xml,
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sas_protocol::{BlockStatus, CatalogEntry};
    use tempfile::tempdir;

    fn catalog() -> Catalog {
        let entry = |t: &str, scope: ScopeRole, body: Option<&str>| CatalogEntry {
            operation_type: t.to_string(),
            skeleton_xml: format!(r#"<block type="{t}"/>"#),
            description: String::new(),
            parameters: Vec::new(),
            scope,
            body_slot: body.map(str::to_string),
        };
        Catalog::from_entries([
            entry("moveP", ScopeRole::None, None),
            entry("loop", ScopeRole::Open, Some("DO")),
            entry("loop_end", ScopeRole::Close, None),
        ])
    }

    fn block(id: u32, operation_type: &str) -> Block {
        Block {
            id,
            operation_type: operation_type.to_string(),
            source_description: String::new(),
            task_name: "T".to_string(),
            disabled: false,
            status: BlockStatus::Success,
            xml_content: Some(format!(r#"<block type="{operation_type}"/>"#)),
            raw_output: None,
            file_path: None,
            error_message: None,
        }
    }

    fn ids(tree: &RelationTree, first: Option<NodeIndex>) -> Vec<u32> {
        tree.chain(first).iter().map(|&i| tree.nodes[i].block_id).collect()
    }

    #[test]
    fn test_linear_chain() {
        let tree = build_relation(&[block(1, "moveP"), block(2, "moveP"), block(3, "moveP")], &catalog());
        assert_eq!(ids(&tree, tree.root), vec![1, 2, 3]);
        assert!(tree.nodes.iter().all(|n| n.slots.is_empty()));
    }

    #[test]
    fn test_loop_nesting() {
        let blocks = [
            block(1, "moveP"),
            block(2, "loop"),
            block(3, "moveP"),
            block(4, "moveP"),
            block(5, "loop_end"),
            block(6, "moveP"),
        ];
        let tree = build_relation(&blocks, &catalog());

        assert_eq!(ids(&tree, tree.root), vec![1, 2, 6]);
        let opener = &tree.nodes[tree.find_block(2).unwrap()];
        let body = opener.slot("DO").unwrap();
        assert_eq!(ids(&tree, body.first), vec![3, 4, 5]);
    }

    #[test]
    fn test_terminator_at_top_level_is_ignored() {
        let tree = build_relation(&[block(1, "loop_end"), block(2, "moveP")], &catalog());
        assert_eq!(ids(&tree, tree.root), vec![1, 2]);
    }

    #[test]
    fn test_failed_blocks_are_skipped() {
        let mut failed = block(2, "moveP");
        failed.status = BlockStatus::Failure;
        let tree = build_relation(&[block(1, "moveP"), failed, block(3, "moveP")], &catalog());
        assert_eq!(ids(&tree, tree.root), vec![1, 3]);
    }

    #[test]
    fn test_relation_xml_nesting() {
        let blocks = [block(1, "loop"), block(2, "moveP"), block(3, "loop_end"), block(4, "moveP")];
        let xml = relation_xml(&build_relation(&blocks, &catalog()));
        assert!(xml.contains(
            r#"<relation><block id="1" type="loop"><statement name="DO"><block id="2" type="moveP"><next><block id="3" type="loop_end"/></next></block></statement><next><block id="4" type="moveP"/></next></block></relation>"#
        ));
    }

    #[test]
    fn test_relation_xml_stops_at_cycles() {
        let mut tree = build_relation(&[block(1, "moveP"), block(2, "moveP")], &catalog());
        tree.nodes[1].next = Some(0);
        let xml = relation_xml(&tree);
        assert!(xml.contains(
            r#"<relation><block id="1" type="moveP"><next><block id="2" type="moveP"/></next></block></relation>"#
        ));
    }

    #[tokio::test]
    async fn test_generate_relation_writes_file() {
        let dir = tempdir().unwrap();
        let doc = generate_relation(&[block(1, "moveP")], &catalog(), dir.path()).await.unwrap();
        assert!(dir.path().join(RELATION_FILE).exists());
        assert_eq!(doc.tree.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_relation_without_blocks() {
        let dir = tempdir().unwrap();
        let result = generate_relation(&[], &catalog(), dir.path()).await;
        assert!(matches!(result, Err(StageError::MissingArtifact(_))));
    }
}
