// src/document/tree.rs
//! Flat block lists to a rooted, render-ready tree.

use super::block::{Block, BlockPayload, BlockType};
use super::text::TextElement;
use crate::error::StructureError;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// A file a renderer may need to fetch separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReference {
    pub token: String,
    pub name: Option<String>,
}

/// Blocks of one document indexed by id, checked for structural integrity.
#[derive(Debug, Clone)]
pub struct BlockTree {
    blocks: HashMap<String, Block>,
    order: Vec<String>,
    root_id: String,
    files: Vec<FileReference>,
}

impl BlockTree {
    /// Indexes `blocks` and verifies there is exactly one root and that
    /// every parent reference resolves.
    pub fn register(blocks: Vec<Block>) -> Result<Self, StructureError> {
        let mut index = HashMap::with_capacity(blocks.len());
        let mut order = Vec::with_capacity(blocks.len());
        let mut files = Vec::new();

        for block in blocks {
            collect_files(&block, &mut files);
            if index.contains_key(&block.block_id) {
                return Err(StructureError::DuplicateBlock(block.block_id));
            }
            order.push(block.block_id.clone());
            index.insert(block.block_id.clone(), block);
        }

        let roots: Vec<String> = order
            .iter()
            .filter(|id| index.get(*id).is_some_and(Block::is_root))
            .cloned()
            .collect();
        let root_id = match roots.as_slice() {
            [] => return Err(StructureError::MissingRoot),
            [root] => root.clone(),
            _ => return Err(StructureError::MultipleRoots(roots)),
        };

        for id in &order {
            let Some(parent_id) = index.get(id).and_then(|b| b.parent_id.clone()) else {
                continue;
            };
            if !index.contains_key(&parent_id) {
                return Err(StructureError::DanglingParent {
                    block_id: id.clone(),
                    parent_id,
                });
            }
        }

        let mut tree = Self {
            blocks: index,
            order,
            root_id,
            files,
        };
        tree.reconcile_children();
        Ok(tree)
    }

    /// Makes parent `children` lists agree with child `parent_id`s.
    fn reconcile_children(&mut self) {
        for id in self.order.clone() {
            let Some(block) = self.blocks.get(&id) else {
                continue;
            };
            let missing: Vec<String> = block
                .children
                .iter()
                .filter(|child| !self.blocks.contains_key(*child))
                .cloned()
                .collect();
            if !missing.is_empty() {
                log::warn!("Block {} lists absent children {:?}; skipping them", id, missing);
                if let Some(block) = self.blocks.get_mut(&id) {
                    block.children.retain(|child| !missing.contains(child));
                }
            }
        }

        for id in self.order.clone() {
            let Some(parent_id) = self.blocks.get(&id).and_then(|b| b.parent_id.clone()) else {
                continue;
            };
            if let Some(parent) = self.blocks.get_mut(&parent_id) {
                if !parent.children.contains(&id) {
                    log::warn!("Block {} is not listed by its parent {}; appending it", id, parent_id);
                    parent.children.push(id);
                }
            }
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block ids in the order they were received, then in insertion order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn files(&self) -> &[FileReference] {
        &self.files
    }

    /// The checked blocks in the order they were received.
    pub fn into_blocks(mut self) -> Vec<Block> {
        self.order
            .iter()
            .filter_map(|id| self.blocks.remove(id))
            .collect()
    }

    /// Replaces a block with a rewritten version and adds any blocks
    /// synthesized for it.
    pub fn replace(&mut self, block: Block, synthesized: Vec<Block>) {
        for extra in synthesized {
            if !self.blocks.contains_key(&extra.block_id) {
                self.order.push(extra.block_id.clone());
            }
            self.blocks.insert(extra.block_id.clone(), extra);
        }
        if !self.blocks.contains_key(&block.block_id) {
            self.order.push(block.block_id.clone());
        }
        self.blocks.insert(block.block_id.clone(), block);
    }

    /// Wraps every maximal run of consecutive same-kind list items in a
    /// synthetic [`BlockType::VirtualList`] node.
    ///
    /// Children of synthetic list nodes are left alone, so grouping an
    /// already grouped tree changes nothing.
    pub fn group_lists(&mut self) {
        for parent_id in self.order.clone() {
            let Some(parent) = self.blocks.get(&parent_id) else {
                continue;
            };
            if parent.block_type == BlockType::VirtualList || parent.children.is_empty() {
                continue;
            }

            let mut regrouped = Vec::with_capacity(parent.children.len());
            let mut run: Vec<String> = Vec::new();
            let mut run_type = None;
            let mut lists = Vec::new();

            for child_id in parent.children.clone() {
                let kind = self.blocks.get(&child_id).map(|b| b.block_type);
                match kind {
                    Some(kind) if kind.is_list_item() => {
                        if run_type != Some(kind) {
                            flush_run(&parent_id, &mut run, run_type, &mut regrouped, &mut lists);
                            run_type = Some(kind);
                        }
                        run.push(child_id);
                    }
                    _ => {
                        flush_run(&parent_id, &mut run, run_type, &mut regrouped, &mut lists);
                        run_type = None;
                        regrouped.push(child_id);
                    }
                }
            }
            flush_run(&parent_id, &mut run, run_type, &mut regrouped, &mut lists);

            if lists.is_empty() {
                continue;
            }
            for list in lists {
                for item_id in &list.children {
                    if let Some(item) = self.blocks.get_mut(item_id) {
                        item.parent_id = Some(list.block_id.clone());
                    }
                }
                self.order.push(list.block_id.clone());
                self.blocks.insert(list.block_id.clone(), list);
            }
            if let Some(parent) = self.blocks.get_mut(&parent_id) {
                parent.children = regrouped;
            }
        }
    }

    /// Flattens the tree in document reading order.
    pub fn into_resolved(mut self) -> ResolvedDocument {
        let mut ordered = Vec::with_capacity(self.blocks.len());
        let mut stack = vec![self.root_id.clone()];
        while let Some(id) = stack.pop() {
            let Some(block) = self.blocks.remove(&id) else {
                continue;
            };
            stack.extend(block.children.iter().rev().cloned());
            ordered.push(block);
        }
        if !self.blocks.is_empty() {
            log::warn!(
                "{} blocks are unreachable from root {}",
                self.blocks.len(),
                self.root_id
            );
        }
        ResolvedDocument {
            root_id: self.root_id,
            blocks: ordered,
            files: self.files,
        }
    }
}

fn flush_run(
    parent_id: &str,
    run: &mut Vec<String>,
    run_type: Option<BlockType>,
    regrouped: &mut Vec<String>,
    lists: &mut Vec<Block>,
) {
    if run.is_empty() {
        return;
    }
    let ordered = run_type == Some(BlockType::Ordered);
    let list_id = format!("list-{}", Uuid::new_v4().simple());
    regrouped.push(list_id.clone());
    lists.push(Block::virtual_list(list_id, parent_id, ordered, std::mem::take(run)));
}

fn collect_files(block: &Block, files: &mut Vec<FileReference>) {
    match &block.payload {
        BlockPayload::Text(text) => {
            for element in &text.elements {
                if let TextElement::File(file) = element {
                    if let Some(token) = &file.file_token {
                        files.push(FileReference {
                            token: token.clone(),
                            name: None,
                        });
                    }
                }
            }
        }
        BlockPayload::File(file) => {
            if let Some(token) = &file.token {
                files.push(FileReference {
                    token: token.clone(),
                    name: file.name.clone(),
                });
            }
        }
        BlockPayload::Image(image) => {
            if let Some(token) = &image.token {
                files.push(FileReference {
                    token: token.clone(),
                    name: image
                        .caption
                        .as_ref()
                        .map(|c| c.content.clone())
                        .filter(|c| !c.is_empty()),
                });
            }
        }
        _ => {}
    }
}

/// A block with its children materialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockNode {
    pub block: Block,
    pub children: Vec<BlockNode>,
}

/// A fully resolved document ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDocument {
    pub root_id: String,
    /// Every block in pre-order, starting with the root.
    pub blocks: Vec<Block>,
    /// Files referenced anywhere in the original document.
    pub files: Vec<FileReference>,
}

impl ResolvedDocument {
    pub fn root(&self) -> Option<&Block> {
        self.blocks.first()
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.block_id == id)
    }

    /// Direct children of `id`, in order.
    pub fn children_of(&self, id: &str) -> Vec<&Block> {
        let index: HashMap<&str, &Block> = self.blocks.iter().map(|b| (b.block_id.as_str(), b)).collect();
        index
            .get(id)
            .map(|parent| {
                parent
                    .children
                    .iter()
                    .filter_map(|child| index.get(child.as_str()).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Builds the nested form of the document.
    pub fn tree(&self) -> Option<BlockNode> {
        let index: HashMap<&str, &Block> = self.blocks.iter().map(|b| (b.block_id.as_str(), b)).collect();
        build_node(&index, &self.root_id)
    }
}

fn build_node(index: &HashMap<&str, &Block>, id: &str) -> Option<BlockNode> {
    let block = *index.get(id)?;
    Some(BlockNode {
        block: block.clone(),
        children: block
            .children
            .iter()
            .filter_map(|child| build_node(index, child))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::block::ListGroup;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn block(id: &str, code: u16, parent: &str, children: &[&str]) -> Block {
        let block_type = BlockType::from_code(code);
        let mut raw = json!({
            "block_id": id,
            "block_type": code,
            "parent_id": parent,
            "children": children,
        });
        if let Some(name) = block_type.type_name() {
            let payload = if block_type.is_text_bearing() {
                json!({"elements": [{"text_run": {"content": id}}]})
            } else {
                json!({})
            };
            raw[name] = payload;
        }
        serde_json::from_value(raw).unwrap()
    }

    fn kinds(doc: &ResolvedDocument, parent: &str) -> Vec<BlockType> {
        doc.children_of(parent).iter().map(|b| b.block_type).collect()
    }

    #[test]
    fn groups_consecutive_list_items() {
        let mut tree = BlockTree::register(vec![
            block("doc", 1, "", &["t", "b1", "b2", "o1", "t2"]),
            block("t", 2, "doc", &[]),
            block("b1", 12, "doc", &[]),
            block("b2", 12, "doc", &[]),
            block("o1", 13, "doc", &[]),
            block("t2", 2, "doc", &[]),
        ])
        .unwrap();
        tree.group_lists();
        let doc = tree.into_resolved();

        assert_eq!(
            kinds(&doc, "doc"),
            vec![BlockType::Text, BlockType::VirtualList, BlockType::VirtualList, BlockType::Text]
        );
        let lists = doc.children_of("doc");
        let bullets = doc.children_of(&lists[1].block_id);
        assert_eq!(
            bullets.iter().map(|b| b.block_id.as_str()).collect::<Vec<_>>(),
            vec!["b1", "b2"]
        );
        assert_eq!(lists[1].payload, BlockPayload::List(ListGroup { ordered: false }));
        assert_eq!(lists[2].payload, BlockPayload::List(ListGroup { ordered: true }));
        assert!(lists[1].synthetic);
        assert_eq!(bullets[0].parent_id.as_deref(), Some(lists[1].block_id.as_str()));
    }

    #[test]
    fn pre_order_follows_reading_sequence() {
        let mut tree = BlockTree::register(vec![
            block("t2", 2, "doc", &[]),
            block("q", 34, "doc", &["inner"]),
            block("doc", 1, "", &["q", "t2"]),
            block("inner", 2, "q", &[]),
        ])
        .unwrap();
        tree.group_lists();
        let doc = tree.into_resolved();
        let ids: Vec<&str> = doc.blocks.iter().map(|b| b.block_id.as_str()).collect();
        assert_eq!(ids, vec!["doc", "q", "inner", "t2"]);
        assert_eq!(doc.tree().map(|n| n.children.len()), Some(2));
    }

    #[test]
    fn grouping_twice_changes_nothing() {
        let mut tree = BlockTree::register(vec![
            block("doc", 1, "", &["b1", "b2"]),
            block("b1", 12, "doc", &[]),
            block("b2", 12, "doc", &[]),
        ])
        .unwrap();
        tree.group_lists();
        let once = tree.clone().into_resolved();
        tree.group_lists();
        let twice = tree.into_resolved();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_root_is_rejected() {
        let err = BlockTree::register(vec![block("a", 2, "x", &[])]).unwrap_err();
        assert_eq!(err, StructureError::MissingRoot);
        assert_eq!(BlockTree::register(vec![]).unwrap_err(), StructureError::MissingRoot);
    }

    #[test]
    fn two_roots_are_rejected() {
        let err = BlockTree::register(vec![block("a", 1, "", &[]), block("b", 1, "", &[])]).unwrap_err();
        assert_eq!(err, StructureError::MultipleRoots(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn dangling_parent_is_rejected() {
        let err = BlockTree::register(vec![
            block("doc", 1, "", &["a"]),
            block("a", 2, "doc", &[]),
            block("b", 2, "ghost", &[]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            StructureError::DanglingParent {
                block_id: "b".into(),
                parent_id: "ghost".into()
            }
        );
    }

    #[test]
    fn unlisted_children_are_appended_and_absent_ones_skipped() {
        let tree = BlockTree::register(vec![
            block("doc", 1, "", &["a", "gone"]),
            block("a", 2, "doc", &[]),
            block("b", 2, "doc", &[]),
        ])
        .unwrap();
        assert_eq!(tree.get("doc").map(|b| b.children.clone()), Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn collects_file_references() {
        let image: Block = serde_json::from_value(json!({
            "block_id": "img", "block_type": 27, "parent_id": "doc",
            "image": {"token": "boxImg", "caption": {"content": "Diagram"}}
        }))
        .unwrap();
        let file: Block = serde_json::from_value(json!({
            "block_id": "f", "block_type": 23, "parent_id": "doc",
            "file": {"token": "boxFile", "name": "manual.pdf"}
        }))
        .unwrap();
        let inline: Block = serde_json::from_value(json!({
            "block_id": "t", "block_type": 2, "parent_id": "doc",
            "text": {"elements": [{"file": {"file_token": "boxInline"}}]}
        }))
        .unwrap();
        let tree = BlockTree::register(vec![block("doc", 1, "", &["img", "f", "t"]), image, file, inline]).unwrap();
        let tokens: Vec<(&str, Option<&str>)> = tree
            .files()
            .iter()
            .map(|f| (f.token.as_str(), f.name.as_deref()))
            .collect();
        assert_eq!(
            tokens,
            vec![("boxImg", Some("Diagram")), ("boxFile", Some("manual.pdf")), ("boxInline", None)]
        );
    }
}
