// src/model/wiki.rs
//! Wiki spaces and their node trees.

use crate::api::{ApiRequest, LarkTransport, PageStream, QueryParams, TransportExt};
use crate::collection::ResourceAdapter;
use crate::error::AppError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

static UNSAFE_PATH_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]+"#).expect("Invalid regex pattern"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiSpace {
    pub space_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub space_type: String,
    #[serde(default)]
    pub visibility: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiNode {
    #[serde(default)]
    pub space_id: String,
    pub node_token: String,
    #[serde(default)]
    pub obj_token: String,
    #[serde(default)]
    pub obj_type: String,
    #[serde(default)]
    pub parent_node_token: String,
    #[serde(default)]
    pub node_type: String,
    #[serde(default)]
    pub origin_node_token: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub has_child: bool,
    /// Slash-joined, file-system-safe titles from the traversal root down
    /// to this node. Only set by [`WikiNodeAdapter::traverse_tree`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title_path: String,
}

/// Replaces characters that are unsafe in file names.
pub fn sanitize_title(title: &str) -> String {
    UNSAFE_PATH_CHARS.replace_all(title, "-").trim().to_string()
}

/// Lists the wiki spaces visible to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct WikiSpaceAdapter;

impl ResourceAdapter for WikiSpaceAdapter {
    type Raw = WikiSpace;
    type Item = WikiSpace;
    type Filter = ();
    type Draft = ();

    fn base_path(&self) -> String {
        "wiki/v2/spaces".into()
    }

    fn normalize(&self, raw: WikiSpace) -> WikiSpace {
        raw
    }

    fn item_id(&self, item: &WikiSpace) -> Option<String> {
        Some(item.space_id.clone())
    }
}

/// Reads one node by its wiki token, whatever space it lives in.
pub async fn get_node(transport: &dyn LarkTransport, token: &str) -> Result<WikiNode, AppError> {
    let request = ApiRequest::get("wiki/v2/spaces/get_node").with_param("token", token);
    transport.fetch_field(request, "node").await
}

/// Lists the nodes of one space.
///
/// The filter is the parent node token; `None` lists the top level.
#[derive(Debug, Clone)]
pub struct WikiNodeAdapter {
    pub space_id: String,
}

impl WikiNodeAdapter {
    pub fn new(space_id: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
        }
    }

    /// A lazy stream over the direct children of `parent`.
    pub fn children(&self, transport: Arc<dyn LarkTransport>, parent: Option<&str>) -> PageStream<WikiNode> {
        let mut params = QueryParams::new();
        params.set_opt("parent_node_token", parent);
        PageStream::open(transport, self.base_path(), params)
    }

    /// Depth-first walk under `root` (the whole space when `None`).
    ///
    /// Nodes come out in pre-order, each with its `title_path` set
    /// relative to `root`. A level is fetched only when its parent is
    /// reached.
    pub async fn traverse_tree(
        &self,
        transport: Arc<dyn LarkTransport>,
        root: Option<&WikiNode>,
    ) -> Result<Vec<WikiNode>, AppError> {
        let first = self
            .children(Arc::clone(&transport), root.map(|n| n.node_token.as_str()))
            .collect_all()
            .await?;
        let root_path = root.map(|n| n.title_path.clone()).filter(|p| !p.is_empty());

        let mut nodes = Vec::new();
        let mut stack = vec![(root_path, first.into_iter())];
        while let Some((parent_path, level)) = stack.last_mut() {
            let Some(mut node) = level.next() else {
                stack.pop();
                continue;
            };
            let title = sanitize_title(&node.title);
            node.title_path = match parent_path {
                Some(parent) => format!("{}/{}", parent, title),
                None => title,
            };
            if node.has_child {
                let children = self
                    .children(Arc::clone(&transport), Some(&node.node_token))
                    .collect_all()
                    .await?;
                stack.push((Some(node.title_path.clone()), children.into_iter()));
            }
            nodes.push(node);
        }
        log::debug!("Traversed {} wiki nodes in space {}", nodes.len(), self.space_id);
        Ok(nodes)
    }
}

#[async_trait::async_trait]
impl ResourceAdapter for WikiNodeAdapter {
    type Raw = WikiNode;
    type Item = WikiNode;
    type Filter = Option<String>;
    type Draft = ();

    fn base_path(&self) -> String {
        format!("wiki/v2/spaces/{}/nodes", self.space_id)
    }

    fn list_params(&self, parent: &Option<String>) -> Result<QueryParams, AppError> {
        let mut params = QueryParams::new();
        params.set_opt("parent_node_token", parent.as_deref());
        Ok(params)
    }

    fn normalize(&self, raw: WikiNode) -> WikiNode {
        raw
    }

    fn item_id(&self, item: &WikiNode) -> Option<String> {
        Some(item.node_token.clone())
    }

    async fn fetch_one(&self, transport: &dyn LarkTransport, id: &str) -> Result<WikiNode, AppError> {
        get_node(transport, id).await
    }
}

/// Direct children of the node behind `wiki_token`.
pub async fn list_children(transport: Arc<dyn LarkTransport>, wiki_token: &str) -> Result<Vec<WikiNode>, AppError> {
    let node = get_node(transport.as_ref(), wiki_token).await?;
    WikiNodeAdapter::new(node.space_id)
        .children(transport, Some(&node.node_token))
        .collect_all()
        .await
}
