// src/document/resolver.rs
//! Turns a document's raw blocks into a render-ready tree.
//!
//! Resolution runs in four steps: the blocks are registered into a
//! [`BlockTree`] (integrity checks), reference-bearing blocks are
//! rewritten using secondary lookups, runs of list items are grouped,
//! and the tree is flattened in reading order. Lookup failures never
//! fail the resolution; the affected element or block is kept as
//! received and a warning is logged.

use super::block::{Block, BlockPayload, BlockType, EmbeddedToken, IframeComponent, IframePayload};
use super::lookup::{FileUrlResolver, ReferenceLookup};
use super::single_flight::SingleFlight;
use super::text::{TextElement, TextElementStyle, TextPayload, TextRun, TextStyle};
use super::tree::{BlockTree, ResolvedDocument};
use crate::constants::{IFRAME_COMPONENT_UNDEFINED, RESOLVE_CONCURRENCY};
use crate::error::AppError;
use crate::model::drive::DocumentMeta;
use crate::model::task::Task;
use crate::model::user::User;
use crate::model::wiki::WikiNode;
use futures::future::join_all;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Resolves documents hosted under one tenant domain.
pub struct BlockResolver {
    lookup: Arc<dyn ReferenceLookup>,
    /// Tenant host used in generated links, e.g. `example.feishu.cn`.
    domain: String,
    files: Option<Arc<dyn FileUrlResolver>>,
}

impl BlockResolver {
    pub fn new(lookup: Arc<dyn ReferenceLookup>, domain: impl Into<String>) -> Self {
        Self {
            lookup,
            domain: domain.into(),
            files: None,
        }
    }

    /// Enables rewriting of files and images to loadable URLs.
    pub fn with_file_resolver(mut self, files: Arc<dyn FileUrlResolver>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Drains `blocks` and resolves them.
    ///
    /// An error from the block stream itself aborts the resolution.
    pub async fn resolve<S>(&self, blocks: S) -> Result<ResolvedDocument, AppError>
    where
        S: Stream<Item = Result<Block, AppError>> + Send,
    {
        let blocks: Vec<Block> = blocks.try_collect().await?;
        self.resolve_blocks(blocks).await
    }

    pub async fn resolve_blocks(&self, blocks: Vec<Block>) -> Result<ResolvedDocument, AppError> {
        let mut tree = BlockTree::register(blocks)?;
        let session = Session::new(self);

        let pending: Vec<Block> = tree
            .ids()
            .iter()
            .filter_map(|id| tree.get(id))
            .filter(|block| session.needs_resolution(block))
            .cloned()
            .collect();
        log::debug!(
            "Resolving {} of {} blocks under {}",
            pending.len(),
            tree.len(),
            tree.root_id()
        );

        let rewrites: Vec<Rewrite> = stream::iter(pending)
            .map(|block| session.resolve_block(block))
            .buffered(RESOLVE_CONCURRENCY)
            .collect()
            .await;
        for rewrite in rewrites {
            tree.replace(rewrite.block, rewrite.synthesized);
        }
        log::debug!(
            "Looked up {} users, {} documents, {} tasks, {} wiki listings",
            session.users.len(),
            session.documents.len(),
            session.tasks.len(),
            session.wikis.len()
        );

        tree.group_lists();
        Ok(tree.into_resolved())
    }
}

/// A rewritten block plus any blocks created for it.
struct Rewrite {
    block: Block,
    synthesized: Vec<Block>,
}

/// Lookup caches that live for one resolution.
struct Session<'a> {
    resolver: &'a BlockResolver,
    users: SingleFlight<User>,
    documents: SingleFlight<DocumentMeta>,
    tasks: SingleFlight<Task>,
    wikis: SingleFlight<Vec<WikiNode>>,
}

impl<'a> Session<'a> {
    fn new(resolver: &'a BlockResolver) -> Self {
        Self {
            resolver,
            users: SingleFlight::new(),
            documents: SingleFlight::new(),
            tasks: SingleFlight::new(),
            wikis: SingleFlight::new(),
        }
    }

    fn needs_resolution(&self, block: &Block) -> bool {
        match &block.payload {
            BlockPayload::Text(text) => text.elements.iter().any(|element| match element {
                TextElement::MentionUser(_) | TextElement::MentionDoc(_) => true,
                TextElement::File(_) => self.resolver.files.is_some(),
                _ => false,
            }),
            BlockPayload::File(_) | BlockPayload::Image(_) => self.resolver.files.is_some(),
            BlockPayload::Embedded(_) | BlockPayload::Task(_) | BlockPayload::Wiki(_) => true,
            _ => false,
        }
    }

    async fn user(&self, user_id: &str) -> Result<User, Arc<AppError>> {
        let lookup = Arc::clone(&self.resolver.lookup);
        let id = user_id.to_string();
        self.users
            .get_or_fetch(user_id, move || async move { lookup.user(&id).await })
            .await
    }

    async fn document(&self, token: &str, obj_type: u8) -> Result<DocumentMeta, Arc<AppError>> {
        let lookup = Arc::clone(&self.resolver.lookup);
        let key = token.to_string();
        self.documents
            .get_or_fetch(token, move || async move { lookup.document(&key, obj_type).await })
            .await
    }

    async fn task(&self, task_id: &str) -> Result<Task, Arc<AppError>> {
        let lookup = Arc::clone(&self.resolver.lookup);
        let id = task_id.to_string();
        self.tasks
            .get_or_fetch(task_id, move || async move { lookup.task(&id).await })
            .await
    }

    async fn wiki_children(&self, wiki_token: &str) -> Result<Vec<WikiNode>, Arc<AppError>> {
        let lookup = Arc::clone(&self.resolver.lookup);
        let token = wiki_token.to_string();
        self.wikis
            .get_or_fetch(wiki_token, move || async move { lookup.wiki_children(&token).await })
            .await
    }

    async fn file_url(&self, token: Option<&str>) -> Option<String> {
        let files = self.resolver.files.as_ref()?;
        let token = token.filter(|t| !t.is_empty())?;
        files.resolve_url(token).await.filter(|url| !url.is_empty())
    }

    async fn resolve_block(&self, mut block: Block) -> Rewrite {
        let mut synthesized = Vec::new();
        match &block.payload {
            BlockPayload::Text(_) => self.resolve_text(&mut block).await,
            BlockPayload::File(file) => {
                let token = file.token.clone();
                if let Some(url) = self.file_url(token.as_deref()).await {
                    let frame = IframePayload {
                        component: IframeComponent {
                            component_type: IFRAME_COMPONENT_UNDEFINED,
                            url,
                        },
                    };
                    block.retype(BlockType::Iframe, BlockPayload::Iframe(frame));
                }
            }
            BlockPayload::Image(image) => {
                let token = image.token.clone();
                let url = self.file_url(token.as_deref()).await;
                if let (Some(url), BlockPayload::Image(image)) = (url, &mut block.payload) {
                    image.url = Some(url);
                }
            }
            BlockPayload::Embedded(embedded) => {
                if let Some(url) = self.embedded_url(block.block_type, embedded) {
                    block.retype_as_link(url.clone(), url, None);
                }
            }
            BlockPayload::Task(task) => {
                let task_id = task.task_id.clone();
                self.resolve_task(&mut block, &task_id).await;
            }
            BlockPayload::Wiki(wiki) => {
                let wiki_token = wiki.wiki_token.clone();
                synthesized = self.resolve_wiki(&mut block, &wiki_token).await;
            }
            _ => {}
        }
        Rewrite { block, synthesized }
    }

    /// Rewrites mentions and inline files of a text-bearing block.
    async fn resolve_text(&self, block: &mut Block) {
        let block_id = block.block_id.clone();
        let Some(text) = block.text_mut() else {
            return;
        };
        let elements = std::mem::take(&mut text.elements);
        text.elements = join_all(
            elements
                .into_iter()
                .map(|element| self.resolve_element(element, &block_id)),
        )
        .await;
    }

    async fn resolve_element(&self, element: TextElement, block_id: &str) -> TextElement {
        match element {
            TextElement::MentionUser(mention) => match self.user(&mention.user_id).await {
                Ok(user) => match (user.mention_text(), user.contact_url()) {
                    (Some(content), Some(url)) => TextElement::link(content, url, mention.text_element_style),
                    (Some(content), None) => TextElement::TextRun(TextRun {
                        content,
                        text_element_style: mention.text_element_style,
                    }),
                    (None, _) => {
                        log::warn!("User {} in block {} has no visible name", mention.user_id, block_id);
                        TextElement::MentionUser(mention)
                    }
                },
                Err(e) => {
                    log::warn!("Failed to resolve user {} in block {}: {}", mention.user_id, block_id, e);
                    TextElement::MentionUser(mention)
                }
            },
            TextElement::MentionDoc(mention) => match self.document(&mention.token, mention.obj_type).await {
                Ok(meta) => {
                    let url = Some(meta.url)
                        .filter(|u| !u.is_empty())
                        .unwrap_or_else(|| mention.url.clone());
                    if url.is_empty() {
                        log::warn!("Document {} in block {} has no URL", mention.token, block_id);
                        return TextElement::MentionDoc(mention);
                    }
                    let title = Some(meta.title)
                        .filter(|t| !t.is_empty())
                        .or_else(|| mention.title.clone().filter(|t| !t.is_empty()))
                        .unwrap_or_else(|| url.clone());
                    TextElement::link(title, url, mention.text_element_style)
                }
                Err(e) => {
                    log::warn!("Failed to resolve document {} in block {}: {}", mention.token, block_id, e);
                    TextElement::MentionDoc(mention)
                }
            },
            TextElement::File(file) => match self.file_url(file.file_token.as_deref()).await {
                Some(url) => TextElement::link(url.clone(), url, file.text_element_style),
                None => TextElement::File(file),
            },
            other => other,
        }
    }

    /// Link to the sheet or table an embedded block shows.
    fn embedded_url(&self, block_type: BlockType, embedded: &EmbeddedToken) -> Option<String> {
        let (segment, key) = match block_type {
            BlockType::Sheet => ("sheets", "sheet"),
            BlockType::Bitable => ("base", "table"),
            _ => return None,
        };
        let (token, sub_id) = embedded.parts();
        let url = format!("https://{}/{}/{}", self.resolver.domain, segment, token);
        Some(match sub_id {
            Some(sub_id) => format!("{}?{}={}", url, key, sub_id),
            None => url,
        })
    }

    async fn resolve_task(&self, block: &mut Block, task_id: &str) {
        let task = match self.task(task_id).await {
            Ok(task) => task,
            Err(e) => {
                log::warn!("Failed to resolve task {} in block {}: {}", task_id, block.block_id, e);
                return;
            }
        };
        if task.url.is_empty() {
            log::warn!("Task {} in block {} has no URL", task_id, block.block_id);
            return;
        }

        let done = task.is_completed();
        let headline = task.headline();
        let content = if headline.is_empty() { task.url.clone() } else { headline };
        let run_style = TextElementStyle {
            strikethrough: done.then_some(true),
            ..Default::default()
        };
        let payload = TextPayload {
            elements: vec![TextElement::link(content, task.url.clone(), Some(run_style))],
            style: Some(TextStyle {
                done: Some(done),
                ..Default::default()
            }),
        };
        block.retype(BlockType::Text, BlockPayload::Text(payload));
    }

    /// Replaces a catalog block with a container of links to its child pages.
    async fn resolve_wiki(&self, block: &mut Block, wiki_token: &str) -> Vec<Block> {
        let nodes = match self.wiki_children(wiki_token).await {
            Ok(nodes) => nodes,
            Err(e) => {
                log::warn!("Failed to list wiki {} for block {}: {}", wiki_token, block.block_id, e);
                return Vec::new();
            }
        };

        let entries: Vec<Block> = nodes
            .iter()
            .map(|node| {
                let url = format!("https://{}/wiki/{}", self.resolver.domain, node.node_token);
                let title = if node.title.is_empty() { url.clone() } else { node.title.clone() };
                Block::synthetic(
                    format!("wiki-{}", Uuid::new_v4().simple()),
                    BlockType::Ordered,
                    Some(block.block_id.clone()),
                    BlockPayload::Text(TextPayload::from_elements(vec![TextElement::link(title, url, None)])),
                )
            })
            .collect();

        block.retype(BlockType::QuoteContainer, BlockPayload::Opaque(Some(json!({}))));
        block.children = entries.iter().map(|entry| entry.block_id.clone()).collect();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskMember;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Fixed;

    #[async_trait]
    impl ReferenceLookup for Fixed {
        async fn user(&self, user_id: &str) -> Result<User, AppError> {
            Err(AppError::Unsupported(user_id.to_string()))
        }

        async fn document(&self, token: &str, _obj_type: u8) -> Result<DocumentMeta, AppError> {
            Err(AppError::Unsupported(token.to_string()))
        }

        async fn task(&self, task_id: &str) -> Result<Task, AppError> {
            Ok(Task {
                guid: task_id.to_string(),
                summary: "Review".into(),
                url: format!("https://applink.example/task/{}", task_id),
                status: "done".into(),
                members: vec![TaskMember {
                    name: "Ada".into(),
                    ..Default::default()
                }],
                ..Default::default()
            })
        }

        async fn wiki_children(&self, _wiki_token: &str) -> Result<Vec<WikiNode>, AppError> {
            Ok(Vec::new())
        }
    }

    fn block(value: serde_json::Value) -> Block {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn embedded_tables_become_links() {
        let resolver = BlockResolver::new(Arc::new(Fixed), "example.feishu.cn");
        let doc = resolver
            .resolve_blocks(vec![
                block(json!({"block_id": "doc", "block_type": 1, "children": ["s", "b"], "page": {"elements": []}})),
                block(json!({"block_id": "s", "block_type": 30, "parent_id": "doc", "sheet": {"token": "shtA_x1"}})),
                block(json!({"block_id": "b", "block_type": 18, "parent_id": "doc", "bitable": {"token": "basB"}})),
            ])
            .await
            .unwrap();

        let links: Vec<String> = ["s", "b"]
            .iter()
            .map(|id| doc.get(id).and_then(Block::text).map(TextPayload::plain_text).unwrap_or_default())
            .collect();
        assert_eq!(
            links,
            vec![
                "https://example.feishu.cn/sheets/shtA?sheet=x1".to_string(),
                "https://example.feishu.cn/base/basB".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn completed_tasks_are_struck_through() {
        let resolver = BlockResolver::new(Arc::new(Fixed), "example.feishu.cn");
        let doc = resolver
            .resolve_blocks(vec![
                block(json!({"block_id": "doc", "block_type": 1, "children": ["t"], "page": {"elements": []}})),
                block(json!({"block_id": "t", "block_type": 35, "parent_id": "doc", "task": {"task_id": "42"}})),
            ])
            .await
            .unwrap();

        let task = doc.get("t").unwrap();
        assert_eq!(task.block_type, BlockType::Text);
        let text = task.text().unwrap();
        assert_eq!(text.plain_text(), "Review @Ada");
        assert_eq!(text.style.as_ref().and_then(|s| s.done), Some(true));
        let TextElement::TextRun(run) = &text.elements[0] else {
            panic!("expected a text run");
        };
        let style = run.text_element_style.as_ref().unwrap();
        assert_eq!(style.strikethrough, Some(true));
        assert_eq!(style.link.as_ref().map(|l| l.url.as_str()), Some("https://applink.example/task/42"));
    }

    #[tokio::test]
    async fn files_stay_untouched_without_a_resolver() {
        let resolver = BlockResolver::new(Arc::new(Fixed), "example.feishu.cn");
        let file = block(json!({"block_id": "f", "block_type": 23, "parent_id": "doc", "file": {"token": "boxF"}}));
        let doc = resolver
            .resolve_blocks(vec![
                block(json!({"block_id": "doc", "block_type": 1, "children": ["f"], "page": {"elements": []}})),
                file.clone(),
            ])
            .await
            .unwrap();
        assert_eq!(doc.get("f"), Some(&file));
    }
}
