// src/model/document.rs
//! Cloud documents (docx): block listing, resolution and editing.

use crate::api::{ApiRequest, LarkTransport, PageStream, QueryParams, TransportExt};
use crate::document::{Block, BlockResolver, BlockTree, BlockType, ResolvedDocument};
use crate::error::{AppError, StructureError};
use futures::stream::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const DOCUMENTS_ROOT: &str = "docx/v1/documents";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub document_id: String,
    #[serde(default)]
    pub revision_id: u64,
    #[serde(default)]
    pub title: String,
}

/// Blocks produced from markup, not yet part of any document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConvertedBlocks {
    #[serde(default)]
    pub first_level_block_ids: Vec<String>,
    /// Kept as raw JSON: converted blocks carry temporary ids and no parents.
    #[serde(default)]
    pub blocks: Vec<Value>,
}

/// One document and its blocks.
pub struct DocumentModel {
    transport: Arc<dyn LarkTransport>,
    pub document_id: String,
}

impl DocumentModel {
    pub fn new(transport: Arc<dyn LarkTransport>, document_id: impl Into<String>) -> Self {
        Self {
            transport,
            document_id: document_id.into(),
        }
    }

    fn blocks_path(&self) -> String {
        format!("{}/{}/blocks", DOCUMENTS_ROOT, self.document_id)
    }

    pub async fn get_info(&self) -> Result<DocumentInfo, AppError> {
        let request = ApiRequest::get(format!("{}/{}", DOCUMENTS_ROOT, self.document_id));
        self.transport.fetch_field(request, "document").await
    }

    /// A lazy stream over the document's raw blocks.
    pub fn open_blocks(&self) -> PageStream<Block> {
        PageStream::open(Arc::clone(&self.transport), self.blocks_path(), QueryParams::new())
    }

    /// Every block of the document, checked for structural integrity.
    pub async fn get_one_blocks(&self) -> Result<Vec<Block>, AppError> {
        let blocks = self.open_blocks().collect_all().await?;
        let tree = BlockTree::register(blocks)?;
        log::debug!("Fetched {} blocks of document {}", tree.len(), self.document_id);
        Ok(tree.into_blocks())
    }

    /// The page block, pulling no further than the page that holds it.
    pub async fn get_root(&self) -> Result<Option<Block>, AppError> {
        let blocks = self.open_blocks().into_items();
        tokio::pin!(blocks);
        while let Some(block) = blocks.try_next().await? {
            if block.block_type == BlockType::Page {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }

    /// The document with references resolved, ready for rendering.
    pub async fn get_renderable(&self, resolver: &BlockResolver) -> Result<ResolvedDocument, AppError> {
        resolver.resolve(self.open_blocks().into_items()).await
    }

    /// Converts markdown into document blocks without inserting them.
    pub async fn convert_markdown(&self, markdown: &str) -> Result<ConvertedBlocks, AppError> {
        let request = ApiRequest::post(format!("{}/blocks/convert", DOCUMENTS_ROOT))
            .with_param("user_id_type", "open_id")
            .with_body(&json!({ "content_type": "markdown", "content": markdown }))?;
        self.transport.fetch_data(request).await
    }

    /// Inserts markdown under the root block at `index` (-1 appends).
    pub async fn insert_markdown(&self, markdown: &str, index: i64) -> Result<Value, AppError> {
        let converted = self.convert_markdown(markdown).await?;
        let root = self.require_root().await?;
        let request = ApiRequest::post(format!("{}/{}/descendant", self.blocks_path(), root.block_id))
            .with_param("user_id_type", "open_id")
            .with_body(&json!({
                "index": index,
                "children_id": converted.first_level_block_ids,
                "descendants": converted.blocks
            }))?;
        self.transport.fetch_data(request).await
    }

    /// Deletes every top-level block of the document.
    pub async fn remove_all(&self) -> Result<(), AppError> {
        let root = self.require_root().await?;
        if root.children.is_empty() {
            return Ok(());
        }
        let request = ApiRequest::delete(format!("{}/{}/children/batch_delete", self.blocks_path(), root.block_id))
            .with_body(&json!({ "start_index": 0, "end_index": root.children.len() }))?;
        let _: Value = self.transport.fetch_data(request).await?;
        Ok(())
    }

    async fn require_root(&self) -> Result<Block, AppError> {
        self.get_root()
            .await?
            .ok_or_else(|| AppError::Structure(StructureError::MissingRoot))
    }
}
