// src/model/drive.rs
//! Drive documents: metadata lookup and media download.

use crate::api::{ApiRequest, Blob, LarkTransport, TransportExt};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Document kinds as named by the drive API.
pub fn doc_type_name(obj_type: u8) -> &'static str {
    match obj_type {
        1 => "doc",
        3 => "sheet",
        8 => "bitable",
        11 => "mindnote",
        12 => "file",
        15 => "slides",
        16 => "wiki",
        22 => "docx",
        _ => "docx",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub doc_token: String,
    #[serde(default)]
    pub doc_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
struct MetaBatch {
    #[serde(default)]
    metas: Vec<DocumentMeta>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DriveFiles;

impl DriveFiles {
    /// Metadata of one document, including its title and canonical URL.
    pub async fn get_meta(
        &self,
        transport: &dyn LarkTransport,
        doc_type: &str,
        doc_token: &str,
    ) -> Result<DocumentMeta, AppError> {
        let path = "drive/v1/metas/batch_query";
        let request = ApiRequest::post(path).with_body(&json!({
            "request_docs": [{ "doc_type": doc_type, "doc_token": doc_token }],
            "with_url": true
        }))?;
        let batch: MetaBatch = transport.fetch_data(request).await?;
        batch
            .metas
            .into_iter()
            .find(|meta| meta.doc_token == doc_token)
            .ok_or_else(|| AppError::malformed(path, format!("no metadata for {}", doc_token)))
    }

    /// Downloads a media file referenced by a document.
    pub async fn download_media(&self, transport: &dyn LarkTransport, file_token: &str) -> Result<Blob, AppError> {
        transport
            .download(&format!("drive/v1/medias/{}/download", file_token))
            .await
    }
}
