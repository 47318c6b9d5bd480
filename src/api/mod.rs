// src/api/mod.rs
//! Lark API interaction: the transport seam and everything built
//! directly on it.
//!
//! Business logic depends on [`LarkTransport`], never on HTTP details.
//! The reqwest implementation lives in [`client`]; tests substitute an
//! in-memory transport.

pub mod client;
pub mod envelope;
pub mod pagination;
pub mod query;
pub mod token;

use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub use client::LarkHttpClient;
pub use envelope::PageEnvelope;
pub use pagination::{PageStream, StreamCursor, TotalCount};
pub use query::QueryParams;
pub use token::{StaticTokenProvider, TenantTokenProvider, TokenKind, TokenProvider};

/// HTTP verbs the platform uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Whether sending the same request twice has the effect of sending it once.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Self::Post | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        })
    }
}

/// One request against the platform, relative to the configured host.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: QueryParams,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query.merge(&query);
        self
    }

    pub fn with_param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.set(key, value);
        self
    }

    /// Attaches a JSON body. Serialization failures surface as internal errors.
    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, AppError> {
        let value = serde_json::to_value(body).map_err(|e| AppError::InternalError {
            message: format!("Failed to serialize request body for {}", self.path),
            source: Some(Box::new(e)),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Path plus encoded query, as it appears in logs and errors.
    pub fn target(&self) -> String {
        self.query.append_to(&self.path)
    }
}

/// A downloaded binary resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// The ability to exchange requests with the platform.
///
/// Implementations return the raw JSON envelope; callers decode it with
/// [`TransportExt`], which enforces the application-level `code` check.
#[async_trait::async_trait]
pub trait LarkTransport: Send + Sync {
    async fn request(&self, request: ApiRequest) -> Result<Value, AppError>;

    /// Fetches a binary resource without envelope decoding.
    async fn download(&self, path: &str) -> Result<Blob, AppError> {
        Err(AppError::Unsupported(format!(
            "this transport cannot download {}",
            path
        )))
    }
}

/// Envelope-aware helpers available on every transport.
#[async_trait::async_trait]
pub trait TransportExt: LarkTransport {
    /// Sends `request` and deserializes the envelope's `data`.
    async fn fetch_data<T>(&self, request: ApiRequest) -> Result<T, AppError>
    where
        T: DeserializeOwned + Send,
    {
        let target = request.target();
        let body = self.request(request).await?;
        envelope::decode_data(body, &target)
    }

    /// Sends `request` and deserializes one named field of `data`.
    async fn fetch_field<T>(&self, request: ApiRequest, field: &str) -> Result<T, AppError>
    where
        T: DeserializeOwned + Send,
    {
        let target = request.target();
        let data: Value = self.fetch_data(request).await?;
        envelope::take_field(data, field, &target)
    }
}

impl<X: LarkTransport + ?Sized> TransportExt for X {}
