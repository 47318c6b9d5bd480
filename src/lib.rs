// src/lib.rs
//! lark-kit: a typed async client for the Lark/Feishu open platform.
//!
//! # Public API
//!
//! - **Transport**: [`LarkTransport`], [`ApiRequest`], [`LarkHttpClient`]
//! - **Streams**: [`PageStream`], resumable from a [`StreamCursor`]
//! - **Collections**: [`ResourceCollection`] driven by a [`ResourceAdapter`]
//! - **Documents**: [`BlockTree`] and [`BlockResolver`]
//! - **Resources**: bitable, tasks, wiki, chat, sheets, users and drive under [`model`]

pub mod api;
pub mod app;
pub mod collection;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod error_recovery;
pub mod model;

// --- Error Handling ---
pub use crate::error::{AppError, LarkErrorCode, StructureError};
pub use crate::error_recovery::RetryPolicy;

// --- Configuration ---
pub use crate::app::LarkApp;
pub use crate::config::LarkConfig;

// --- Transport ---
pub use crate::api::{
    ApiRequest, Blob, HttpMethod, LarkHttpClient, LarkTransport, PageStream, QueryParams,
    StaticTokenProvider, StreamCursor, TenantTokenProvider, TokenKind, TokenProvider, TotalCount,
    TransportExt,
};

// --- Collections ---
pub use crate::collection::{ResourceAdapter, ResourceCollection};

// --- Documents ---
pub use crate::document::{
    Block, BlockPayload, BlockResolver, BlockTree, BlockType, ReferenceLookup, ResolvedDocument,
    TextElement,
};
