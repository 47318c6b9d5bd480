// src/document/lookup.rs
//! Secondary lookups made while resolving document references.
//!
//! The resolver depends on these traits only, so tests can count or fail
//! lookups without a network.

use crate::api::LarkTransport;
use crate::collection::ResourceAdapter;
use crate::error::AppError;
use crate::model::drive::{doc_type_name, DocumentMeta, DriveFiles};
use crate::model::task::{Task, TaskAdapter};
use crate::model::user::{User, UserDirectory};
use crate::model::wiki::{self, WikiNode};
use async_trait::async_trait;
use std::sync::Arc;

/// Reads the records that mentions and reference blocks point at.
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    async fn user(&self, user_id: &str) -> Result<User, AppError>;

    async fn document(&self, token: &str, obj_type: u8) -> Result<DocumentMeta, AppError>;

    async fn task(&self, task_id: &str) -> Result<Task, AppError>;

    /// Child pages of the wiki node behind `wiki_token`, in order.
    async fn wiki_children(&self, wiki_token: &str) -> Result<Vec<WikiNode>, AppError>;
}

/// [`ReferenceLookup`] against the live API.
pub struct ApiLookup {
    transport: Arc<dyn LarkTransport>,
    users: UserDirectory,
    tasks: TaskAdapter,
}

impl ApiLookup {
    pub fn new(transport: Arc<dyn LarkTransport>) -> Self {
        Self {
            transport,
            users: UserDirectory::default(),
            tasks: TaskAdapter::default(),
        }
    }
}

#[async_trait]
impl ReferenceLookup for ApiLookup {
    async fn user(&self, user_id: &str) -> Result<User, AppError> {
        self.users.get_one(self.transport.as_ref(), user_id).await
    }

    async fn document(&self, token: &str, obj_type: u8) -> Result<DocumentMeta, AppError> {
        DriveFiles
            .get_meta(self.transport.as_ref(), doc_type_name(obj_type), token)
            .await
    }

    async fn task(&self, task_id: &str) -> Result<Task, AppError> {
        self.tasks.fetch_one(self.transport.as_ref(), task_id).await
    }

    async fn wiki_children(&self, wiki_token: &str) -> Result<Vec<WikiNode>, AppError> {
        wiki::list_children(Arc::clone(&self.transport), wiki_token).await
    }
}

/// Maps a file token to a URL a renderer can load.
///
/// `None` leaves the file unresolved; it is never an error.
#[async_trait]
pub trait FileUrlResolver: Send + Sync {
    async fn resolve_url(&self, token: &str) -> Option<String>;
}

#[async_trait]
impl<F> FileUrlResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    async fn resolve_url(&self, token: &str) -> Option<String> {
        self(token)
    }
}
