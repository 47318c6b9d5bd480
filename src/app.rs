// src/app.rs
//! Entry point tying configuration, transport and resources together.

use crate::api::{
    Blob, LarkHttpClient, LarkTransport, StaticTokenProvider, TenantTokenProvider, TokenKind,
    TokenProvider,
};
use crate::collection::{ResourceAdapter, ResourceCollection};
use crate::config::LarkConfig;
use crate::document::{ApiLookup, BlockResolver, FileUrlResolver};
use crate::error::AppError;
use crate::error_recovery::RetryPolicy;
use crate::model::bitable::{BiRecordAdapter, BiTableAdapter, BiTableViewAdapter};
use crate::model::chat::ChatMessageAdapter;
use crate::model::document::DocumentModel;
use crate::model::drive::DriveFiles;
use crate::model::spreadsheet::SpreadSheetModel;
use crate::model::task::TaskAdapter;
use crate::model::user::{User, UserDirectory};
use crate::model::wiki::{WikiNodeAdapter, WikiSpaceAdapter};
use std::sync::Arc;

/// One authenticated app. Every resource it hands out shares its transport.
pub struct LarkApp {
    config: LarkConfig,
    transport: Arc<dyn LarkTransport>,
}

impl LarkApp {
    /// Builds the reqwest transport described by `config`.
    ///
    /// With a user access token every request is made as that user;
    /// otherwise tenant tokens are issued from the app credentials.
    pub fn new(config: LarkConfig) -> Result<Self, AppError> {
        let (tokens, kind): (Arc<dyn TokenProvider>, TokenKind) = match &config.user_access_token {
            Some(token) => (Arc::new(StaticTokenProvider::new(token.clone())), TokenKind::User),
            None => (
                Arc::new(TenantTokenProvider::new(
                    &config.host,
                    config.app_id.clone(),
                    config.app_secret.clone(),
                )),
                TokenKind::Tenant,
            ),
        };
        let client = LarkHttpClient::new(&config.host, tokens)?
            .with_token_kind(kind)
            .with_retry(RetryPolicy::with_attempts(config.retry_attempts));
        log::debug!("Lark app {} talks to {}", config.app_id, config.host);
        Ok(Self::with_transport(config, Arc::new(client)))
    }

    /// Uses an existing transport, e.g. an in-memory one in tests.
    pub fn with_transport(config: LarkConfig, transport: Arc<dyn LarkTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &LarkConfig {
        &self.config
    }

    pub fn transport(&self) -> Arc<dyn LarkTransport> {
        Arc::clone(&self.transport)
    }

    fn collection<A: ResourceAdapter>(&self, adapter: A) -> ResourceCollection<A> {
        ResourceCollection::new(self.transport(), adapter)
    }

    pub fn tables(&self, app_id: &str) -> ResourceCollection<BiTableAdapter> {
        self.collection(BiTableAdapter {
            app_id: app_id.to_string(),
        })
    }

    pub fn table_views(&self, app_id: &str, table_id: &str) -> ResourceCollection<BiTableViewAdapter> {
        self.collection(BiTableViewAdapter {
            app_id: app_id.to_string(),
            table_id: table_id.to_string(),
        })
    }

    pub fn records(&self, app_id: &str, table_id: &str) -> ResourceCollection<BiRecordAdapter> {
        self.collection(BiRecordAdapter::new(app_id, table_id))
    }

    /// Records of the table called `table_name`.
    pub async fn records_by_name(
        &self,
        app_id: &str,
        table_name: &str,
    ) -> Result<ResourceCollection<BiRecordAdapter>, AppError> {
        let table = self.tables(app_id).find_table(table_name).await?;
        Ok(self.records(app_id, &table.table_id))
    }

    pub fn tasks(&self) -> ResourceCollection<TaskAdapter> {
        self.collection(TaskAdapter::default())
    }

    pub fn wiki_spaces(&self) -> ResourceCollection<WikiSpaceAdapter> {
        self.collection(WikiSpaceAdapter)
    }

    pub fn wiki_nodes(&self, space_id: &str) -> ResourceCollection<WikiNodeAdapter> {
        self.collection(WikiNodeAdapter::new(space_id))
    }

    pub fn chat_messages(&self, chat_id: &str) -> ResourceCollection<ChatMessageAdapter> {
        self.collection(ChatMessageAdapter {
            chat_id: chat_id.to_string(),
        })
    }

    pub fn spreadsheet(&self, token: &str, sheet_id: &str, column_keys: Vec<String>) -> SpreadSheetModel {
        SpreadSheetModel::new(self.transport(), token, sheet_id, column_keys)
    }

    pub fn document(&self, document_id: &str) -> DocumentModel {
        DocumentModel::new(self.transport(), document_id)
    }

    /// A resolver looking references up through this app.
    pub fn block_resolver(&self, files: Option<Arc<dyn FileUrlResolver>>) -> BlockResolver {
        let resolver = BlockResolver::new(Arc::new(ApiLookup::new(self.transport())), &self.config.domain);
        match files {
            Some(files) => resolver.with_file_resolver(files),
            None => resolver,
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        UserDirectory::default().get_one(self.transport.as_ref(), user_id).await
    }

    pub async fn download_media(&self, file_token: &str) -> Result<Blob, AppError> {
        DriveFiles.download_media(self.transport.as_ref(), file_token).await
    }
}
