// src/api/token.rs
//! Access token providers.
//!
//! The transport asks a [`TokenProvider`] for a bearer token before every
//! request. Tenant tokens are issued from the app credentials and cached
//! until the issuer's expiry.

use crate::api::envelope::check_code;
use crate::constants::TENANT_TOKEN_PATH;
use crate::error::AppError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Which identity a request is made as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Tenant,
    User,
}

#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, kind: TokenKind) -> Result<String, AppError>;

    /// Drops any cached token so the next call fetches a fresh one.
    async fn invalidate(&self) {}
}

/// A caller-supplied token returned for every kind.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, _kind: TokenKind) -> Result<String, AppError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TenantTokenResponse {
    tenant_access_token: String,
    expire: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Issues tenant access tokens from app credentials.
pub struct TenantTokenProvider {
    client: reqwest::Client,
    endpoint: String,
    app_id: String,
    app_secret: Option<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl TenantTokenProvider {
    pub fn new(host: &str, app_id: impl Into<String>, app_secret: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), host, app_id, app_secret)
    }

    pub fn with_client(
        client: reqwest::Client,
        host: &str,
        app_id: impl Into<String>,
        app_secret: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/{}", host.trim_end_matches('/'), TENANT_TOKEN_PATH),
            app_id: app_id.into(),
            app_secret,
            cached: Mutex::new(None),
        }
    }

    async fn issue(&self, secret: &str) -> Result<CachedToken, AppError> {
        log::debug!("POST {}", self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "app_id": self.app_id, "app_secret": secret }))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;
        check_code(&body, TENANT_TOKEN_PATH)?;
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                path: TENANT_TOKEN_PATH.to_string(),
            });
        }
        let issued: TenantTokenResponse =
            serde_json::from_value(body).map_err(|e| AppError::malformed(TENANT_TOKEN_PATH, e))?;
        log::debug!("Tenant access token issued, expires in {}s", issued.expire);
        Ok(CachedToken {
            value: issued.tenant_access_token,
            expires_at: Instant::now() + Duration::from_secs(issued.expire),
        })
    }
}

#[async_trait::async_trait]
impl TokenProvider for TenantTokenProvider {
    async fn token(&self, kind: TokenKind) -> Result<String, AppError> {
        if kind == TokenKind::User {
            return Err(AppError::Configuration(
                "user access tokens are not issued from app credentials; supply one explicitly"
                    .to_string(),
            ));
        }
        let secret = self.app_secret.as_deref().ok_or_else(|| {
            AppError::MissingConfiguration(
                "app secret is required to issue a tenant access token".to_string(),
            )
        })?;

        // Holding the lock across the refresh keeps concurrent callers on one issue request.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.value.clone());
        }
        let fresh = self.issue(secret).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
