// src/api/client.rs
//! reqwest-backed implementation of [`LarkTransport`].
//!
//! Joins the configured host with request paths, attaches the bearer
//! token, and retries transport-level failures. Application errors in
//! the envelope are left for the caller's decode step.

use super::envelope::check_code;
use super::token::{TokenKind, TokenProvider};
use super::{ApiRequest, Blob, HttpMethod, LarkTransport};
use crate::error::{AppError, LarkErrorCode};
use crate::error_recovery::{retry_with_backoff, RetryPolicy};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Client, Method, Response};
use serde_json::Value;
use std::sync::Arc;

static CONTENT_DISPOSITION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"filename\*?=(?:UTF-8'')?"?([^";]+)"?"#).expect("Invalid regex pattern")
});

/// A thin wrapper around reqwest Client for Lark API requests.
#[derive(Clone)]
pub struct LarkHttpClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    token_kind: TokenKind,
    retry: RetryPolicy,
}

impl LarkHttpClient {
    /// Creates a client for `host` authenticating through `tokens`.
    pub fn new(host: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self, AppError> {
        let client = Client::builder()
            .default_headers(Self::create_headers())
            .build()?;
        Ok(Self::with_client(client, host, tokens))
    }

    pub fn with_client(client: Client, host: &str, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            base_url: host.trim_end_matches('/').to_string(),
            tokens,
            token_kind: TokenKind::Tenant,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_token_kind(mut self, kind: TokenKind) -> Self {
        self.token_kind = kind;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn create_headers() -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers
    }

    fn url_for(&self, target: &str) -> String {
        format!("{}/{}", self.base_url, target.trim_start_matches('/'))
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<Response, AppError> {
        let target = request.target();
        let url = self.url_for(&target);
        log::debug!("{} {}", request.method, url);

        let token = self.tokens.token(self.token_kind).await?;
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };
        let mut builder = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                path: target,
            });
        }
        Ok(response)
    }

    /// Sends `request`, retrying transient failures.
    ///
    /// Writes that are not idempotent are only resent when the server
    /// certainly did not apply them: a 5xx or a timeout may arrive after
    /// the write was committed.
    async fn send_with_retry(&self, request: &ApiRequest) -> Result<Response, AppError> {
        let idempotent = request.method.is_idempotent();
        retry_with_backoff(
            || self.send_once(request),
            self.retry,
            |e| {
                if idempotent {
                    e.is_transient()
                } else {
                    was_not_applied(e)
                }
            },
        )
        .await
    }

    async fn forget_token_if_rejected(&self, body: &Value) {
        let code = body.get("code").and_then(Value::as_i64).unwrap_or(0);
        if LarkErrorCode::from_code(code).is_token_invalid() {
            log::warn!("Access token rejected (code {}), dropping cached token", code);
            self.tokens.invalidate().await;
        }
    }
}

#[async_trait::async_trait]
impl LarkTransport for LarkHttpClient {
    async fn request(&self, request: ApiRequest) -> Result<Value, AppError> {
        let target = request.target();
        let response = self.send_with_retry(&request).await?;
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => {
                self.forget_token_if_rejected(&body).await;
                if !status.is_success() {
                    check_code(&body, &target)?;
                    return Err(AppError::HttpStatus {
                        status: status.as_u16(),
                        path: target,
                    });
                }
                Ok(body)
            }
            Err(_) if !status.is_success() => Err(AppError::HttpStatus {
                status: status.as_u16(),
                path: target,
            }),
            Err(e) => Err(AppError::malformed(target, e)),
        }
    }

    async fn download(&self, path: &str) -> Result<Blob, AppError> {
        let request = ApiRequest::get(path);
        let response = self.send_with_retry(&request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        let content_type = header_text(&response, header::CONTENT_TYPE);
        let file_name = header_text(&response, header::CONTENT_DISPOSITION)
            .as_deref()
            .and_then(file_name_from_disposition);
        let bytes = response.bytes().await?.to_vec();
        Ok(Blob {
            bytes,
            content_type,
            file_name,
        })
    }
}

/// Failures that happen before the server processes a request.
fn was_not_applied(error: &AppError) -> bool {
    match error {
        AppError::NetworkFailure(e) => e.is_connect(),
        AppError::HttpStatus { status, .. } => *status == 429,
        _ => false,
    }
}

fn header_text(response: &Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Extracts the file name from a `Content-Disposition` header value.
pub fn file_name_from_disposition(value: &str) -> Option<String> {
    let raw = CONTENT_DISPOSITION_NAME.captures(value)?.get(1)?.as_str();
    let decoded = url::form_urlencoded::parse(format!("n={}", raw).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| raw.to_string());
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rejected_writes_count_as_unapplied() {
        let status = |status| AppError::HttpStatus {
            status,
            path: "x".into(),
        };
        assert!(was_not_applied(&status(429)));
        assert!(!was_not_applied(&status(503)));
        assert!(!HttpMethod::Post.is_idempotent());
        assert!(!HttpMethod::Patch.is_idempotent());
        assert!(HttpMethod::Put.is_idempotent());
        assert!(HttpMethod::Get.is_idempotent());
    }

    #[test]
    fn parses_plain_and_encoded_file_names() {
        assert_eq!(
            file_name_from_disposition(r#"attachment; filename="report.pdf""#).as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            file_name_from_disposition("attachment; filename*=UTF-8''%E6%8A%A5%E5%91%8A.pdf")
                .as_deref(),
            Some("报告.pdf")
        );
        assert_eq!(file_name_from_disposition("inline"), None);
    }
}
