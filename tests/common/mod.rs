// tests/common/mod.rs
//! In-memory transport and envelope builders shared by the integration tests.

#![allow(dead_code)]

use lark_kit::{ApiRequest, AppError, LarkTransport};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

type Handler = Box<dyn Fn(&ApiRequest) -> Result<Value, AppError> + Send + Sync>;

/// Answers every request with `handler` and records what was asked.
pub struct MockTransport {
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&ApiRequest) -> Result<Value, AppError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Serves `items` in pages of `page_size`, using the item offset as page token.
    pub fn paged(items: Vec<Value>, page_size: usize) -> Arc<Self> {
        Self::new(move |request| {
            let start: usize = request
                .query
                .get("page_token")
                .map(|t| t.parse().unwrap())
                .unwrap_or(0);
            let end = (start + page_size).min(items.len());
            let has_more = end < items.len();
            Ok(page(
                items[start..end].to_vec(),
                has_more.then(|| end.to_string()).as_deref(),
            ))
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait::async_trait]
impl LarkTransport for MockTransport {
    async fn request(&self, request: ApiRequest) -> Result<Value, AppError> {
        self.requests.lock().push(request.clone());
        (self.handler)(&request)
    }
}

/// A successful envelope around `data`.
pub fn ok(data: Value) -> Value {
    json!({"code": 0, "msg": "success", "data": data})
}

/// A successful listing page; `next` is the token of the following page.
pub fn page(items: Vec<Value>, next: Option<&str>) -> Value {
    ok(json!({
        "items": items,
        "has_more": next.is_some(),
        "page_token": next.unwrap_or_default(),
    }))
}

pub fn numbered(count: usize) -> Vec<Value> {
    (0..count).map(|i| json!({"table_id": format!("tbl{}", i), "name": format!("T{}", i)})).collect()
}
