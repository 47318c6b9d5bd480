// src/model/chat.rs
//! Group chat message history.

use crate::api::{ApiRequest, LarkTransport, QueryParams, TransportExt};
use crate::collection::ResourceAdapter;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSender {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub id_type: String,
    #[serde(default)]
    pub sender_type: String,
    #[serde(default)]
    pub tenant_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMention {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub id_type: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// JSON-encoded content, shaped by `msg_type`.
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default)]
    pub msg_type: String,
    #[serde(default)]
    pub create_time: String,
    #[serde(default)]
    pub update_time: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub updated: bool,
    #[serde(default)]
    pub sender: ChatSender,
    #[serde(default)]
    pub mentions: Vec<ChatMention>,
    #[serde(default)]
    pub body: MessageBody,
}

impl ChatMessage {
    /// Decoded message content; `Null` when it is not valid JSON.
    pub fn content(&self) -> Value {
        serde_json::from_str(&self.body.content).unwrap_or(Value::Null)
    }
}

/// Time window of a history listing, in epoch seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageWindow {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

/// A message to post: `content` is encoded to a JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub msg_type: String,
    pub content: Value,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            msg_type: "text".into(),
            content: json!({ "text": text.into() }),
        }
    }
}

/// Message history of one chat; saving posts a new message to it.
#[derive(Debug, Clone)]
pub struct ChatMessageAdapter {
    pub chat_id: String,
}

#[async_trait::async_trait]
impl ResourceAdapter for ChatMessageAdapter {
    type Raw = ChatMessage;
    type Item = ChatMessage;
    type Filter = MessageWindow;
    type Draft = OutgoingMessage;

    fn base_path(&self) -> String {
        "im/v1/messages".into()
    }

    fn list_params(&self, window: &MessageWindow) -> Result<QueryParams, AppError> {
        let mut params = QueryParams::new()
            .with("container_id_type", "chat")
            .with("container_id", &self.chat_id);
        params
            .set_opt("start_time", window.start_time)
            .set_opt("end_time", window.end_time);
        Ok(params)
    }

    fn normalize(&self, raw: ChatMessage) -> ChatMessage {
        raw
    }

    fn item_id(&self, item: &ChatMessage) -> Option<String> {
        Some(item.message_id.clone())
    }

    async fn save_one(
        &self,
        transport: &dyn LarkTransport,
        message: &OutgoingMessage,
        id: Option<&str>,
    ) -> Result<ChatMessage, AppError> {
        if let Some(id) = id {
            return Err(AppError::Unsupported(format!("messages cannot be edited ({})", id)));
        }
        let request = ApiRequest::post(self.base_path())
            .with_param("receive_id_type", "chat_id")
            .with_body(&json!({
                "receive_id": self.chat_id,
                "msg_type": message.msg_type,
                "content": message.content.to_string()
            }))?;
        transport.fetch_data(request).await
    }
}
