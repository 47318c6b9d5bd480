// src/document/text.rs
//! Inline text content of text-bearing blocks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A hyperlink attached to an inline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
}

/// Inline formatting of one text element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextElementStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_code: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_ids: Option<Vec<String>>,
}

/// Block-level formatting of a text-bearing block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indentation_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_element_style: Option<TextElementStyle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionUser {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_element_style: Option<TextElementStyle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionDoc {
    pub token: String,
    pub obj_type: u8,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_element_style: Option<TextElementStyle>,
}

/// A file attached inline in running text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_block_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_element_style: Option<TextElementStyle>,
}

/// One inline element, keyed on the wire by its kind:
/// `{"text_run": {...}}`, `{"mention_user": {...}}` and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub enum TextElement {
    TextRun(TextRun),
    MentionUser(MentionUser),
    MentionDoc(MentionDoc),
    File(InlineFile),
    Equation(TextRun),
    Reminder(Value),
    InlineBlock(Value),
    /// Element kinds this client does not model, kept verbatim.
    Other { kind: String, value: Value },
}

impl TextElement {
    /// A plain run of text.
    pub fn text(content: impl Into<String>) -> Self {
        Self::TextRun(TextRun {
            content: content.into(),
            text_element_style: None,
        })
    }

    /// A run of text linking to `url`, keeping any other formatting in `style`.
    pub fn link(content: impl Into<String>, url: impl Into<String>, style: Option<TextElementStyle>) -> Self {
        let mut style = style.unwrap_or_default();
        style.link = Some(Link { url: url.into() });
        Self::TextRun(TextRun {
            content: content.into(),
            text_element_style: Some(style),
        })
    }

    /// Wire key of this element kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::TextRun(_) => "text_run",
            Self::MentionUser(_) => "mention_user",
            Self::MentionDoc(_) => "mention_doc",
            Self::File(_) => "file",
            Self::Equation(_) => "equation",
            Self::Reminder(_) => "reminder",
            Self::InlineBlock(_) => "inline_block",
            Self::Other { kind, .. } => kind,
        }
    }

    /// Visible text of a run, if this element is one.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::TextRun(run) | Self::Equation(run) => Some(&run.content),
            _ => None,
        }
    }
}

impl TryFrom<Map<String, Value>> for TextElement {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut entries = map.into_iter();
        let (kind, value) = entries
            .next()
            .ok_or_else(|| "text element has no content".to_string())?;
        let parsed = match kind.as_str() {
            "text_run" => serde_json::from_value(value).map(Self::TextRun),
            "mention_user" => serde_json::from_value(value).map(Self::MentionUser),
            "mention_doc" => serde_json::from_value(value).map(Self::MentionDoc),
            "file" => serde_json::from_value(value).map(Self::File),
            "equation" => serde_json::from_value(value).map(Self::Equation),
            "reminder" => Ok(Self::Reminder(value)),
            "inline_block" => Ok(Self::InlineBlock(value)),
            _ => Ok(Self::Other { kind, value }),
        };
        parsed.map_err(|e| e.to_string())
    }
}

impl From<TextElement> for Map<String, Value> {
    fn from(element: TextElement) -> Self {
        let kind = element.kind().to_string();
        let value = match element {
            TextElement::TextRun(run) | TextElement::Equation(run) => serde_json::to_value(run),
            TextElement::MentionUser(mention) => serde_json::to_value(mention),
            TextElement::MentionDoc(mention) => serde_json::to_value(mention),
            TextElement::File(file) => serde_json::to_value(file),
            TextElement::Reminder(value)
            | TextElement::InlineBlock(value)
            | TextElement::Other { value, .. } => Ok(value),
        }
        .unwrap_or(Value::Null);
        let mut map = Map::new();
        map.insert(kind, value);
        map
    }
}

/// Payload of every text-bearing block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub elements: Vec<TextElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<TextStyle>,
}

impl TextPayload {
    pub fn from_elements(elements: Vec<TextElement>) -> Self {
        Self {
            elements,
            style: None,
        }
    }

    /// Concatenated visible text of all runs.
    pub fn plain_text(&self) -> String {
        self.elements.iter().filter_map(TextElement::content).collect()
    }
}
