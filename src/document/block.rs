// src/document/block.rs
//! Document blocks as a tagged union.
//!
//! On the wire a block names its kind twice: a numeric `block_type` and a
//! payload stored under the kind's name (`{"block_type": 2, "text": {...}}`).
//! [`Block`] keeps both in step: the payload variant is always chosen from
//! the discriminant, and serialization writes the payload back under the
//! matching key.

use super::text::{TextElement, TextPayload, TextStyle};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generates [`BlockType`] with its code and payload-key tables.
macro_rules! block_types {
    ($($variant:ident = $code:literal => $name:literal,)*) => {
        /// Every block kind the document API documents.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum BlockType {
            $($variant,)*
            /// Grouping node inserted around runs of list items; never sent by the API.
            VirtualList,
            /// A code this client does not know yet.
            Unrecognized(u16),
        }

        impl BlockType {
            pub fn from_code(code: u16) -> Self {
                match code {
                    $($code => Self::$variant,)*
                    other => Self::Unrecognized(other),
                }
            }

            pub fn code(&self) -> u16 {
                match self {
                    $(Self::$variant => $code,)*
                    Self::VirtualList => 0,
                    Self::Unrecognized(code) => *code,
                }
            }

            /// Key the payload is stored under, if the kind has one.
            pub fn type_name(&self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some($name),)*
                    Self::VirtualList => Some("list"),
                    Self::Unrecognized(_) => None,
                }
            }
        }
    };
}

block_types! {
    Page = 1 => "page",
    Text = 2 => "text",
    Heading1 = 3 => "heading1",
    Heading2 = 4 => "heading2",
    Heading3 = 5 => "heading3",
    Heading4 = 6 => "heading4",
    Heading5 = 7 => "heading5",
    Heading6 = 8 => "heading6",
    Heading7 = 9 => "heading7",
    Heading8 = 10 => "heading8",
    Heading9 = 11 => "heading9",
    Bullet = 12 => "bullet",
    Ordered = 13 => "ordered",
    Code = 14 => "code",
    Quote = 15 => "quote",
    Todo = 17 => "todo",
    Bitable = 18 => "bitable",
    Callout = 19 => "callout",
    ChatCard = 20 => "chat_card",
    Diagram = 21 => "diagram",
    Divider = 22 => "divider",
    File = 23 => "file",
    Grid = 24 => "grid",
    GridColumn = 25 => "grid_column",
    Iframe = 26 => "iframe",
    Image = 27 => "image",
    Isv = 28 => "isv",
    Mindnote = 29 => "mindnote",
    Sheet = 30 => "sheet",
    Table = 31 => "table",
    TableCell = 32 => "table_cell",
    View = 33 => "view",
    QuoteContainer = 34 => "quote_container",
    Task = 35 => "task",
    Okr = 36 => "okr",
    OkrObjective = 37 => "okr_objective",
    OkrKeyResult = 38 => "okr_key_result",
    OkrProgress = 39 => "okr_progress",
    AddOns = 40 => "add_ons",
    JiraIssue = 41 => "jira_issue",
    WikiCatalog = 42 => "wiki_catalog",
    Board = 43 => "board",
    Agenda = 44 => "agenda",
    AgendaItem = 45 => "agenda_item",
    AgendaItemTitle = 46 => "agenda_item_title",
    AgendaItemContent = 47 => "agenda_item_content",
    LinkPreview = 48 => "link_preview",
    SourceSynced = 49 => "source_synced",
    ReferenceSynced = 50 => "reference_synced",
    SubPageList = 51 => "sub_page_list",
    AiTemplate = 52 => "ai_template",
    Undefined = 999 => "undefined",
}

impl BlockType {
    /// Kinds whose payload is a [`TextPayload`].
    pub fn is_text_bearing(&self) -> bool {
        matches!(
            self,
            Self::Page
                | Self::Text
                | Self::Heading1
                | Self::Heading2
                | Self::Heading3
                | Self::Heading4
                | Self::Heading5
                | Self::Heading6
                | Self::Heading7
                | Self::Heading8
                | Self::Heading9
                | Self::Bullet
                | Self::Ordered
                | Self::Code
                | Self::Quote
                | Self::Todo
        )
    }

    /// List item kinds grouped into [`BlockType::VirtualList`] nodes.
    pub fn is_list_item(&self) -> bool {
        matches!(self, Self::Bullet | Self::Ordered)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_type: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<Caption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IframeComponent {
    #[serde(rename = "type")]
    pub component_type: u8,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IframePayload {
    pub component: IframeComponent,
}

/// Payload of embedded sheets and bitables: `{"token": "<doc>_<sub id>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedToken {
    pub token: String,
}

impl EmbeddedToken {
    /// Splits the token into the document token and the optional sub-object id.
    pub fn parts(&self) -> (&str, Option<&str>) {
        match self.token.split_once('_') {
            Some((doc, sub)) => (doc, Some(sub)),
            None => (&self.token, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiRef {
    pub wiki_token: String,
}

/// Payload of a synthetic list node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListGroup {
    pub ordered: bool,
}

/// The payload variants, selected by [`BlockType`].
#[derive(Debug, Clone, PartialEq)]
pub enum BlockPayload {
    Text(TextPayload),
    File(FilePayload),
    Image(ImagePayload),
    Iframe(IframePayload),
    Embedded(EmbeddedToken),
    Task(TaskRef),
    Wiki(WikiRef),
    List(ListGroup),
    /// Any other kind; the payload is kept as received, if there was one.
    Opaque(Option<Value>),
}

impl BlockPayload {
    fn decode(block_type: BlockType, value: Option<Value>) -> Result<Self, String> {
        fn typed<T: serde::de::DeserializeOwned>(
            block_type: BlockType,
            value: Option<Value>,
        ) -> Result<T, String> {
            let value = value.ok_or_else(|| {
                format!(
                    "block_type {} has no `{}` payload",
                    block_type.code(),
                    block_type.type_name().unwrap_or_default()
                )
            })?;
            serde_json::from_value(value).map_err(|e| e.to_string())
        }

        Ok(match block_type {
            t if t.is_text_bearing() => Self::Text(typed(t, value)?),
            BlockType::File => Self::File(typed(block_type, value)?),
            BlockType::Image => Self::Image(typed(block_type, value)?),
            BlockType::Iframe => Self::Iframe(typed(block_type, value)?),
            BlockType::Sheet | BlockType::Bitable => Self::Embedded(typed(block_type, value)?),
            BlockType::Task => Self::Task(typed(block_type, value)?),
            BlockType::WikiCatalog | BlockType::SubPageList => Self::Wiki(typed(block_type, value)?),
            BlockType::VirtualList => Self::List(typed(block_type, value)?),
            _ => Self::Opaque(value),
        })
    }

    fn encode(&self) -> Option<Value> {
        let encoded = match self {
            Self::Text(p) => serde_json::to_value(p),
            Self::File(p) => serde_json::to_value(p),
            Self::Image(p) => serde_json::to_value(p),
            Self::Iframe(p) => serde_json::to_value(p),
            Self::Embedded(p) => serde_json::to_value(p),
            Self::Task(p) => serde_json::to_value(p),
            Self::Wiki(p) => serde_json::to_value(p),
            Self::List(p) => serde_json::to_value(p),
            Self::Opaque(value) => return value.clone(),
        };
        encoded.ok()
    }
}

/// Wire form of a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBlock {
    block_id: String,
    block_type: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    comment_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    synthetic: bool,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// One node of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "RawBlock")]
pub struct Block {
    pub block_id: String,
    pub block_type: BlockType,
    /// `None` only for the root block.
    pub parent_id: Option<String>,
    pub children: Vec<String>,
    pub comment_ids: Vec<String>,
    pub payload: BlockPayload,
    /// Created by this client rather than read from the API.
    pub synthetic: bool,
    /// Fields of the wire form this client does not model.
    pub extra: Map<String, Value>,
}

impl TryFrom<RawBlock> for Block {
    type Error = String;

    fn try_from(mut raw: RawBlock) -> Result<Self, Self::Error> {
        // Only blocks this client created may carry the list code.
        let block_type = match (raw.synthetic, raw.block_type) {
            (true, code) if code == BlockType::VirtualList.code() => BlockType::VirtualList,
            (_, code) => BlockType::from_code(code),
        };
        let value = block_type.type_name().and_then(|name| raw.rest.remove(name));
        let payload = BlockPayload::decode(block_type, value)
            .map_err(|e| format!("block {}: {}", raw.block_id, e))?;
        Ok(Self {
            block_id: raw.block_id,
            block_type,
            parent_id: raw.parent_id.filter(|p| !p.is_empty()),
            children: raw.children,
            comment_ids: raw.comment_ids,
            payload,
            synthetic: raw.synthetic,
            extra: raw.rest,
        })
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        let mut rest = block.extra;
        if let (Some(name), Some(value)) = (block.block_type.type_name(), block.payload.encode()) {
            rest.insert(name.to_string(), value);
        }
        Self {
            block_id: block.block_id,
            block_type: block.block_type.code(),
            parent_id: block.parent_id,
            children: block.children,
            comment_ids: block.comment_ids,
            synthetic: block.synthetic,
            rest,
        }
    }
}

impl Block {
    /// A block created by this client.
    pub fn synthetic(
        block_id: impl Into<String>,
        block_type: BlockType,
        parent_id: Option<String>,
        payload: BlockPayload,
    ) -> Self {
        Self {
            block_id: block_id.into(),
            block_type,
            parent_id,
            children: Vec::new(),
            comment_ids: Vec::new(),
            payload,
            synthetic: true,
            extra: Map::new(),
        }
    }

    /// A synthetic list node wrapping list items under `parent_id`.
    pub fn virtual_list(block_id: impl Into<String>, parent_id: &str, ordered: bool, children: Vec<String>) -> Self {
        let mut block = Self::synthetic(
            block_id,
            BlockType::VirtualList,
            Some(parent_id.to_string()),
            BlockPayload::List(ListGroup { ordered }),
        );
        block.children = children;
        block
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn text(&self) -> Option<&TextPayload> {
        match &self.payload {
            BlockPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn text_mut(&mut self) -> Option<&mut TextPayload> {
        match &mut self.payload {
            BlockPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Changes the kind of this block, replacing its payload to match.
    ///
    /// Fields of the previous payload that were kept in `extra` under the
    /// old kind's key are dropped so the block never carries two payloads.
    pub fn retype(&mut self, block_type: BlockType, payload: BlockPayload) {
        if let Some(old) = self.block_type.type_name() {
            self.extra.remove(old);
        }
        self.block_type = block_type;
        self.payload = payload;
    }

    /// Turns this block into a single-run text block linking to `url`.
    pub fn retype_as_link(&mut self, content: impl Into<String>, url: impl Into<String>, style: Option<TextStyle>) {
        let payload = TextPayload {
            elements: vec![TextElement::link(content, url, None)],
            style,
        };
        self.retype(BlockType::Text, BlockPayload::Text(payload));
    }
}
