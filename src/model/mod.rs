// src/model/mod.rs
//! Per-product resources built on the stream engine and collections.

pub mod bitable;
pub mod chat;
pub mod document;
pub mod drive;
pub mod filter;
pub mod spreadsheet;
pub mod task;
pub mod user;
pub mod wiki;

pub use bitable::{BiRecordAdapter, BiTableAdapter, BiTableViewAdapter, Record, SortOrder, TableMeta, ViewMeta};
pub use chat::{ChatMessage, ChatMessageAdapter, MessageWindow, OutgoingMessage};
pub use document::{DocumentInfo, DocumentModel};
pub use drive::{DocumentMeta, DriveFiles};
pub use filter::{filter_map, make_filter, make_simple_filter, FilterMap, FilterOperator, FilterRelation, FilterValue};
pub use spreadsheet::{SheetMeta, SheetPage, SpreadSheetModel};
pub use task::{Task, TaskAdapter, TaskFilter, TaskSource};
pub use user::{User, UserDirectory, UserIdType};
pub use wiki::{WikiNode, WikiNodeAdapter, WikiSpace, WikiSpaceAdapter};
