// src/model/bitable.rs
//! Bitable (multi-dimensional table) apps: tables, views and records.

use super::filter::{make_filter, FilterMap};
use crate::api::{ApiRequest, LarkTransport, QueryParams, TransportExt};
use crate::collection::{ResourceAdapter, ResourceCollection};
use crate::error::AppError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn app_path(app_id: &str) -> String {
    format!("bitable/v1/apps/{}", app_id)
}

/// One table of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub table_id: String,
    pub name: String,
    #[serde(default)]
    pub revision: u64,
}

/// Lists the tables of one app.
#[derive(Debug, Clone)]
pub struct BiTableAdapter {
    pub app_id: String,
}

impl ResourceAdapter for BiTableAdapter {
    type Raw = TableMeta;
    type Item = TableMeta;
    type Filter = ();
    type Draft = ();

    fn base_path(&self) -> String {
        format!("{}/tables", app_path(&self.app_id))
    }

    fn normalize(&self, raw: TableMeta) -> TableMeta {
        raw
    }

    fn item_id(&self, item: &TableMeta) -> Option<String> {
        Some(item.table_id.clone())
    }
}

impl ResourceCollection<BiTableAdapter> {
    /// Finds a table by its display name, loading the table list if needed.
    ///
    /// An unknown name is a configuration error: callers name tables in
    /// their own setup, so a miss means the setup and the app disagree.
    pub async fn find_table(&mut self, name: &str) -> Result<TableMeta, AppError> {
        let tables = self.get_all(&()).await?;
        tables
            .iter()
            .find(|table| table.name == name)
            .cloned()
            .ok_or_else(|| AppError::Configuration(format!("Table \"{}\" is not found", name)))
    }
}

/// One saved view of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMeta {
    pub view_id: String,
    pub view_name: String,
    #[serde(default)]
    pub view_type: String,
}

/// Lists the views of one table.
#[derive(Debug, Clone)]
pub struct BiTableViewAdapter {
    pub app_id: String,
    pub table_id: String,
}

impl ResourceAdapter for BiTableViewAdapter {
    type Raw = ViewMeta;
    type Item = ViewMeta;
    type Filter = ();
    type Draft = ();

    fn base_path(&self) -> String {
        format!("{}/tables/{}/views", app_path(&self.app_id), self.table_id)
    }

    fn normalize(&self, raw: ViewMeta) -> ViewMeta {
        raw
    }

    fn item_id(&self, item: &ViewMeta) -> Option<String> {
        Some(item.view_id.clone())
    }
}

/// A record as the API returns it: metadata plus a `fields` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<i64>,
    #[serde(default)]
    pub fields: IndexMap<String, Value>,
}

/// A record flattened into one map: metadata first, then fields.
pub type Record = IndexMap<String, Value>;

impl From<TableRecord> for Record {
    fn from(raw: TableRecord) -> Self {
        let mut flat = Record::new();
        flat.insert("id".into(), Value::from(raw.record_id.clone()));
        flat.insert("record_id".into(), Value::from(raw.record_id));
        let meta = [
            ("created_by", raw.created_by),
            ("created_time", raw.created_time.map(Value::from)),
            ("last_modified_by", raw.last_modified_by),
            ("last_modified_time", raw.last_modified_time.map(Value::from)),
        ];
        for (key, value) in meta.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))) {
            flat.insert(key.into(), value);
        }
        flat.extend(raw.fields);
        flat
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Reads and writes the records of one table.
#[derive(Debug, Clone)]
pub struct BiRecordAdapter {
    pub app_id: String,
    pub table_id: String,
    /// Records missing any of these fields are filtered out server-side.
    pub required_keys: Vec<String>,
    pub sort: IndexMap<String, SortOrder>,
    /// Sent with every read.
    pub query_options: QueryParams,
    /// When set, listings use this view instead of filter and sort.
    pub view_id: Option<String>,
}

impl BiRecordAdapter {
    pub fn new(app_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            table_id: table_id.into(),
            required_keys: Vec::new(),
            sort: IndexMap::new(),
            query_options: QueryParams::new()
                .with("text_field_as_array", true)
                .with("automatic_fields", true),
            view_id: None,
        }
    }

    pub fn with_required_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.insert(field.into(), order);
        self
    }

    fn sort_param(&self) -> Option<String> {
        if self.sort.is_empty() {
            return None;
        }
        let entries: Vec<String> = self
            .sort
            .iter()
            .map(|(field, order)| format!("{} {}", field, order.as_str()))
            .collect();
        Some(Value::from(entries).to_string())
    }
}

#[async_trait::async_trait]
impl ResourceAdapter for BiRecordAdapter {
    type Raw = TableRecord;
    type Item = Record;
    type Filter = FilterMap;
    type Draft = IndexMap<String, Value>;

    fn base_path(&self) -> String {
        format!("{}/tables/{}/records", app_path(&self.app_id), self.table_id)
    }

    fn list_params(&self, filter: &FilterMap) -> Result<QueryParams, AppError> {
        let mut params = QueryParams::new();
        match &self.view_id {
            Some(view_id) => {
                params.set("view_id", view_id);
            }
            None => {
                params.set_opt("filter", make_filter(&self.required_keys, filter));
                params.set_opt("sort", self.sort_param());
            }
        }
        params.merge(&self.query_options);
        Ok(params)
    }

    fn normalize(&self, raw: TableRecord) -> Record {
        raw.into()
    }

    fn item_id(&self, item: &Record) -> Option<String> {
        item.get("record_id").and_then(Value::as_str).map(str::to_string)
    }

    async fn fetch_one(&self, transport: &dyn LarkTransport, id: &str) -> Result<Record, AppError> {
        let request = ApiRequest::get(format!("{}/{}", self.base_path(), id))
            .with_query(self.query_options.clone());
        let raw: TableRecord = transport.fetch_field(request, "record").await?;
        Ok(raw.into())
    }

    async fn save_one(
        &self,
        transport: &dyn LarkTransport,
        fields: &IndexMap<String, Value>,
        id: Option<&str>,
    ) -> Result<Record, AppError> {
        let request = match id {
            Some(id) => ApiRequest::put(format!("{}/{}", self.base_path(), id)),
            None => ApiRequest::post(self.base_path()),
        }
        .with_body(&json!({ "fields": fields }))?;
        let raw: TableRecord = transport.fetch_field(request, "record").await?;
        Ok(raw.into())
    }
}

impl ResourceCollection<BiRecordAdapter> {
    /// Loads every record of one saved view.
    pub async fn get_view_all(&mut self, view_id: &str) -> Result<Vec<Record>, AppError> {
        self.adapter_mut().view_id = Some(view_id.to_string());
        let result = self.get_all(&FilterMap::new()).await.map(<[_]>::to_vec);
        self.adapter_mut().view_id = None;
        result
    }
}

/// Visible text of a text, link or relation cell.
pub fn normalize_text(value: &Value) -> String {
    value
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Splits a rich text cell (array of segments) on comma segments.
pub fn normalize_text_array(segments: &[Value]) -> Vec<String> {
    let mut parts = vec![String::new()];
    for segment in segments {
        if segment.get("text").and_then(Value::as_str) == Some(",") {
            parts.push(String::new());
        } else if let Some(last) = parts.last_mut() {
            last.push_str(&normalize_text(segment));
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::filter::filter_map;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_listing_params_carry_guard_sort_and_options() {
        let adapter = BiRecordAdapter::new("app1", "tbl1")
            .with_required_keys(["Title"])
            .with_sort("Date", SortOrder::Desc);
        let params = adapter.list_params(&filter_map([("Tag", "rust")])).unwrap();
        assert_eq!(
            params.get("filter"),
            Some(r#"CurrentValue.[Title]!=""&&CurrentValue.[Tag].contains("rust")"#)
        );
        assert_eq!(params.get("sort"), Some(r#"["Date DESC"]"#));
        assert_eq!(params.get("text_field_as_array"), Some("true"));
        assert_eq!(params.get("automatic_fields"), Some("true"));
    }

    #[test]
    fn view_replaces_filter_and_sort() {
        let mut adapter = BiRecordAdapter::new("app1", "tbl1")
            .with_required_keys(["Title"])
            .with_sort("Date", SortOrder::Asc);
        adapter.view_id = Some("vew1".into());
        let params = adapter.list_params(&filter_map([("Tag", "rust")])).unwrap();
        assert_eq!(params.get("view_id"), Some("vew1"));
        assert_eq!(params.get("filter"), None);
        assert_eq!(params.get("sort"), None);
    }

    #[test]
    fn records_flatten_metadata_before_fields() {
        let raw: TableRecord = serde_json::from_value(json!({
            "record_id": "rec1",
            "created_time": 1700000000000i64,
            "fields": {"Title": "Hello", "Score": 3}
        }))
        .unwrap();
        let record: Record = raw.into();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "record_id", "created_time", "Title", "Score"]);
        assert_eq!(record["Title"], json!("Hello"));
    }

    #[test]
    fn normalizes_text_cells() {
        assert_eq!(normalize_text(&json!({"text": "Ada", "type": "text"})), "Ada");
        assert_eq!(normalize_text(&json!(null)), "");
        let segments = vec![json!({"text": "a"}), json!({"text": "b"}), json!({"text": ","}), json!({"text": "c"})];
        assert_eq!(normalize_text_array(&segments), vec!["ab".to_string(), "c".to_string()]);
    }
}
