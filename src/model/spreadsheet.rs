// src/model/spreadsheet.rs
//! Spreadsheet sheets read as pages of keyed rows.

use crate::api::{ApiRequest, LarkTransport, TransportExt};
use crate::error::AppError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetMeta {
    pub sheet_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub row_count: usize,
    #[serde(default)]
    pub column_count: usize,
    #[serde(default)]
    pub frozen_row_count: usize,
    #[serde(default)]
    pub frozen_col_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadSheetInfo {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeData {
    value_range: ValueRange,
}

/// One row, keyed by the declared column keys.
pub type SheetRow = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct SheetPage {
    pub rows: Vec<SheetRow>,
    /// Data rows in the sheet below the row offset.
    pub total_count: usize,
}

/// Column letters of a 1-based column number: 1 is `A`, 27 is `AA`.
pub fn column_name(mut number: usize) -> String {
    let mut letters = Vec::new();
    while number > 0 {
        let rem = (number - 1) % 26;
        letters.push(b'A' + rem as u8);
        number = (number - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Reads one sheet of a spreadsheet.
///
/// Columns starting at the column offset are mapped, in order, onto
/// `column_keys`; rows above the row offset (headers) are skipped.
pub struct SpreadSheetModel {
    transport: Arc<dyn LarkTransport>,
    pub spreadsheet_token: String,
    pub sheet_id: String,
    pub column_keys: Vec<String>,
    /// (rows, columns) to skip.
    pub offset: (usize, usize),
    meta: Option<SheetMeta>,
}

impl SpreadSheetModel {
    pub fn new(
        transport: Arc<dyn LarkTransport>,
        spreadsheet_token: impl Into<String>,
        sheet_id: impl Into<String>,
        column_keys: Vec<String>,
    ) -> Self {
        Self {
            transport,
            spreadsheet_token: spreadsheet_token.into(),
            sheet_id: sheet_id.into(),
            column_keys,
            offset: (0, 0),
            meta: None,
        }
    }

    pub fn with_offset(mut self, rows: usize, columns: usize) -> Self {
        self.offset = (rows, columns);
        self
    }

    fn base_path(&self) -> String {
        format!("sheets/v2/spreadsheets/{}", self.spreadsheet_token)
    }

    /// Metadata of the sheet, fetched once.
    pub async fn get_meta(&mut self) -> Result<&SheetMeta, AppError> {
        if self.meta.is_none() {
            let request = ApiRequest::get(format!("{}/metainfo", self.base_path()));
            let info: SpreadSheetInfo = self.transport.fetch_data(request).await?;
            let sheet = info
                .sheets
                .into_iter()
                .find(|sheet| sheet.sheet_id == self.sheet_id)
                .ok_or_else(|| AppError::Configuration(format!("Sheet \"{}\" is not found", self.sheet_id)))?;
            self.meta = Some(sheet);
        }
        self.meta
            .as_ref()
            .ok_or_else(|| AppError::malformed(self.base_path(), "sheet metadata missing"))
    }

    /// Loads rows of page `index` (1-based).
    pub async fn load_page(&mut self, index: usize, size: usize) -> Result<SheetPage, AppError> {
        if self.column_keys.is_empty() {
            return Err(AppError::Configuration(format!(
                "Sheet \"{}\" has no column keys",
                self.sheet_id
            )));
        }
        let (row_off, column_off) = self.offset;
        let row_count = self.get_meta().await?.row_count;
        let total_count = row_count.saturating_sub(row_off);

        let size = size.max(1);
        let start_row = row_off + 1 + (index.max(1) - 1) * size;
        if start_row > row_count {
            return Ok(SheetPage {
                rows: Vec::new(),
                total_count,
            });
        }
        let end_row = (start_row + size - 1).min(row_count);
        let range = format!(
            "{}!{}{}:{}{}",
            self.sheet_id,
            column_name(column_off + 1),
            start_row,
            column_name(column_off + self.column_keys.len()),
            end_row
        );

        let request = ApiRequest::get(format!("{}/values/{}", self.base_path(), range))
            .with_param("dateTimeRenderOption", "FormattedString");
        let data: RangeData = self.transport.fetch_data(request).await?;
        let rows = data
            .value_range
            .values
            .into_iter()
            .map(|cells| {
                let mut cells = cells.into_iter();
                self.column_keys
                    .iter()
                    .map(|key| (key.clone(), cells.next().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();
        Ok(SheetPage { rows, total_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_are_bijective_base_26() {
        assert_eq!(column_name(1), "A");
        assert_eq!(column_name(26), "Z");
        assert_eq!(column_name(27), "AA");
        assert_eq!(column_name(52), "AZ");
        assert_eq!(column_name(703), "AAA");
    }
}
