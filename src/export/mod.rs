//! CSV export of collections.
//!
//! The header row is taken from the first record's fields, in that record's
//! field order. Every record contributes one row with its values looked up
//! by header field. Values are quoted only when they contain a delimiter,
//! quote or line break, so plain data renders unquoted.

mod delivery;

pub use delivery::{
    CsvDelivery, Delivered, DeliveryConfig, DownloadDelivery, DownloadTarget, Platform,
    ShareDelivery, ShareTarget, CSV_MIME,
};

use crate::error::{Result, StoreError};
use crate::types::{CollectionName, Record, Timestamp};
use serde_json::Value;

/// A rendered CSV export, ready to be delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsvExport {
    pub collection: String,
    pub filename: String,
    pub content: String,
    /// Number of data rows (header excluded).
    pub rows: usize,
}

impl CsvExport {
    /// Render `records` of `collection` as CSV.
    ///
    /// Fails with [`StoreError::NoData`] when there is nothing to export.
    pub fn build(collection: &CollectionName, records: &[Record], at: Timestamp) -> Result<Self> {
        let content = render_csv(records)
            .ok_or_else(|| StoreError::NoData(collection.to_string()))??;

        Ok(Self {
            collection: collection.to_string(),
            filename: export_filename(collection, at),
            content,
            rows: records.len(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }
}

/// File name for an export of `collection` taken at `at`.
///
/// Path separators and other characters not allowed in file names are
/// replaced with `_`, so the result is always a single path component.
pub fn export_filename(collection: &CollectionName, at: Timestamp) -> String {
    let stem: String = collection
        .as_str()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    format!("{}_{}.csv", stem, at.as_millis())
}

/// Render records as CSV text.
///
/// Returns `None` when there are no records or the first record has no
/// fields. Rows are separated by `\n` with no trailing newline.
///
/// With a single column, a row whose value is empty is written as `""`
/// rather than as a blank line, so it still reads back as one field.
pub fn render_csv(records: &[Record]) -> Option<Result<String>> {
    let header: Vec<&str> = records.first()?.keys().map(String::as_str).collect();
    if header.is_empty() {
        return None;
    }
    Some(write_rows(&header, records))
}

fn write_rows(header: &[&str], records: &[Record]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(header)?;
    for record in records {
        writer.write_record(header.iter().map(|field| cell(record.get(*field))))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let mut content =
        String::from_utf8(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;

    if content.ends_with('\n') {
        content.pop();
    }
    Ok(content)
}

/// Text form of a single field value.
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => nested.to_string(),
    }
}
