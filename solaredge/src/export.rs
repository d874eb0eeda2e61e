//! Export packaging: pretty raw JSON plus CSV of the flattened rows.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::flatten::{Flattened, Row};
use crate::operation::{Operation, TimeUnit};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("flattened result has no rows")]
    NoData,
    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error while writing export: {0}")]
    Io(#[from] std::io::Error),
    #[error("export is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Everything needed to name the exported files.
#[derive(Debug, Clone, Copy)]
pub struct NamingContext<'a> {
    pub site_id: &'a str,
    pub operation: Operation,
    pub time_unit: Option<TimeUnit>,
    pub generated_on: NaiveDate,
}

/// Paired raw JSON and CSV artifacts for one Generate action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBundle {
    pub raw_json: String,
    pub csv_text: String,
    pub filename_base: String,
}

impl ExportBundle {
    pub fn raw_filename(&self) -> String {
        format!("{}_raw.json", self.filename_base)
    }

    pub fn csv_filename(&self) -> String {
        format!("{}.csv", self.filename_base)
    }
}

/// `solaredge_<site>_<operation>[_<time unit>]_<MMDDYY>`
pub fn filename_base(ctx: &NamingContext<'_>) -> String {
    let mut parts = vec![
        "solaredge".to_string(),
        ctx.site_id.to_string(),
        ctx.operation.slug(),
    ];
    if let Some(unit) = ctx.time_unit {
        parts.push(unit.as_str().to_lowercase());
    }
    parts.push(ctx.generated_on.format("%m%d%y").to_string());
    parts.join("_")
}

/// Serialize with four-space indentation.
pub fn pretty_json(raw: &Value) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    raw.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

/// Header is `fields`; cells for absent keys are empty and keys outside
/// `fields` are ignored.
pub fn to_csv(rows: &[Row], fields: &[String]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(fields)?;
    for row in rows {
        writer.write_record(fields.iter().map(|f| cell(row.get(f))))?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Build the bundle. Refuses an empty flattened result.
pub fn package(
    raw: &Value,
    flattened: &Flattened,
    ctx: &NamingContext<'_>,
) -> Result<ExportBundle, ExportError> {
    if flattened.is_empty() {
        return Err(ExportError::NoData);
    }
    Ok(ExportBundle {
        raw_json: pretty_json(raw)?,
        csv_text: to_csv(&flattened.rows, &flattened.fields)?,
        filename_base: filename_base(ctx),
    })
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
