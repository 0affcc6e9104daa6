//! Backup files: encoding the dataset for export and validating imports.
//!
//! An export is the plain [`AppData`] document, pretty-printed with two-space
//! indentation, named `HardiStore_DB_<YYYY-MM-DD>.json` after the local date.
//! Older exports may lack `purchases` or `debts`, but an import without a
//! `sales` array is refused before anything else is looked at. Records are not
//! validated one by one beyond that: bad values are repaired and unreadable
//! records skipped, as for stored data.

use crate::error::{HardiError, Result};
use crate::model::AppData;
use chrono::{Local, NaiveDate};
use serde_json::Value;
use tracing::warn;

pub const EXPORT_FILE_PREFIX: &str = "HardiStore_DB_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub fn export_file_name(day: NaiveDate) -> String {
    format!("{}{}.json", EXPORT_FILE_PREFIX, day.format("%Y-%m-%d"))
}

pub fn encode(data: &AppData) -> Result<Snapshot> {
    encode_on(data, Local::now().date_naive())
}

pub fn encode_on(data: &AppData, day: NaiveDate) -> Result<Snapshot> {
    Ok(Snapshot {
        file_name: export_file_name(day),
        bytes: serde_json::to_vec_pretty(data)?,
    })
}

/// Parse and normalize an exported document.
pub fn decode(bytes: &[u8]) -> Result<AppData> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value.get("sales") {
        Some(Value::Array(_)) => {}
        _ => {
            return Err(HardiError::InvalidSnapshot(
                "expected a \"sales\" array".to_string(),
            ))
        }
    }
    let decoded = AppData::decode(value)?;
    if decoded.dropped > 0 {
        warn!(dropped = decoded.dropped, "import skipped unreadable records");
    }
    Ok(decoded.data)
}
