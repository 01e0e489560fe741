//! 导入导出格式
//!
//! - `json`：记录数组，完整保真；
//! - `csv`：仅 `id,event,data,timestamp,sequence` 五列，元数据（含压缩/加密标记）会丢失。
//!
//! 导入时逐条校验，无法解析的记录或行被跳过而不是中止整批。
//!
use super::record::{EventMetadata, EventRecord};
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const CSV_HEADER: [&str; 5] = ["id", "event", "data", "timestamp", "sequence"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(StoreError::Import {
                format: "unknown",
                reason: format!("unsupported format `{other}`"),
            }),
        }
    }
}

pub(crate) fn encode(records: &[EventRecord], format: ExportFormat) -> StoreResult<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        ExportFormat::Csv => encode_csv(records),
    }
}

pub(crate) fn decode(text: &str, format: ExportFormat) -> StoreResult<Vec<EventRecord>> {
    match format {
        ExportFormat::Json => decode_json(text),
        ExportFormat::Csv => Ok(decode_csv(text)),
    }
}

fn decode_json(text: &str) -> StoreResult<Vec<EventRecord>> {
    let items: Vec<Value> = serde_json::from_str(text).map_err(|e| StoreError::Import {
        format: "json",
        reason: e.to_string(),
    })?;

    let total = items.len();
    let records: Vec<EventRecord> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<EventRecord>(item).ok())
        .filter(EventRecord::is_valid)
        .collect();
    if records.len() < total {
        debug!(skipped = total - records.len(), "json import skipped invalid records");
    }
    Ok(records)
}

fn encode_csv(records: &[EventRecord]) -> StoreResult<String> {
    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');
    for record in records {
        let data = serde_json::to_string(&record.data)?;
        let row = [
            csv_field(&record.id),
            csv_field(&record.event),
            csv_field(&data),
            csv_field(&record.timestamp.to_rfc3339()),
            record.sequence.to_string(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    Ok(out)
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn decode_csv(text: &str) -> Vec<EventRecord> {
    let mut rows = parse_csv(text).into_iter();
    // 首行为表头
    rows.next();

    let mut skipped = 0usize;
    let records: Vec<EventRecord> = rows
        .filter(|row| !(row.len() == 1 && row[0].is_empty()))
        .filter_map(|row| {
            let record = csv_row(&row);
            if record.is_none() {
                skipped += 1;
            }
            record
        })
        .collect();
    if skipped > 0 {
        debug!(skipped, "csv import skipped malformed rows");
    }
    records
}

fn csv_row(row: &[String]) -> Option<EventRecord> {
    let [id, event, data, timestamp, sequence] = row else {
        return None;
    };
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(timestamp)
        .ok()?
        .with_timezone(&Utc);
    let record = EventRecord {
        id: id.clone(),
        event: event.clone(),
        data: serde_json::from_str(data).ok()?,
        metadata: EventMetadata::new(timestamp),
        timestamp,
        sequence: sequence.trim().parse().ok()?,
    };
    record.is_valid().then_some(record)
}

// 支持引号包裹、双引号转义与字段内换行
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}
