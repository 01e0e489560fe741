//! 存储记录与快照
//!
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const RESERVED_KEYS: [&str; 4] = ["timestamp", "version", "compressed", "encrypted"];

/// 记录元数据：内置字段加调用方自定义键（扁平化序列化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default)]
    pub compressed: bool,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_version() -> u64 {
    1
}

impl EventMetadata {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            version: default_version(),
            compressed: false,
            encrypted: false,
            extra: Map::new(),
        }
    }

    /// 合并调用方元数据：数值型 `version` 覆盖默认版本，其余保留字被忽略
    pub(crate) fn with_user(mut self, user: Option<Map<String, Value>>) -> Self {
        let Some(mut user) = user else {
            return self;
        };
        if let Some(version) = user.get("version").and_then(Value::as_u64) {
            self.version = version;
        }
        for key in RESERVED_KEYS {
            user.remove(key);
        }
        self.extra = user;
        self
    }

    /// 按键读取，内置字段与自定义键统一视为 JSON 值
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "timestamp" => serde_json::to_value(self.timestamp).ok(),
            "version" => Some(Value::from(self.version)),
            "compressed" => Some(Value::Bool(self.compressed)),
            "encrypted" => Some(Value::Bool(self.encrypted)),
            _ => self.extra.get(key).cloned(),
        }
    }
}

/// 事件日志中的一条记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub event: String,
    pub data: Value,
    pub metadata: EventMetadata,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
}

impl EventRecord {
    pub(crate) fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.event.is_empty() && self.sequence > 0
    }
}

/// 日志在某一时刻的完整副本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub event_count: usize,
    pub last_sequence: u64,
    pub events: Vec<EventRecord>,
}

impl EventSnapshot {
    /// 通知用的摘要（不含事件副本）
    pub(crate) fn summary(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "timestamp": self.timestamp,
            "event_count": self.event_count,
            "last_sequence": self.last_sequence,
        })
    }
}

/// 存储概况
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_events: usize,
    pub events_by_type: BTreeMap<String, usize>,
    pub snapshot_count: usize,
    pub oldest_event: Option<DateTime<Utc>>,
    pub newest_event: Option<DateTime<Utc>>,
    pub last_sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_metadata_is_flattened_and_version_taken() {
        let user = json!({"version": 3, "source": "api", "compressed": true});
        let meta = EventMetadata::new(Utc::now()).with_user(user.as_object().cloned());

        assert_eq!(meta.version, 3);
        assert!(!meta.compressed);
        assert_eq!(meta.get("source"), Some(json!("api")));

        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["source"], json!("api"));
        assert_eq!(value["compressed"], json!(false));

        let back: EventMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn missing_flags_default_on_deserialize() {
        let meta: EventMetadata =
            serde_json::from_value(json!({"timestamp": "2024-05-01T00:00:00Z"})).unwrap();
        assert_eq!(meta.version, 1);
        assert!(!meta.encrypted);
        assert!(meta.extra.is_empty());
    }
}
