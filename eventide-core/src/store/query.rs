//! 事件查询
//!
//! 过滤条件之间为 AND 关系；排序为稳定排序；分页在过滤与排序之后进行。
//!
use super::record::EventRecord;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// 事件名过滤：单个名称或名称集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventFilter {
    One(String),
    Many(Vec<String>),
}

impl EventFilter {
    pub fn any_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EventFilter::Many(names.into_iter().map(Into::into).collect())
    }

    fn matches(&self, event: &str) -> bool {
        match self {
            EventFilter::One(name) => name == event,
            EventFilter::Many(names) => names.iter().any(|n| n == event),
        }
    }
}

impl From<&str> for EventFilter {
    fn from(name: &str) -> Self {
        EventFilter::One(name.to_string())
    }
}

impl From<String> for EventFilter {
    fn from(name: String) -> Self {
        EventFilter::One(name)
    }
}

impl From<Vec<String>> for EventFilter {
    fn from(names: Vec<String>) -> Self {
        EventFilter::Many(names)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Timestamp,
    Sequence,
    Event,
    /// 按元数据中的某个键排序
    Metadata(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// 查询条件；所有字段可选，空查询返回全部记录
///
/// ```rust
/// use eventide_core::store::{EventQuery, OrderBy, SortField};
///
/// let query = EventQuery::builder()
///     .event("login")
///     .from_sequence(10)
///     .order_by(OrderBy::desc(SortField::Sequence))
///     .limit(20)
///     .build();
/// assert_eq!(query.limit, Some(20));
/// ```
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct EventQuery {
    #[builder(into)]
    pub event: Option<EventFilter>,
    /// 时间下界（含）
    pub from_timestamp: Option<DateTime<Utc>>,
    /// 时间上界（含）
    pub to_timestamp: Option<DateTime<Utc>>,
    pub from_sequence: Option<u64>,
    pub to_sequence: Option<u64>,
    /// 元数据键值需全部相等
    #[builder(default)]
    pub metadata: Map<String, Value>,
    pub order_by: Option<OrderBy>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub(crate) fn matches(&self, record: &EventRecord) -> bool {
        if let Some(filter) = &self.event {
            if !filter.matches(&record.event) {
                return false;
            }
        }
        if self.from_timestamp.is_some_and(|from| record.timestamp < from) {
            return false;
        }
        if self.to_timestamp.is_some_and(|to| record.timestamp > to) {
            return false;
        }
        if self.from_sequence.is_some_and(|from| record.sequence < from) {
            return false;
        }
        if self.to_sequence.is_some_and(|to| record.sequence > to) {
            return false;
        }
        self.metadata
            .iter()
            .all(|(key, expected)| record.metadata.get(key).as_ref() == Some(expected))
    }

    /// 排序并分页
    pub(crate) fn arrange(&self, mut records: Vec<EventRecord>) -> Vec<EventRecord> {
        if let Some(order) = &self.order_by {
            records.sort_by(|a, b| {
                let ord = compare_by(&order.field, a, b);
                match order.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        records.into_iter().skip(offset).take(limit).collect()
    }
}

fn compare_by(field: &SortField, a: &EventRecord, b: &EventRecord) -> Ordering {
    match field {
        SortField::Timestamp => a.timestamp.cmp(&b.timestamp),
        SortField::Sequence => a.sequence.cmp(&b.sequence),
        SortField::Event => a.event.cmp(&b.event),
        SortField::Metadata(key) => {
            compare_values(a.metadata.get(key).as_ref(), b.metadata.get(key).as_ref())
        }
    }
}

// 缺失 < null < bool < number < string < array < object；同类按值比较
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Object(_)) => 6,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) if rank(a) == rank(b) => x.to_string().cmp(&y.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::EventMetadata;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn record(seq: u64, event: &str, minute: u32, meta: Value) -> EventRecord {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap();
        EventRecord {
            id: format!("id-{seq}"),
            event: event.to_string(),
            data: json!({"n": seq}),
            metadata: EventMetadata::new(ts).with_user(meta.as_object().cloned()),
            timestamp: ts,
            sequence: seq,
        }
    }

    #[test]
    fn filters_compose_with_and() {
        let records: Vec<_> = (1..=10)
            .map(|i| {
                let event = if i % 3 == 0 { "x" } else { "y" };
                let tenant = if i < 7 { "a" } else { "b" };
                record(i, event, i as u32, json!({ "tenant": tenant }))
            })
            .collect();
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 0).unwrap();

        let query = EventQuery::builder()
            .event("x")
            .from_timestamp(from)
            .to_timestamp(from + Duration::minutes(5))
            .build();
        let hits: Vec<u64> = records
            .iter()
            .filter(|r| query.matches(r))
            .map(|r| r.sequence)
            .collect();
        assert_eq!(hits, vec![3, 6]);

        let query = EventQuery::builder()
            .event(EventFilter::any_of(["x", "y"]))
            .metadata(json!({"tenant": "b"}).as_object().cloned().unwrap())
            .from_sequence(8)
            .build();
        let hits: Vec<u64> = records
            .iter()
            .filter(|r| query.matches(r))
            .map(|r| r.sequence)
            .collect();
        assert_eq!(hits, vec![8, 9, 10]);
    }

    #[test]
    fn metadata_sort_is_stable_and_paginates_after_sorting() {
        let records = vec![
            record(1, "e", 1, json!({"rank": 2})),
            record(2, "e", 2, json!({})),
            record(3, "e", 3, json!({"rank": 1})),
            record(4, "e", 4, json!({"rank": 2})),
        ];

        let query = EventQuery::builder()
            .order_by(OrderBy::asc(SortField::Metadata("rank".into())))
            .build();
        let seqs: Vec<u64> = query.arrange(records.clone()).iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![2, 3, 1, 4]);

        let query = EventQuery::builder()
            .order_by(OrderBy::desc(SortField::Sequence))
            .offset(1)
            .limit(2)
            .build();
        let seqs: Vec<u64> = query.arrange(records).iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![3, 2]);
    }

    #[test]
    fn query_deserializes_from_json() {
        let query: EventQuery = serde_json::from_value(json!({
            "event": ["a", "b"],
            "order_by": {"field": "timestamp", "direction": "desc"},
            "limit": 5
        }))
        .unwrap();
        assert_eq!(query.event, Some(EventFilter::any_of(["a", "b"])));
        assert_eq!(query.order_by, Some(OrderBy::desc(SortField::Timestamp)));
    }
}
