//! 事件存储（EventStore）
//!
//! 追加式内存日志：
//! - 序号由单调计数器分配，淘汰、恢复快照、清空都不会回退；
//! - 写入时先压缩后加密，读取时先解密后解压，日志本身始终保持编码态；
//! - 变更通过自身的 `Dispatcher` 发出通知，通知在释放锁之后发出。
//!
use super::config::StoreConfig;
use super::export::{self, ExportFormat};
use super::persist::{EventPersister, JsonlPersister};
use super::query::EventQuery;
use super::record::{EventMetadata, EventRecord, EventSnapshot, StoreStats};
use super::transform::{ChaChaCipher, GzipCodec, PayloadCodec};
use crate::dispatcher::Dispatcher;
use crate::error::{StoreError, StoreResult};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, warn};
use uuid::Uuid;

pub const EVENT_STORED: &str = "eventStored";
pub const EVENT_REPLAYED: &str = "eventReplayed";
pub const EVENT_PERSISTED: &str = "eventPersisted";
pub const SNAPSHOT_CREATED: &str = "snapshotCreated";
pub const SNAPSHOT_RESTORED: &str = "snapshotRestored";
pub const SNAPSHOT_DELETED: &str = "snapshotDeleted";
pub const STORE_CLEARED: &str = "storeCleared";
pub const EVENTS_IMPORTED: &str = "eventsImported";

const AUTO_SNAPSHOT_PREFIX: &str = "auto_";

pub struct EventStore {
    config: StoreConfig,
    state: Mutex<StoreState>,
    compressor: Option<Box<dyn PayloadCodec>>,
    cipher: Option<Box<dyn PayloadCodec>>,
    persister: Option<Box<dyn EventPersister>>,
    notifications: Dispatcher,
}

#[derive(Default)]
struct StoreState {
    events: VecDeque<EventRecord>,
    snapshots: BTreeMap<String, EventSnapshot>,
    last_sequence: u64,
    // 经 store 追加的条数，驱动自动快照；导入不计入
    appended: u64,
}

impl StoreState {
    fn evict(&mut self, max_events: usize) -> usize {
        let mut evicted = 0;
        while self.events.len() > max_events {
            self.events.pop_front();
            evicted += 1;
        }
        evicted
    }

    fn capture(&self, name: String) -> EventSnapshot {
        EventSnapshot {
            name,
            timestamp: Utc::now(),
            event_count: self.events.len(),
            last_sequence: self.last_sequence,
            events: self.events.iter().cloned().collect(),
        }
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl EventStore {
    /// 按配置装配默认的压缩器、加密器与持久化钩子
    pub fn new(config: StoreConfig) -> Self {
        let compressor: Option<Box<dyn PayloadCodec>> = config
            .enable_compression
            .then(|| Box::new(GzipCodec::default()) as Box<dyn PayloadCodec>);
        let cipher: Option<Box<dyn PayloadCodec>> = match (
            &config.encryption_key,
            config.enable_encryption,
        ) {
            (Some(key), true) => Some(Box::new(ChaChaCipher::from_passphrase(key))),
            (None, true) => {
                warn!("encryption enabled without a key; payloads will be stored unencrypted");
                None
            }
            _ => None,
        };
        let persister: Option<Box<dyn EventPersister>> = config.persist_to_disk.then(|| {
            Box::new(JsonlPersister::new(&config.storage_dir)) as Box<dyn EventPersister>
        });

        Self {
            config,
            state: Mutex::new(StoreState::default()),
            compressor,
            cipher,
            persister,
            notifications: Dispatcher::new(),
        }
    }

    /// 替换压缩器；仅在 `enable_compression` 时用于写入
    pub fn with_compressor(mut self, codec: impl PayloadCodec + 'static) -> Self {
        self.compressor = Some(Box::new(codec));
        self
    }

    /// 替换加密器；仅在 `enable_encryption` 时用于写入
    pub fn with_cipher(mut self, codec: impl PayloadCodec + 'static) -> Self {
        self.cipher = Some(Box::new(codec));
        self
    }

    /// 替换持久化钩子；仅在 `persist_to_disk` 时调用
    pub fn with_persister(mut self, persister: impl EventPersister + 'static) -> Self {
        self.persister = Some(Box::new(persister));
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// 存储通知通道
    pub fn notifications(&self) -> &Dispatcher {
        &self.notifications
    }

    /// 追加一条记录，返回记录 id
    ///
    /// 持久化失败时返回 `StoreError::Persist`，但记录已留在内存日志中。
    pub fn store(
        &self,
        event: &str,
        data: Value,
        metadata: Option<Map<String, Value>>,
    ) -> StoreResult<String> {
        let now = Utc::now();
        let mut meta = EventMetadata::new(now).with_user(metadata);
        let data = self.encode_payload(data, &mut meta)?;

        let (record, snapshot) = {
            let mut state = self.state.lock();
            state.last_sequence += 1;
            let sequence = state.last_sequence;
            let record = EventRecord {
                id: Uuid::now_v7().to_string(),
                event: event.to_string(),
                data,
                metadata: meta,
                timestamp: now,
                sequence,
            };
            state.events.push_back(record.clone());

            let evicted = state.evict(self.config.max_events);
            if evicted > 0 {
                debug!(evicted, "evicted oldest events");
            }

            state.appended += 1;
            let snapshot = (self.config.enable_snapshots
                && self.config.snapshot_interval > 0
                && state.appended % self.config.snapshot_interval == 0)
                .then(|| {
                    // 自动快照只保留最新一份
                    state.snapshots.retain(|name, _| !name.starts_with(AUTO_SNAPSHOT_PREFIX));
                    let snapshot = state.capture(format!("{AUTO_SNAPSHOT_PREFIX}{sequence}"));
                    let summary = snapshot.summary();
                    state.snapshots.insert(snapshot.name.clone(), snapshot);
                    summary
                });
            (record, snapshot)
        };

        if let Some(summary) = snapshot {
            self.notify(SNAPSHOT_CREATED, || summary);
        }
        self.notify(EVENT_STORED, || record_value(&record));

        if self.config.persist_to_disk {
            if let Some(persister) = &self.persister {
                persister
                    .persist(&record)
                    .map_err(|source| StoreError::Persist {
                        id: record.id.clone(),
                        source,
                    })?;
                self.notify(EVENT_PERSISTED, || record_value(&record));
            }
        }

        Ok(record.id)
    }

    /// 查询；返回解码后的记录
    pub fn query(&self, query: &EventQuery) -> Vec<EventRecord> {
        let matched: Vec<EventRecord> = {
            let state = self.state.lock();
            state
                .events
                .iter()
                .filter(|r| query.matches(r))
                .cloned()
                .collect()
        };
        query
            .arrange(matched)
            .into_iter()
            .map(|r| self.decode_record(r))
            .collect()
    }

    pub fn get_event(&self, id: &str) -> Option<EventRecord> {
        let record = self
            .state
            .lock()
            .events
            .iter()
            .find(|r| r.id == id)
            .cloned();
        record.map(|r| self.decode_record(r))
    }

    /// 数据回放：按查询结果顺序逐条交给 handler，并发出 `eventReplayed`
    pub fn replay(
        &self,
        query: &EventQuery,
        mut handler: Option<&mut dyn FnMut(&EventRecord)>,
    ) -> Vec<EventRecord> {
        let records = self.query(query);
        for record in &records {
            if let Some(handler) = handler.as_deref_mut() {
                handler(record);
            }
            self.notify(EVENT_REPLAYED, || record_value(record));
        }
        records
    }

    /// 创建快照，返回快照名；同名快照会被覆盖
    pub fn create_snapshot(&self, name: Option<&str>) -> String {
        let (name, summary) = {
            let mut state = self.state.lock();
            let name = match name {
                Some(name) => name.to_string(),
                None => format!(
                    "snapshot_{}_{}",
                    state.last_sequence,
                    Utc::now().timestamp_millis()
                ),
            };
            let snapshot = state.capture(name.clone());
            let summary = snapshot.summary();
            state.snapshots.insert(name.clone(), snapshot);
            (name, summary)
        };

        debug!(snapshot = %name, "snapshot created");
        self.notify(SNAPSHOT_CREATED, || summary);
        name
    }

    /// 以快照整体替换当前日志；之后追加的记录会丢失
    pub fn restore_snapshot(&self, name: &str) -> bool {
        let summary = {
            let mut state = self.state.lock();
            let Some(snapshot) = state.snapshots.get(name) else {
                return false;
            };
            let summary = snapshot.summary();
            let events: VecDeque<EventRecord> = snapshot.events.iter().cloned().collect();
            state.events = events;
            summary
        };

        debug!(snapshot = %name, "snapshot restored");
        self.notify(SNAPSHOT_RESTORED, || summary);
        true
    }

    pub fn delete_snapshot(&self, name: &str) -> bool {
        let removed = self.state.lock().snapshots.remove(name).is_some();
        if removed {
            self.notify(SNAPSHOT_DELETED, || json!({ "name": name }));
        }
        removed
    }

    pub fn snapshot(&self, name: &str) -> Option<EventSnapshot> {
        self.state.lock().snapshots.get(name).cloned()
    }

    /// 快照名（字典序）
    pub fn list_snapshots(&self) -> Vec<String> {
        self.state.lock().snapshots.keys().cloned().collect()
    }

    /// 清空日志与快照；序号计数器保持不变
    pub fn clear(&self) {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.events.len();
            state.events.clear();
            state.snapshots.clear();
            removed
        };
        self.notify(STORE_CLEARED, || json!({ "removed": removed }));
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_sequence(&self) -> u64 {
        self.state.lock().last_sequence
    }

    /// 日志中出现过的事件名（字典序，去重）
    pub fn event_types(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state.events.iter().map(|r| r.event.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.lock();
        let mut events_by_type = BTreeMap::new();
        for record in &state.events {
            *events_by_type.entry(record.event.clone()).or_insert(0) += 1;
        }
        StoreStats {
            total_events: state.events.len(),
            events_by_type,
            snapshot_count: state.snapshots.len(),
            oldest_event: state.events.front().map(|r| r.timestamp),
            newest_event: state.events.back().map(|r| r.timestamp),
            last_sequence: state.last_sequence,
        }
    }

    /// 导出原始（编码态）记录
    pub fn export(&self, format: ExportFormat) -> StoreResult<String> {
        let records: Vec<EventRecord> = self.state.lock().events.iter().cloned().collect();
        export::encode(&records, format)
    }

    /// 导入记录，返回实际追加的条数
    ///
    /// - 已存在（或同批重复）的 id 被跳过，不计数；
    /// - 按原序号升序追加；原序号不大于当前计数器时重新分配，保证日志序号严格递增。
    pub fn import(&self, data: &str, format: ExportFormat) -> StoreResult<usize> {
        let mut records = export::decode(data, format)?;
        records.sort_by_key(|r| r.sequence);

        let (count, skipped) = {
            let mut state = self.state.lock();
            let mut known: HashSet<String> = state.events.iter().map(|r| r.id.clone()).collect();
            let mut count = 0;
            let mut skipped = 0;
            for mut record in records {
                if !known.insert(record.id.clone()) {
                    skipped += 1;
                    continue;
                }
                if record.sequence <= state.last_sequence {
                    record.sequence = state.last_sequence + 1;
                }
                state.last_sequence = record.sequence;
                state.events.push_back(record);
                count += 1;
            }
            state.evict(self.config.max_events);
            (count, skipped)
        };

        debug!(count, skipped, format = %format, "events imported");
        self.notify(EVENTS_IMPORTED, || json!({ "count": count, "format": format }));
        Ok(count)
    }

    fn encode_payload(&self, data: Value, meta: &mut EventMetadata) -> StoreResult<Value> {
        let mut data = data;
        if self.config.enable_compression {
            if let Some(codec) = &self.compressor {
                data = codec
                    .encode(&data)
                    .map_err(|e| StoreError::transform("compress", format!("{e:#}")))?;
                meta.compressed = true;
            }
        }
        if self.config.enable_encryption {
            if let Some(codec) = &self.cipher {
                data = codec
                    .encode(&data)
                    .map_err(|e| StoreError::transform("encrypt", format!("{e:#}")))?;
                meta.encrypted = true;
            }
        }
        Ok(data)
    }

    fn decode_record(&self, mut record: EventRecord) -> EventRecord {
        match self.decode_payload(&record) {
            Ok(data) => record.data = data,
            Err(err) => {
                warn!(
                    id = %record.id,
                    event = %record.event,
                    error = %format!("{err:#}"),
                    "payload decode failed; returning raw value"
                );
            }
        }
        record
    }

    fn decode_payload(&self, record: &EventRecord) -> anyhow::Result<Value> {
        let mut data = record.data.clone();
        if record.metadata.encrypted {
            let codec = self
                .cipher
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("record is encrypted but no cipher is configured"))?;
            data = codec.decode(&data)?;
        }
        if record.metadata.compressed {
            let codec = self.compressor.as_ref().ok_or_else(|| {
                anyhow::anyhow!("record is compressed but no compressor is configured")
            })?;
            data = codec.decode(&data)?;
        }
        Ok(data)
    }

    // 仅在有订阅者时构造载荷；通知失败只记录日志
    fn notify(&self, topic: &str, payload: impl FnOnce() -> Value) {
        if !self.notifications.has_listeners(topic) {
            return;
        }
        if let Err(err) = self.notifications.emit(topic, &[payload()]) {
            warn!(topic, error = %err, "store notification listener failed");
        }
    }
}

fn record_value(record: &EventRecord) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}
