//! 事件存储（store）
//!
//! 追加式事件日志，支持查询、快照、回放与导入导出；
//! 载荷可按配置压缩、加密，并可在每次追加后交给持久化钩子。
//!
//! 存储与分发器相互独立：生产者需显式调用 `EventStore::store`。
//!
pub mod config;
pub mod event_store;
pub mod export;
pub mod persist;
pub mod query;
pub mod record;
pub mod transform;

pub use config::StoreConfig;
pub use event_store::{
    EVENT_PERSISTED, EVENT_REPLAYED, EVENT_STORED, EVENTS_IMPORTED, EventStore, SNAPSHOT_CREATED,
    SNAPSHOT_DELETED, SNAPSHOT_RESTORED, STORE_CLEARED,
};
pub use export::ExportFormat;
pub use persist::{EventPersister, JsonlPersister};
pub use query::{EventFilter, EventQuery, OrderBy, SortDirection, SortField};
pub use record::{EventMetadata, EventRecord, EventSnapshot, StoreStats};
pub use transform::{ChaChaCipher, GzipCodec, PayloadCodec};
