//! 进程内事件子系统核心（eventide-core）
//!
//! 提供三块相互独立的构件：
//! - 分发器（`dispatcher`）：优先级与命名空间感知的发布/订阅，支持同步/异步分发、一次性等待与统计；
//! - 类型化门面（`typed`）：以事件枚举约束事件名与载荷，配合 `#[event_map]` 宏使用；
//! - 事件存储（`store`）：带单调序号的追加式日志，支持查询、快照、回放、导入导出与载荷变换。
//!
//! 中间件管线位于 `eventide-pipeline`，其终端处理器通常落到本 crate 的 `Dispatcher` 上。
//!
//! 典型用法：
//! 1. 构造 `Dispatcher`，用 `on`/`once` 注册监听器并 `emit`；
//! 2. 需要类型约束时，用 `#[event_map]` 定义事件枚举并通过 `TypedDispatcher` 分发；
//! 3. 需要留痕时，显式调用 `EventStore::store`，再按 `EventQuery` 查询或回放。
//!
pub mod dispatcher;
pub mod error;
pub mod store;
pub mod typed;

pub use dispatcher::{Dispatcher, DispatcherConfig, Listener, ListenerId, ListenerOptions};
pub use error::{EventError, EventResult, StoreError, StoreResult};
pub use store::{EventQuery, EventRecord, EventStore, StoreConfig};
pub use typed::{EventKind, EventMap, TypedDispatcher};

// 允许在本 crate 内部通过 ::eventide_core 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::eventide_core 路径。
extern crate self as eventide_core;
