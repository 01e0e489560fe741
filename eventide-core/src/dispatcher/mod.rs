//! 事件分发核心（dispatcher）
//!
//! - `Dispatcher`：按事件名维护优先级有序的监听器注册表，提供同步/异步分发、一次性等待与统计；
//! - `Listener`：同步或异步回调，以位置参数 `&[Value]` 调用；
//! - `Subscriber`：声明式批量订阅；
//! - `EventStats`：每个事件名的分发计数与耗时。
//!
//! 监听器失败通过约定的 [`ERROR_EVENT`] 通道上报。
//!
pub mod config;
pub mod emitter;
pub mod listener;
pub mod stats;
pub mod subscriber;

pub use config::DispatcherConfig;
pub use emitter::{Dispatcher, ERROR_EVENT};
pub use listener::{
    Listener, ListenerFailure, ListenerFuture, ListenerId, ListenerInfo, ListenerOptions,
};
pub use stats::EventStats;
pub use subscriber::{Subscriber, Subscription};
