//! 监听器（Listener）及其注册选项
//!
//! 监听器以位置参数 `&[Value]` 调用，可同步返回结果，也可返回一个 future。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// 异步监听器返回的 future
pub type ListenerFuture = BoxFuture<'static, anyhow::Result<Value>>;

type SyncFn = dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync;
type AsyncFn = dyn Fn(Vec<Value>) -> ListenerFuture + Send + Sync;

/// 监听器回调
#[derive(Clone)]
pub enum Listener {
    /// 同步回调：在 `emit` 与 `emit_async` 中都会被直接调用
    Sync(Arc<SyncFn>),
    /// 异步回调：`emit_async` 中顺序 await；`emit` 中交由当前 tokio 运行时后台执行
    Async(Arc<AsyncFn>),
}

impl Listener {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Listener::Sync(Arc::new(f))
    }

    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Listener::Async(Arc::new(move |args: Vec<Value>| -> ListenerFuture {
            Box::pin(f(args))
        }))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Listener::Async(_))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::Sync(_) => f.write_str("Listener::Sync(..)"),
            Listener::Async(_) => f.write_str("Listener::Async(..)"),
        }
    }
}

/// 注册句柄：`on`/`once` 返回，用于 `off` 精确移除
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 注册选项
///
/// ```rust
/// use eventide_core::dispatcher::ListenerOptions;
///
/// let opts = ListenerOptions::builder()
///     .priority(10)
///     .namespace("billing")
///     .tags(vec!["audit".to_string()])
///     .build();
/// assert_eq!(opts.priority, 10);
/// ```
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
pub struct ListenerOptions {
    /// 优先级，越大越先触发；相同优先级保持注册顺序
    #[builder(default)]
    #[serde(default)]
    pub priority: i32,
    /// 命名空间，用于批量移除
    #[builder(into)]
    #[serde(default)]
    pub namespace: Option<String>,
    /// 标签，用于批量移除
    #[builder(default)]
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ListenerOptions {
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            ..Default::default()
        }
    }
}

/// 注册信息的只读视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerInfo {
    pub id: ListenerId,
    pub once: bool,
    pub priority: i32,
    pub namespace: Option<String>,
    pub tags: Vec<String>,
    pub call_count: u64,
    pub last_called_at: Option<DateTime<Utc>>,
}

/// 发往 `"error"` 通道的失败描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerFailure {
    pub event: String,
    pub listener: ListenerId,
    pub message: String,
}

impl ListenerFailure {
    pub(crate) fn new(event: &str, listener: ListenerId, err: &anyhow::Error) -> Self {
        Self {
            event: event.to_string(),
            listener,
            message: format!("{err:#}"),
        }
    }

    /// 从 `"error"` 事件的首个参数还原
    pub fn from_args(args: &[Value]) -> Option<Self> {
        args.first()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub(crate) fn to_value(&self) -> Value {
        serde_json::json!({
            "event": self.event,
            "listener": self.listener.0,
            "message": self.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_roundtrips_through_error_args() {
        let err = anyhow::anyhow!("boom");
        let failure = ListenerFailure::new("order.paid", ListenerId(7), &err);
        let restored = ListenerFailure::from_args(&[failure.to_value()]).unwrap();
        assert_eq!(restored, failure);
        assert_eq!(restored.message, "boom");
    }

    #[test]
    fn options_builder_defaults() {
        let opts = ListenerOptions::builder().build();
        assert_eq!(opts.priority, 0);
        assert!(opts.namespace.is_none());
        assert!(opts.tags.is_empty());

        let opts: ListenerOptions = serde_json::from_value(json!({"priority": 3})).unwrap();
        assert_eq!(opts.priority, 3);
    }
}
