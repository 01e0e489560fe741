//! 类型化门面（typed）
//!
//! 以枚举描述事件表：每个变体即一种事件及其载荷类型。
//! `TypedDispatcher<M>` 在 `Dispatcher` 之上只做两件事：
//! 用 `M::Kind` 约束事件名，并在 `M` 与单个 JSON 位置参数之间做转换。
//!
//! 通常通过 `#[event_map]` 宏生成 `EventMap` / `EventKind` 实现：
//!
//! ```rust,ignore
//! #[event_map]
//! enum OrderEvent {
//!     Placed { order_id: String, amount: i64 },
//!     #[event(name = "order.cancelled")]
//!     Cancelled { order_id: String },
//! }
//!
//! let typed = TypedDispatcher::<OrderEvent>::new(dispatcher);
//! typed.on(OrderEventKind::Placed, |e| { /* ... */ Ok(()) }, Default::default());
//! typed.emit(OrderEvent::Placed { order_id: "o-1".into(), amount: 10 })?;
//! ```
//!
use crate::dispatcher::{Dispatcher, Listener, ListenerId, ListenerOptions};
use crate::error::{EventError, EventResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// 事件种类：事件表中每个变体对应一个种类
pub trait EventKind: Copy + Send + Sync + 'static {
    /// 全部种类
    const ALL: &'static [Self];

    /// 分发使用的事件名
    fn name(&self) -> &'static str;
}

/// 事件表：载荷可序列化的事件枚举
pub trait EventMap: Serialize + DeserializeOwned + Send + Sync + 'static {
    type Kind: EventKind;

    fn kind(&self) -> Self::Kind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// 受 `M` 约束的分发器视图
pub struct TypedDispatcher<M: EventMap> {
    inner: Arc<Dispatcher>,
    _marker: PhantomData<fn() -> M>,
}

impl<M: EventMap> Clone for TypedDispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M: EventMap> TypedDispatcher<M> {
    pub fn new(inner: Arc<Dispatcher>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// 底层分发器
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.inner
    }

    pub fn on<F>(&self, kind: M::Kind, f: F, options: ListenerOptions) -> ListenerId
    where
        F: Fn(M) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.on(kind.name(), typed_listener(kind, f), options)
    }

    pub fn once<F>(&self, kind: M::Kind, f: F, options: ListenerOptions) -> ListenerId
    where
        F: Fn(M) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.once(kind.name(), typed_listener(kind, f), options)
    }

    pub fn on_async<F, Fut>(&self, kind: M::Kind, f: F, options: ListenerOptions) -> ListenerId
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let f = Arc::new(f);
        let listener = Listener::from_async_fn(move |args: Vec<Value>| {
            let f = f.clone();
            async move {
                let event = decode::<M>(kind.name(), &args)?;
                f(event).await?;
                anyhow::Ok(Value::Null)
            }
        });
        self.inner.on(kind.name(), listener, options)
    }

    pub fn off(&self, kind: M::Kind, listener: Option<ListenerId>) {
        self.inner.off(kind.name(), listener);
    }

    pub fn listener_count(&self, kind: M::Kind) -> usize {
        self.inner.listener_count(kind.name())
    }

    /// 同步分发；事件以单个位置参数传递
    pub fn emit(&self, event: M) -> EventResult<bool> {
        let name = event.name();
        let payload = serde_json::to_value(&event)?;
        self.inner.emit(name, &[payload])
    }

    pub async fn emit_async(&self, event: M) -> EventResult<Vec<Value>> {
        let name = event.name();
        let payload = serde_json::to_value(&event)?;
        Ok(self.inner.emit_async(name, &[payload]).await)
    }

    /// 等待某种事件触发一次
    pub async fn wait_for(&self, kind: M::Kind, timeout: Option<Duration>) -> EventResult<M> {
        let args = self.inner.wait_for(kind.name(), timeout).await?;
        decode::<M>(kind.name(), &args)
    }
}

fn typed_listener<M, F>(kind: M::Kind, f: F) -> Listener
where
    M: EventMap,
    F: Fn(M) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Listener::from_fn(move |args| {
        let event = decode::<M>(kind.name(), args)?;
        f(event)?;
        Ok(Value::Null)
    })
}

fn decode<M: EventMap>(name: &str, args: &[Value]) -> EventResult<M> {
    let Some(payload) = args.first() else {
        return Err(EventError::Decode {
            event: name.to_string(),
            reason: "missing payload argument".to_string(),
        });
    };
    serde_json::from_value(payload.clone()).map_err(|e| EventError::Decode {
        event: name.to_string(),
        reason: e.to_string(),
    })
}
