//! 中间件协议
//!
//! 洋葱模型：每个中间件拿到 `(event, args, next)`，
//! 调用 `next.run(args)` 把（可能替换过的）载荷交给下游，不调用则短路。
//!
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use eventide_core::dispatcher::Dispatcher;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 沿链路传递的位置参数
pub type Args = Vec<Value>;

pub type MiddlewareFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

type FinalFn = dyn Fn(String, Args) -> MiddlewareFuture + Send + Sync;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, event: &str, args: Args, next: Next) -> anyhow::Result<()>;
}

/// 闭包形式的中间件
pub struct FnMiddleware<F> {
    f: F,
}

/// 由闭包构造中间件
///
/// ```rust
/// use eventide_pipeline::middleware::from_fn;
///
/// let passthrough = from_fn(|_event, args, next| next.run(args));
/// ```
pub fn from_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(String, Args, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnMiddleware { f })
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(String, Args, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: &str, args: Args, next: Next) -> anyhow::Result<()> {
        (self.f)(event.to_string(), args, next).await
    }
}

/// 终端处理器：链路走完后以最终载荷调用
#[derive(Clone)]
pub struct FinalHandler(Arc<FinalFn>);

impl FinalHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(String, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        FinalHandler(Arc::new(move |event: String, args: Args| -> MiddlewareFuture {
            Box::pin(f(event, args))
        }))
    }

    /// 将最终载荷交给分发器的 `emit_async`
    pub fn dispatch_to(dispatcher: Arc<Dispatcher>) -> Self {
        Self::new(move |event, args| {
            let dispatcher = dispatcher.clone();
            async move {
                dispatcher.emit_async(&event, &args).await;
                anyhow::Ok(())
            }
        })
    }

    fn call(&self, event: &str, args: Args) -> MiddlewareFuture {
        (self.0)(event.to_string(), args)
    }
}

/// 注册选项
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct MiddlewareOptions {
    /// 越大越靠外层（越先执行）；相同优先级保持注册顺序
    #[builder(default)]
    pub priority: i32,
    /// 唯一名称；缺省时按位置生成 `middleware_{n}`
    #[builder(into)]
    pub name: Option<String>,
    #[builder(default = true)]
    pub enabled: bool,
    #[builder(default)]
    pub tags: Vec<String>,
}

impl Default for MiddlewareOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            name: None,
            enabled: true,
            tags: Vec::new(),
        }
    }
}

impl MiddlewareOptions {
    pub fn named(name: impl Into<String>, priority: i32) -> Self {
        Self {
            priority,
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// 中间件注册信息与统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiddlewareInfo {
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
    pub tags: Vec<String>,
    pub call_count: u64,
    pub last_called_at: Option<DateTime<Utc>>,
    pub total_execution_time: Duration,
}

#[derive(Debug, Default)]
struct EntryStats {
    call_count: u64,
    last_called_at: Option<DateTime<Utc>>,
    total_execution_time: Duration,
}

pub(crate) struct Entry {
    pub(crate) name: String,
    pub(crate) priority: i32,
    pub(crate) tags: Vec<String>,
    pub(crate) middleware: Arc<dyn Middleware>,
    enabled: AtomicBool,
    stats: Mutex<EntryStats>,
}

impl Entry {
    pub(crate) fn new(
        name: String,
        middleware: Arc<dyn Middleware>,
        options: MiddlewareOptions,
    ) -> Self {
        Self {
            name,
            priority: options.priority,
            tags: options.tags,
            middleware,
            enabled: AtomicBool::new(options.enabled),
            stats: Mutex::new(EntryStats::default()),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub(crate) fn reset_stats(&self) {
        *self.stats.lock() = EntryStats::default();
    }

    pub(crate) fn info(&self) -> MiddlewareInfo {
        let stats = self.stats.lock();
        MiddlewareInfo {
            name: self.name.clone(),
            priority: self.priority,
            enabled: self.is_enabled(),
            tags: self.tags.clone(),
            call_count: stats.call_count,
            last_called_at: stats.last_called_at,
            total_execution_time: stats.total_execution_time,
        }
    }

    fn record_call(&self) {
        let mut stats = self.stats.lock();
        stats.call_count += 1;
        stats.last_called_at = Some(Utc::now());
    }

    fn record_elapsed(&self, elapsed: Duration) {
        self.stats.lock().total_execution_time += elapsed;
    }
}

/// 链路续体
///
/// `Next` 可克隆；对同一个 `Next` 运行两次会从当前位置重新进入剩余链路，中间件需自行避免。
#[derive(Clone)]
pub struct Next {
    event: Arc<str>,
    chain: Arc<[Arc<Entry>]>,
    cursor: usize,
    terminal: Option<FinalHandler>,
    record_stats: bool,
}

impl Next {
    pub(crate) fn start(
        event: &str,
        chain: Arc<[Arc<Entry>]>,
        terminal: Option<FinalHandler>,
        record_stats: bool,
    ) -> Self {
        Self {
            event: Arc::from(event),
            chain,
            cursor: 0,
            terminal,
            record_stats,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// 剩余（尚未进入）的中间件数量
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.cursor)
    }

    /// 以给定载荷继续执行下游
    pub fn run(self, args: Args) -> MiddlewareFuture {
        Box::pin(async move {
            let Some(entry) = self.chain.get(self.cursor).cloned() else {
                return match &self.terminal {
                    Some(handler) => handler.call(&self.event, args).await,
                    None => Ok(()),
                };
            };

            let next = Next {
                cursor: self.cursor + 1,
                ..self.clone()
            };
            if self.record_stats {
                entry.record_call();
            }
            let started = Instant::now();
            let result = entry.middleware.handle(&self.event, args, next).await;
            if self.record_stats {
                entry.record_elapsed(started.elapsed());
            }
            result
        })
    }
}
