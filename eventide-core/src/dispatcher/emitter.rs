//! 分发器（Dispatcher）
//!
//! 每个事件名维护一份按优先级降序（稳定）排列的注册表：
//! - `emit`：同步分发，首个失败的监听器中止本次分发；
//! - `emit_async`：顺序 await 每个监听器，单个失败不影响其余监听器；
//! - 失败经由 `"error"` 事件通道上报。
//!
//! 所有状态由一把互斥锁保护；调用监听器时不持锁，监听器内可安全地再次 `emit` / `on` / `off`。
//!
use super::config::DispatcherConfig;
use super::listener::{Listener, ListenerFailure, ListenerId, ListenerInfo, ListenerOptions};
use super::stats::EventStats;
use super::subscriber::Subscriber;
use crate::error::{EventError, EventResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// 约定的错误事件名
pub const ERROR_EVENT: &str = "error";

/// 优先级 + 命名空间感知的事件分发器
pub struct Dispatcher {
    config: DispatcherConfig,
    next_id: AtomicU64,
    state: Mutex<DispatchState>,
}

#[derive(Default)]
struct DispatchState {
    listeners: HashMap<String, Vec<Registration>>,
    stats: HashMap<String, EventStats>,
    // 已告警过超限的事件，避免重复刷屏
    warned: HashSet<String>,
}

struct Registration {
    id: ListenerId,
    listener: Listener,
    once: bool,
    priority: i32,
    namespace: Option<String>,
    tags: Vec<String>,
    call_count: u64,
    last_called_at: Option<DateTime<Utc>>,
    // once 监听器的占用标记，保证并发分发下至多一次成功触发
    claimed: Arc<AtomicBool>,
}

impl Registration {
    fn info(&self) -> ListenerInfo {
        ListenerInfo {
            id: self.id,
            once: self.once,
            priority: self.priority,
            namespace: self.namespace.clone(),
            tags: self.tags.clone(),
            call_count: self.call_count,
            last_called_at: self.last_called_at,
        }
    }
}

// 单次分发时的注册快照
struct Dispatch {
    id: ListenerId,
    listener: Listener,
    once: bool,
    claimed: Arc<AtomicBool>,
}

// emit_async 持有的一次性监听器占用标记。
// 成功触发的条目被 settle；其余条目（失败、未轮到、或 future 被丢弃时正在执行）在释放时归还。
struct ClaimGuard {
    claims: Vec<Option<Arc<AtomicBool>>>,
}

impl ClaimGuard {
    fn new(batch: &[Dispatch]) -> Self {
        Self {
            claims: batch
                .iter()
                .map(|d| d.once.then(|| d.claimed.clone()))
                .collect(),
        }
    }

    fn settle(&mut self, index: usize) {
        if let Some(slot) = self.claims.get_mut(index) {
            slot.take();
        }
    }

    fn release(&mut self, index: usize) {
        if let Some(claim) = self.claims.get_mut(index).and_then(Option::take) {
            claim.store(false, Ordering::Release);
        }
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        for claim in self.claims.iter_mut().filter_map(Option::take) {
            claim.store(false, Ordering::Release);
        }
    }
}

// wait_for 的一次性监听器在任何退出路径上都被摘除；已触发时 off 为空操作
struct WaitGuard<'a> {
    dispatcher: &'a Dispatcher,
    event: &'a str,
    id: ListenerId,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.off(self.event, Some(self.id));
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(0),
            state: Mutex::new(DispatchState::default()),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// 注册监听器
    pub fn on(&self, event: &str, listener: Listener, options: ListenerOptions) -> ListenerId {
        self.register(event, listener, options, false)
    }

    /// 注册一次性监听器：首次成功触发后自动移除
    pub fn once(&self, event: &str, listener: Listener, options: ListenerOptions) -> ListenerId {
        self.register(event, listener, options, true)
    }

    /// 注册 `Subscriber` 声明的全部订阅
    pub fn subscribe(&self, subscriber: &dyn Subscriber) -> Vec<ListenerId> {
        subscriber
            .subscriptions()
            .into_iter()
            .map(|s| self.register(&s.event, s.listener, s.options, s.once))
            .collect()
    }

    fn register(
        &self,
        event: &str,
        listener: Listener,
        options: ListenerOptions,
        once: bool,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let priority = options.priority;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let list = state.listeners.entry(event.to_string()).or_default();
        list.push(Registration {
            id,
            listener,
            once,
            priority,
            namespace: options.namespace,
            tags: options.tags,
            call_count: 0,
            last_called_at: None,
            claimed: Arc::new(AtomicBool::new(false)),
        });
        // sort_by 为稳定排序：同优先级保持注册顺序
        list.sort_by(|a, b| b.priority.cmp(&a.priority));
        let count = list.len();

        if count > self.config.max_listeners && state.warned.insert(event.to_string()) {
            warn!(
                event,
                count,
                max_listeners = self.config.max_listeners,
                "listener count exceeds soft limit"
            );
        }
        if self.config.enable_stats {
            state.stats.entry(event.to_string()).or_default().listener_count = count;
        }

        debug!(event, listener = %id, priority, once, "listener registered");
        id
    }

    /// 移除监听器：`None` 移除该事件的全部注册；找不到时静默忽略
    pub fn off(&self, event: &str, listener: Option<ListenerId>) {
        let Some(id) = listener else {
            self.remove_all_listeners(Some(event));
            return;
        };

        let mut state = self.state.lock();
        if let Some(list) = state.listeners.get_mut(event) {
            list.retain(|r| r.id != id);
        }
        Self::sync_listener_count(&mut state, event);
    }

    /// 移除全部监听器：`Some(event)` 仅移除该事件
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        let mut state = self.state.lock();
        match event {
            Some(event) => {
                state.listeners.remove(event);
                if let Some(stats) = state.stats.get_mut(event) {
                    stats.listener_count = 0;
                }
            }
            None => {
                state.listeners.clear();
                for stats in state.stats.values_mut() {
                    stats.listener_count = 0;
                }
            }
        }
    }

    /// 按命名空间批量移除，返回移除数量；幸存者保持相对顺序
    pub fn remove_listeners_by_namespace(&self, namespace: &str) -> usize {
        self.remove_where(|r| r.namespace.as_deref() == Some(namespace))
    }

    /// 按标签批量移除，返回移除数量；幸存者保持相对顺序
    pub fn remove_listeners_by_tag(&self, tag: &str) -> usize {
        self.remove_where(|r| r.tags.iter().any(|t| t == tag))
    }

    fn remove_where(&self, pred: impl Fn(&Registration) -> bool) -> usize {
        let mut state = self.state.lock();
        let events: Vec<String> = state.listeners.keys().cloned().collect();
        let mut removed = 0;
        for event in events {
            if let Some(list) = state.listeners.get_mut(&event) {
                let before = list.len();
                list.retain(|r| !pred(r));
                removed += before - list.len();
            }
            Self::sync_listener_count(&mut state, &event);
        }
        removed
    }

    fn sync_listener_count(state: &mut DispatchState, event: &str) {
        let count = state.listeners.get(event).map(Vec::len).unwrap_or(0);
        if count == 0 {
            state.listeners.remove(event);
        }
        if let Some(stats) = state.stats.get_mut(event) {
            stats.listener_count = count;
        }
    }

    /// 同步分发
    ///
    /// 返回是否有监听器被调用。监听器失败时中止本次分发：
    /// 存在 `"error"` 监听器则转发到 `"error"`，否则以 `EventError::Listener` 返回给调用方。
    /// 向没有监听器的 `"error"` 事件分发会返回 `EventError::Unhandled`。
    pub fn emit(&self, event: &str, args: &[Value]) -> EventResult<bool> {
        let started = Instant::now();
        let batch = self.begin_dispatch(event, true);

        if batch.is_empty() {
            self.finish_dispatch(event, started.elapsed());
            if event == ERROR_EVENT {
                return Err(EventError::Unhandled {
                    message: describe_error_args(args),
                });
            }
            return Ok(false);
        }

        let mut outcome = Ok(true);
        for entry in &batch {
            match &entry.listener {
                Listener::Sync(f) => {
                    if let Err(err) = f(args) {
                        outcome = self.route_failure(event, entry.id, err);
                        break;
                    }
                }
                Listener::Async(f) => spawn_detached(event, entry.id, f(args.to_vec())),
            }
        }

        self.finish_dispatch(event, started.elapsed());
        outcome
    }

    /// 异步分发：按优先级顺序逐个 await，收集成功结果
    ///
    /// 单个监听器失败会被转发到 `"error"`（无 `"error"` 监听器时仅记录日志），不会中止其余监听器。
    pub async fn emit_async(&self, event: &str, args: &[Value]) -> Vec<Value> {
        let started = Instant::now();
        let batch = self.begin_dispatch(event, false);
        let mut claims = ClaimGuard::new(&batch);
        let mut results = Vec::with_capacity(batch.len());

        for (index, entry) in batch.iter().enumerate() {
            let outcome = match &entry.listener {
                Listener::Sync(f) => f(args),
                Listener::Async(f) => f(args.to_vec()).await,
            };

            match outcome {
                Ok(value) => {
                    results.push(value);
                    if entry.once {
                        claims.settle(index);
                        self.off(event, Some(entry.id));
                    }
                }
                Err(err) => {
                    claims.release(index);
                    self.report_failure(event, entry.id, err);
                }
            }
        }

        self.finish_dispatch(event, started.elapsed());
        results
    }

    /// 等待事件触发一次，返回其参数
    ///
    /// 超时返回 `EventError::Timeout`；超时或 future 被提前丢弃时，一次性监听器都会被移除。
    pub async fn wait_for(
        &self,
        event: &str,
        timeout: Option<Duration>,
    ) -> EventResult<Vec<Value>> {
        let (tx, rx) = oneshot::channel::<Vec<Value>>();
        let slot = Mutex::new(Some(tx));
        let id = self.once(
            event,
            Listener::from_fn(move |args| {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(args.to_vec());
                }
                Ok(Value::Null)
            }),
            ListenerOptions::default(),
        );
        let _waiting = WaitGuard {
            dispatcher: self,
            event,
            id,
        };

        let received = match timeout {
            None => rx.await,
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    return Err(EventError::Timeout {
                        event: event.to_string(),
                        timeout: limit,
                    });
                }
            },
        };

        received.map_err(|_| EventError::Cancelled {
            event: event.to_string(),
        })
    }

    // 记录 emit 统计、为本次分发的注册打点并取快照。
    // detach_once 为 true 时（同步分发），一次性监听器在调用前即被摘除。
    fn begin_dispatch(&self, event: &str, detach_once: bool) -> Vec<Dispatch> {
        let now = Utc::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if self.config.enable_stats {
            if let Some(stats) = state.stats.get_mut(event) {
                stats.record_emit(now);
            }
        }

        let Some(list) = state.listeners.get_mut(event) else {
            return Vec::new();
        };

        let mut batch = Vec::with_capacity(list.len());
        let mut detached = Vec::new();
        for reg in list.iter_mut() {
            // 已被其他分发占用的一次性监听器不参与本次分发
            if reg.once && reg.claimed.swap(true, Ordering::AcqRel) {
                continue;
            }
            reg.call_count += 1;
            reg.last_called_at = Some(now);
            batch.push(Dispatch {
                id: reg.id,
                listener: reg.listener.clone(),
                once: reg.once,
                claimed: reg.claimed.clone(),
            });
            if reg.once && detach_once {
                detached.push(reg.id);
            }
        }

        if !detached.is_empty() {
            list.retain(|r| !detached.contains(&r.id));
            Self::sync_listener_count(state, event);
        }

        batch
    }

    fn finish_dispatch(&self, event: &str, elapsed: Duration) {
        if !self.config.enable_stats {
            return;
        }
        if let Some(stats) = self.state.lock().stats.get_mut(event) {
            stats.record_elapsed(elapsed);
        }
    }

    fn route_failure(&self, event: &str, id: ListenerId, err: anyhow::Error) -> EventResult<bool> {
        if event != ERROR_EVENT && self.has_listeners(ERROR_EVENT) {
            let failure = ListenerFailure::new(event, id, &err);
            self.emit(ERROR_EVENT, &[failure.to_value()])?;
            return Ok(true);
        }

        Err(EventError::Listener {
            event: event.to_string(),
            listener: id.value(),
            source: err,
        })
    }

    fn report_failure(&self, event: &str, id: ListenerId, err: anyhow::Error) {
        if event != ERROR_EVENT && self.has_listeners(ERROR_EVENT) {
            let failure = ListenerFailure::new(event, id, &err);
            if let Err(e) = self.emit(ERROR_EVENT, &[failure.to_value()]) {
                warn!(event, listener = %id, error = %e, "error listener failed");
            }
            return;
        }

        warn!(
            event,
            listener = %id,
            error = %format!("{err:#}"),
            "listener failed with no error listener"
        );
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .listeners
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// 当前有监听器的事件名（字典序）
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().listeners.keys().cloned().collect();
        names.sort();
        names
    }

    /// 某事件的注册信息，按触发顺序排列
    pub fn listeners(&self, event: &str) -> Vec<ListenerInfo> {
        self.state
            .lock()
            .listeners
            .get(event)
            .map(|list| list.iter().map(Registration::info).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self, event: &str) -> Option<EventStats> {
        self.state.lock().stats.get(event).cloned()
    }

    pub fn all_stats(&self) -> BTreeMap<String, EventStats> {
        self.state
            .lock()
            .stats
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn reset_stats(&self) {
        for stats in self.state.lock().stats.values_mut() {
            stats.reset();
        }
    }
}

// 同步分发遇到异步监听器时交给当前运行时后台执行
fn spawn_detached(event: &str, id: ListenerId, fut: super::listener::ListenerFuture) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let event = event.to_string();
            handle.spawn(async move {
                if let Err(err) = fut.await {
                    warn!(
                        event = %event,
                        listener = %id,
                        error = %format!("{err:#}"),
                        "detached listener failed"
                    );
                }
            });
        }
        Err(_) => {
            warn!(event, listener = %id, "no tokio runtime; async listener skipped by emit");
        }
    }
}

fn describe_error_args(args: &[Value]) -> String {
    match args.first() {
        None => "no error payload".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(v) => match v.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => v.to_string(),
        },
    }
}
