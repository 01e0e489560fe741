use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::middleware::{
    Args, Entry, FinalHandler, Middleware, MiddlewareInfo, MiddlewareOptions, Next,
};
use eventide_core::typed::EventMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// 中间件管线
///
/// - 注册时按优先级降序稳定排序，执行时不再排序；
/// - 每次 `execute` 只取已启用的中间件组成链路，禁用项完全不参与；
/// - 任一中间件（或终端处理器）返回错误即中止剩余链路，并以 `PipelineError::Aborted` 返回。
pub struct MiddlewarePipeline {
    config: PipelineConfig,
    entries: RwLock<Vec<Arc<Entry>>>,
}

impl Default for MiddlewarePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// 注册中间件，返回最终名称；重名时拒绝
    pub fn use_middleware(
        &self,
        middleware: Arc<dyn Middleware>,
        options: MiddlewareOptions,
    ) -> PipelineResult<String> {
        let mut entries = self.entries.write();

        let name = match options.name.clone() {
            Some(name) => {
                if entries.iter().any(|e| e.name == name) {
                    return Err(PipelineError::AlreadyRegistered { name });
                }
                name
            }
            None => {
                let mut index = entries.len();
                loop {
                    let candidate = format!("middleware_{index}");
                    if !entries.iter().any(|e| e.name == candidate) {
                        break candidate;
                    }
                    index += 1;
                }
            }
        };

        let priority = options.priority;
        entries.push(Arc::new(Entry::new(name.clone(), middleware, options)));
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));

        debug!(middleware = %name, priority, "middleware registered");
        Ok(name)
    }

    /// 执行链路；`final_handler` 在链路走完后以最终载荷调用
    pub async fn execute(
        &self,
        event: &str,
        args: Args,
        final_handler: Option<FinalHandler>,
    ) -> PipelineResult<()> {
        let chain: Arc<[Arc<Entry>]> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.is_enabled())
            .cloned()
            .collect();

        Next::start(event, chain, final_handler, self.config.enable_stats)
            .run(args)
            .await
            .map_err(|source| PipelineError::Aborted {
                event: event.to_string(),
                source,
            })
    }

    /// 以类型化事件执行：事件名取自其种类，载荷为序列化后的事件本身
    pub async fn execute_typed<M: EventMap>(
        &self,
        event: &M,
        final_handler: Option<FinalHandler>,
    ) -> PipelineResult<()> {
        let payload = serde_json::to_value(event).map_err(eventide_core::EventError::from)?;
        self.execute(event.name(), vec![payload], final_handler).await
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.name != name);
        entries.len() != before
    }

    /// 按实例移除（比较数据指针）
    pub fn remove_middleware(&self, middleware: &Arc<dyn Middleware>) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| !std::ptr::addr_eq(Arc::as_ptr(&e.middleware), Arc::as_ptr(middleware)));
        entries.len() != before
    }

    pub fn enable(&self, name: &str) -> bool {
        self.toggle(name, true)
    }

    pub fn disable(&self, name: &str) -> bool {
        self.toggle(name, false)
    }

    fn toggle(&self, name: &str, enabled: bool) -> bool {
        match self.entries.read().iter().find(|e| e.name == name) {
            Some(entry) => {
                entry.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    pub fn enable_by_tag(&self, tag: &str) -> usize {
        self.toggle_by_tag(tag, true)
    }

    pub fn disable_by_tag(&self, tag: &str) -> usize {
        self.toggle_by_tag(tag, false)
    }

    fn toggle_by_tag(&self, tag: &str, enabled: bool) -> usize {
        let entries = self.entries.read();
        let mut touched = 0;
        for entry in entries.iter().filter(|e| e.tags.iter().any(|t| t == tag)) {
            entry.set_enabled(enabled);
            touched += 1;
        }
        touched
    }

    /// 当前注册（按执行顺序）
    pub fn list(&self) -> Vec<MiddlewareInfo> {
        self.entries.read().iter().map(|e| e.info()).collect()
    }

    pub fn stats(&self, name: &str) -> Option<MiddlewareInfo> {
        self.entries
            .read()
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.info())
    }

    pub fn reset_stats(&self) {
        for entry in self.entries.read().iter() {
            entry.reset_stats();
        }
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::from_fn;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    fn tracer(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<dyn Middleware> {
        let log = log.clone();
        from_fn(move |_event, args, next| {
            let log = log.clone();
            async move {
                log.lock().push(format!("{tag}:in"));
                next.run(args).await?;
                log.lock().push(format!("{tag}:out"));
                anyhow::Ok(())
            }
        })
    }

    fn recording_handler(seen: &Arc<Mutex<Vec<Args>>>) -> FinalHandler {
        let seen = seen.clone();
        FinalHandler::new(move |_event, args| {
            let seen = seen.clone();
            async move {
                seen.lock().push(args);
                anyhow::Ok(())
            }
        })
    }

    #[tokio::test]
    async fn onion_order_follows_priority() {
        let pipeline = MiddlewarePipeline::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        pipeline
            .use_middleware(tracer(&log, "low"), MiddlewareOptions::named("low", 1))
            .unwrap();
        pipeline
            .use_middleware(tracer(&log, "high"), MiddlewareOptions::named("high", 10))
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        pipeline
            .execute("e", vec![json!(1)], Some(recording_handler(&seen)))
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["high:in", "low:in", "low:out", "high:out"]);
        assert_eq!(*seen.lock(), vec![vec![json!(1)]]);
    }

    #[tokio::test]
    async fn disabled_middleware_is_excluded() {
        let pipeline = MiddlewarePipeline::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = pipeline
            .use_middleware(tracer(&log, "mwA"), MiddlewareOptions::builder().priority(10).build())
            .unwrap();
        pipeline
            .use_middleware(tracer(&log, "mwB"), MiddlewareOptions::builder().priority(5).build())
            .unwrap();
        assert_eq!(a, "middleware_0");

        assert!(pipeline.disable(&a));
        let seen = Arc::new(Mutex::new(Vec::new()));
        pipeline
            .execute("e", vec![], Some(recording_handler(&seen)))
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["mwB:in", "mwB:out"]);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(pipeline.stats(&a).unwrap().call_count, 0);
    }

    #[tokio::test]
    async fn short_circuit_skips_downstream() {
        let pipeline = MiddlewarePipeline::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        pipeline
            .use_middleware(
                from_fn(|_, _, _| async { anyhow::Ok(()) }),
                MiddlewareOptions::named("stop", 10),
            )
            .unwrap();
        pipeline
            .use_middleware(tracer(&log, "inner"), MiddlewareOptions::default())
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        pipeline
            .execute("e", vec![], Some(recording_handler(&seen)))
            .await
            .unwrap();
        assert!(log.lock().is_empty());
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn replacement_payload_is_threaded_downstream() {
        let pipeline = MiddlewarePipeline::new();
        pipeline
            .use_middleware(
                from_fn(|_, mut args, next| {
                    args.push(json!("stamped"));
                    next.run(args)
                }),
                MiddlewareOptions::default(),
            )
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        pipeline
            .execute("e", vec![json!(1)], Some(recording_handler(&seen)))
            .await
            .unwrap();
        assert_eq!(seen.lock()[0], vec![json!(1), json!("stamped")]);
    }

    #[tokio::test]
    async fn error_aborts_chain_and_propagates() {
        let pipeline = MiddlewarePipeline::new();
        pipeline
            .use_middleware(
                from_fn(|_, _, _| async { Err::<(), _>(anyhow::anyhow!("rejected")) }),
                MiddlewareOptions::named("guard", 1),
            )
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let err = pipeline
            .execute("order.placed", vec![], Some(recording_handler(&seen)))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "pipeline aborted: event=order.placed, reason=rejected"
        );
        assert!(seen.lock().is_empty());
        assert_eq!(pipeline.stats("guard").unwrap().call_count, 1);
    }

    #[test]
    fn duplicate_names_and_generated_names() {
        let pipeline = MiddlewarePipeline::new();
        let noop = || from_fn(|_, args, next| next.run(args));

        pipeline
            .use_middleware(noop(), MiddlewareOptions::named("middleware_1", 0))
            .unwrap();
        let err = pipeline
            .use_middleware(noop(), MiddlewareOptions::named("middleware_1", 0))
            .unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyRegistered { .. }));

        // 位置 1 已被占用，顺延
        assert_eq!(
            pipeline.use_middleware(noop(), MiddlewareOptions::default()).unwrap(),
            "middleware_2"
        );
        assert_eq!(pipeline.len(), 2);
    }

    #[tokio::test]
    async fn management_by_tag_and_instance() {
        let pipeline = MiddlewarePipeline::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let audit = tracer(&log, "audit");
        let tagged = |name: &str| {
            MiddlewareOptions::builder()
                .name(name)
                .tags(vec!["audit".to_string()])
                .build()
        };
        pipeline.use_middleware(audit.clone(), tagged("a1")).unwrap();
        pipeline.use_middleware(tracer(&log, "other"), tagged("a2")).unwrap();

        assert_eq!(pipeline.disable_by_tag("audit"), 2);
        pipeline.execute("e", vec![], None).await.unwrap();
        assert!(log.lock().is_empty());

        assert_eq!(pipeline.enable_by_tag("audit"), 2);
        assert!(pipeline.remove_middleware(&audit));
        assert!(!pipeline.remove_middleware(&audit));
        pipeline.execute("e", vec![], None).await.unwrap();
        assert_eq!(*log.lock(), vec!["other:in", "other:out"]);

        let info = pipeline.list();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].call_count, 1);
        pipeline.reset_stats();
        assert_eq!(pipeline.stats("a2").unwrap().call_count, 0);

        assert!(pipeline.remove("a2"));
        assert!(!pipeline.enable("a2"));
        pipeline.clear();
        assert!(pipeline.is_empty());
    }

    #[tokio::test]
    async fn stats_nest_and_can_be_disabled() {
        let pipeline = MiddlewarePipeline::new();
        pipeline
            .use_middleware(
                from_fn(|_, args, next| next.run(args)),
                MiddlewareOptions::named("outer", 10),
            )
            .unwrap();
        pipeline
            .use_middleware(
                from_fn(|_, _, _| async {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    anyhow::Ok(())
                }),
                MiddlewareOptions::named("inner", 0),
            )
            .unwrap();

        pipeline.execute("e", vec![], None).await.unwrap();
        let outer = pipeline.stats("outer").unwrap();
        let inner = pipeline.stats("inner").unwrap();
        assert!(outer.total_execution_time >= inner.total_execution_time);
        assert!(inner.last_called_at.is_some());

        let quiet =
            MiddlewarePipeline::with_config(PipelineConfig::builder().enable_stats(false).build());
        quiet
            .use_middleware(
                from_fn(|_, args, next| next.run(args)),
                MiddlewareOptions::named("m", 0),
            )
            .unwrap();
        quiet.execute("e", vec![Value::Null], None).await.unwrap();
        assert_eq!(quiet.stats("m").unwrap().call_count, 0);
    }
}
