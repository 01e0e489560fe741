//! 示例：中间件管线 + 分发器
//!
//! 演示：
//! 1) 注册内置中间件（日志、性能、限流、去重）与一个自定义审计中间件；
//! 2) 以 `FinalHandler::dispatch_to` 把管线末端接到 `Dispatcher`；
//! 3) 按标签禁用中间件，并查看统计。
//!
//! 运行：
//! cargo run -p eventide-pipeline --example pipeline_dispatch
//!
use eventide_core::dispatcher::{Dispatcher, Listener, ListenerOptions};
use eventide_pipeline::builtin::{self, CacheOptions, PerformanceOptions, RateLimitOptions};
use eventide_pipeline::{FinalHandler, MiddlewareOptions, MiddlewarePipeline, from_fn};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .init();

    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.on(
        "user.login",
        Listener::from_fn(|args| {
            info!(payload = ?args, "login delivered");
            Ok(Value::Null)
        }),
        ListenerOptions::default(),
    );

    let pipeline = MiddlewarePipeline::new();
    pipeline.use_middleware(builtin::logger(), MiddlewareOptions::named("logger", 100))?;
    pipeline.use_middleware(
        builtin::performance(
            PerformanceOptions::with_threshold(Duration::from_millis(50))
                .on_slow(|event, elapsed| info!(event, ?elapsed, "slow event")),
        ),
        MiddlewareOptions::named("performance", 90),
    )?;
    pipeline.use_middleware(
        builtin::rate_limit(
            RateLimitOptions::builder()
                .max_events(3)
                .window(Duration::from_secs(1))
                .build(),
        ),
        MiddlewareOptions::named("rate_limit", 50),
    )?;
    pipeline.use_middleware(
        builtin::cache(CacheOptions::builder().ttl(Duration::from_secs(5)).build()),
        MiddlewareOptions::named("dedupe", 10),
    )?;
    pipeline.use_middleware(
        from_fn(|_event, mut args, next| {
            args.push(json!({ "audited_at": chrono::Utc::now().to_rfc3339() }));
            next.run(args)
        }),
        MiddlewareOptions::builder()
            .name("audit")
            .tags(vec!["audit".to_string()])
            .build(),
    )?;

    let terminal = FinalHandler::dispatch_to(dispatcher.clone());
    for user in ["ana", "ana", "bo", "cy", "dee"] {
        pipeline
            .execute("user.login", vec![json!({ "user": user })], Some(terminal.clone()))
            .await?;
    }

    let disabled = pipeline.disable_by_tag("audit");
    info!(disabled, "audit middleware disabled");
    pipeline
        .execute("user.login", vec![json!({ "user": "eve" })], Some(terminal))
        .await?;

    for m in pipeline.list() {
        info!(
            name = %m.name,
            priority = m.priority,
            enabled = m.enabled,
            calls = m.call_count,
            elapsed = ?m.total_execution_time,
            "middleware stats"
        );
    }

    Ok(())
}
