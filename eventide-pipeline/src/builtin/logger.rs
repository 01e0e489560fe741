use crate::middleware::{Args, Middleware, Next};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{info, warn};

/// 记录每次经过管线的事件及其结果
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

#[async_trait]
impl Middleware for Logger {
    async fn handle(&self, event: &str, args: Args, next: Next) -> anyhow::Result<()> {
        info!(event, args = args.len(), "pipeline event received");
        let started = Instant::now();
        let result = next.run(args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => info!(event, elapsed_ms, "pipeline event handled"),
            Err(e) => warn!(event, elapsed_ms, error = %e, "pipeline event failed"),
        }
        result
    }
}
