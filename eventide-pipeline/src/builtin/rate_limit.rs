use crate::middleware::{Args, Middleware, Next};
use async_trait::async_trait;
use bon::Builder;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// 固定窗口限流参数（按事件名分别计数）
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitOptions {
    /// 每个窗口允许通过的事件数
    #[builder(default = 100)]
    pub max_events: u32,
    #[builder(default = Duration::from_secs(1))]
    pub window: Duration,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            max_events: 100,
            window: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// 超出配额的事件被静默丢弃（不报错，不调用下游）
pub struct RateLimit {
    options: RateLimitOptions,
    windows: DashMap<String, Window>,
}

impl RateLimit {
    pub fn new(options: RateLimitOptions) -> Self {
        Self {
            options,
            windows: DashMap::new(),
        }
    }

    fn admit(&self, event: &str) -> bool {
        let now = Instant::now();
        let mut window = self
            .windows
            .entry(event.to_string())
            .or_insert_with(|| Window { started: now, count: 0 });

        if now.duration_since(window.started) >= self.options.window {
            window.started = now;
            window.count = 0;
        }
        if window.count < self.options.max_events {
            window.count += 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl Middleware for RateLimit {
    async fn handle(&self, event: &str, args: Args, next: Next) -> anyhow::Result<()> {
        if !self.admit(event) {
            debug!(event, max_events = self.options.max_events, "event dropped by rate limit");
            return Ok(());
        }
        next.run(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{FinalHandler, MiddlewareOptions};
    use crate::pipeline::MiddlewarePipeline;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn counting_handler(seen: &Arc<Mutex<Vec<String>>>) -> FinalHandler {
        let seen = seen.clone();
        FinalHandler::new(move |event, _| {
            let seen = seen.clone();
            async move {
                seen.lock().push(event);
                anyhow::Ok(())
            }
        })
    }

    #[tokio::test]
    async fn excess_events_are_swallowed_per_event() {
        let options = RateLimitOptions::builder()
            .max_events(2)
            .window(Duration::from_secs(60))
            .build();
        let pipeline = MiddlewarePipeline::new();
        pipeline
            .use_middleware(Arc::new(RateLimit::new(options)), MiddlewareOptions::default())
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            pipeline
                .execute("sms.send", vec![], Some(counting_handler(&seen)))
                .await
                .unwrap();
        }
        pipeline
            .execute("mail.send", vec![], Some(counting_handler(&seen)))
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec!["sms.send", "sms.send", "mail.send"]);
    }

    #[tokio::test]
    async fn window_resets() {
        let limiter = RateLimit::new(
            RateLimitOptions::builder()
                .max_events(1)
                .window(Duration::from_millis(10))
                .build(),
        );
        assert!(limiter.admit("tick"));
        assert!(!limiter.admit("tick"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(limiter.admit("tick"));
    }
}
