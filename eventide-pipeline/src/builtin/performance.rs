use crate::middleware::{Args, Middleware, Next};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

pub type SlowCallback = Arc<dyn Fn(&str, Duration) + Send + Sync>;

/// 慢事件阈值报告
#[derive(Clone)]
pub struct PerformanceOptions {
    pub threshold: Duration,
    on_slow: Option<SlowCallback>,
}

impl Default for PerformanceOptions {
    fn default() -> Self {
        Self {
            threshold: Duration::from_millis(100),
            on_slow: None,
        }
    }
}

impl PerformanceOptions {
    pub fn with_threshold(threshold: Duration) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    /// 超过阈值时额外回调（事件名、耗时）
    pub fn on_slow<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.on_slow = Some(Arc::new(f));
        self
    }
}

pub struct Performance {
    options: PerformanceOptions,
}

impl Performance {
    pub fn new(options: PerformanceOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Middleware for Performance {
    async fn handle(&self, event: &str, args: Args, next: Next) -> anyhow::Result<()> {
        let started = Instant::now();
        let result = next.run(args).await;
        let elapsed = started.elapsed();

        if elapsed >= self.options.threshold {
            warn!(
                event,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.options.threshold.as_millis() as u64,
                "slow pipeline event"
            );
            if let Some(on_slow) = &self.options.on_slow {
                on_slow(event, elapsed);
            }
        }
        result
    }
}
