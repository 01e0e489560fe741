use crate::middleware::{Args, Middleware, Next};
use async_trait::async_trait;
use bon::Builder;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// 去重缓存参数
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// 同一 (事件, 载荷) 在该时长内只放行一次
    #[builder(default = Duration::from_secs(60))]
    pub ttl: Duration,
    /// 超出后先清理过期项，仍超出则淘汰最早的项
    #[builder(default = 1000)]
    pub max_entries: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_entries: 1000,
        }
    }
}

/// TTL 去重：命中则短路；下游成功后才记入缓存
pub struct Cache {
    options: CacheOptions,
    seen: Mutex<HashMap<String, Instant>>,
}

impl Cache {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            options,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_fresh(&self, key: &str) -> bool {
        self.seen
            .lock()
            .get(key)
            .is_some_and(|at| at.elapsed() < self.options.ttl)
    }

    fn remember(&self, key: String) {
        let mut seen = self.seen.lock();
        seen.insert(key, Instant::now());
        if seen.len() <= self.options.max_entries {
            return;
        }

        let ttl = self.options.ttl;
        seen.retain(|_, at| at.elapsed() < ttl);

        let excess = seen.len().saturating_sub(self.options.max_entries);
        if excess > 0 {
            let mut by_age: Vec<(String, Instant)> =
                seen.iter().map(|(k, at)| (k.clone(), *at)).collect();
            by_age.sort_by_key(|(_, at)| *at);
            for (key, _) in by_age.into_iter().take(excess) {
                seen.remove(&key);
            }
        }
    }
}

#[async_trait]
impl Middleware for Cache {
    async fn handle(&self, event: &str, args: Args, next: Next) -> anyhow::Result<()> {
        let key = format!("{event}:{}", serde_json::to_string(&args)?);
        if self.is_fresh(&key) {
            debug!(event, "duplicate event served from cache");
            return Ok(());
        }

        next.run(args).await?;
        self.remember(key);
        Ok(())
    }
}
