//! 内置中间件
//!
//! 均实现 `Middleware`，与自定义中间件一样通过 `use_middleware` 注册，
//! 同样受启用/禁用与标签管理约束。
//!
mod cache;
mod error_handler;
mod filter;
mod logger;
mod performance;
mod rate_limit;
mod transform;

pub use cache::{Cache, CacheOptions};
pub use error_handler::{ErrorCallback, ErrorHandler, ErrorHandlerOptions};
pub use filter::Filter;
pub use logger::Logger;
pub use performance::{Performance, PerformanceOptions, SlowCallback};
pub use rate_limit::{RateLimit, RateLimitOptions};
pub use transform::Transform;

use crate::middleware::{Args, Middleware};
use serde_json::Value;
use std::sync::Arc;

pub fn logger() -> Arc<dyn Middleware> {
    Arc::new(Logger)
}

pub fn performance(options: PerformanceOptions) -> Arc<dyn Middleware> {
    Arc::new(Performance::new(options))
}

pub fn error_handler(options: ErrorHandlerOptions) -> Arc<dyn Middleware> {
    Arc::new(ErrorHandler::new(options))
}

pub fn rate_limit(options: RateLimitOptions) -> Arc<dyn Middleware> {
    Arc::new(RateLimit::new(options))
}

/// 谓词为假时短路，不调用下游
pub fn filter<F>(predicate: F) -> Arc<dyn Middleware>
where
    F: Fn(&str, &[Value]) -> bool + Send + Sync + 'static,
{
    Arc::new(Filter::new(predicate))
}

/// 以映射后的载荷继续下游
pub fn transform<F>(mapper: F) -> Arc<dyn Middleware>
where
    F: Fn(&str, Args) -> Args + Send + Sync + 'static,
{
    Arc::new(Transform::new(mapper))
}

pub fn cache(options: CacheOptions) -> Arc<dyn Middleware> {
    Arc::new(Cache::new(options))
}
