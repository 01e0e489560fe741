//! 事件中间件管线（eventide-pipeline）
//!
//! 在事件到达分发器之前，按优先级串联一组中间件：
//! - 每个中间件以 `(event, args, next)` 调用，`next.run(args)` 继续、不调用即短路；
//! - 载荷显式沿链路传递，下游看到的总是上游交给 `next.run` 的那一份；
//! - 链路走完后交给 `FinalHandler`，通常是 `FinalHandler::dispatch_to(dispatcher)`。
//!
//! `builtin` 提供日志、性能、错误处理、限流、过滤、变换与去重缓存等常用中间件。
//!
pub mod builtin;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use middleware::{
    Args, FinalHandler, Middleware, MiddlewareFuture, MiddlewareInfo, MiddlewareOptions, Next,
    from_fn,
};
pub use pipeline::MiddlewarePipeline;
