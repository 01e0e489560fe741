use crate::middleware::{Args, Middleware, Next};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

pub type ErrorCallback = Arc<dyn Fn(&str, &anyhow::Error) + Send + Sync>;

/// 下游错误的处理策略
///
/// 缺省吞掉错误（记录日志后继续）；`rethrow` 时在回调之后原样向上抛出。
#[derive(Clone, Default)]
pub struct ErrorHandlerOptions {
    pub rethrow: bool,
    on_error: Option<ErrorCallback>,
}

impl ErrorHandlerOptions {
    pub fn rethrow(mut self) -> Self {
        self.rethrow = true;
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &anyhow::Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }
}

pub struct ErrorHandler {
    options: ErrorHandlerOptions,
}

impl ErrorHandler {
    pub fn new(options: ErrorHandlerOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Middleware for ErrorHandler {
    async fn handle(&self, event: &str, args: Args, next: Next) -> anyhow::Result<()> {
        let Err(e) = next.run(args).await else {
            return Ok(());
        };

        error!(event, error = %e, rethrow = self.options.rethrow, "pipeline error caught");
        if let Some(on_error) = &self.options.on_error {
            on_error(event, &e);
        }

        if self.options.rethrow { Err(e) } else { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::middleware::{FinalHandler, MiddlewareOptions};
    use crate::pipeline::MiddlewarePipeline;
    use parking_lot::Mutex;

    fn failing_handler() -> FinalHandler {
        FinalHandler::new(|_, _| async { Err::<(), _>(anyhow::anyhow!("disk full")) })
    }

    #[tokio::test]
    async fn swallows_and_reports() {
        let caught = Arc::new(Mutex::new(Vec::new()));
        let sink = caught.clone();
        let options = ErrorHandlerOptions::default()
            .on_error(move |event, e| sink.lock().push(format!("{event}: {e}")));

        let pipeline = MiddlewarePipeline::new();
        pipeline
            .use_middleware(Arc::new(ErrorHandler::new(options)), MiddlewareOptions::default())
            .unwrap();

        pipeline
            .execute("backup.run", vec![], Some(failing_handler()))
            .await
            .unwrap();
        assert_eq!(*caught.lock(), vec!["backup.run: disk full"]);
    }

    #[tokio::test]
    async fn rethrow_propagates_after_callback() {
        let calls = Arc::new(Mutex::new(0));
        let sink = calls.clone();
        let options = ErrorHandlerOptions::default()
            .rethrow()
            .on_error(move |_, _| *sink.lock() += 1);

        let pipeline = MiddlewarePipeline::new();
        pipeline
            .use_middleware(Arc::new(ErrorHandler::new(options)), MiddlewareOptions::default())
            .unwrap();

        let err = pipeline
            .execute("backup.run", vec![], Some(failing_handler()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Aborted { .. }));
        assert_eq!(*calls.lock(), 1);
    }
}
