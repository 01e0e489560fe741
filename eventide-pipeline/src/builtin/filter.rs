use crate::middleware::{Args, Middleware, Next};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

pub struct Filter<F> {
    predicate: F,
}

impl<F> Filter<F>
where
    F: Fn(&str, &[Value]) -> bool + Send + Sync + 'static,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<F> Middleware for Filter<F>
where
    F: Fn(&str, &[Value]) -> bool + Send + Sync + 'static,
{
    async fn handle(&self, event: &str, args: Args, next: Next) -> anyhow::Result<()> {
        if !(self.predicate)(event, &args) {
            debug!(event, "event filtered out");
            return Ok(());
        }
        next.run(args).await
    }
}

#[cfg(test)]
mod tests {
    use crate::builtin::filter;
    use crate::middleware::{FinalHandler, MiddlewareOptions};
    use crate::pipeline::MiddlewarePipeline;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn predicate_gates_downstream() {
        let pipeline = MiddlewarePipeline::new();
        pipeline
            .use_middleware(
                filter(|_, args| args.first().and_then(|v| v["amount"].as_i64()).unwrap_or(0) > 0),
                MiddlewareOptions::default(),
            )
            .unwrap();

        let seen = Arc::new(Mutex::new(0));
        let sink = seen.clone();
        let handler = FinalHandler::new(move |_, _| {
            let sink = sink.clone();
            async move {
                *sink.lock() += 1;
                anyhow::Ok(())
            }
        });

        for amount in [10, 0, -5, 3] {
            pipeline
                .execute("payment", vec![json!({ "amount": amount })], Some(handler.clone()))
                .await
                .unwrap();
        }
        assert_eq!(*seen.lock(), 2);
    }
}
