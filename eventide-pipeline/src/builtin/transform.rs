use crate::middleware::{Args, Middleware, Next};
use async_trait::async_trait;

pub struct Transform<F> {
    mapper: F,
}

impl<F> Transform<F>
where
    F: Fn(&str, Args) -> Args + Send + Sync + 'static,
{
    pub fn new(mapper: F) -> Self {
        Self { mapper }
    }
}

#[async_trait]
impl<F> Middleware for Transform<F>
where
    F: Fn(&str, Args) -> Args + Send + Sync + 'static,
{
    async fn handle(&self, event: &str, args: Args, next: Next) -> anyhow::Result<()> {
        let args = (self.mapper)(event, args);
        next.run(args).await
    }
}

#[cfg(test)]
mod tests {
    use crate::builtin::transform;
    use crate::middleware::{FinalHandler, MiddlewareOptions};
    use crate::pipeline::MiddlewarePipeline;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::sync::Arc;

    #[tokio::test]
    async fn mapped_payload_reaches_later_stages() {
        let pipeline = MiddlewarePipeline::new();
        pipeline
            .use_middleware(
                transform(|event, mut args| {
                    if let Some(Value::Object(map)) = args.first_mut() {
                        map.insert("source".into(), json!(event));
                    }
                    args
                }),
                MiddlewareOptions::named("stamp", 10),
            )
            .unwrap();
        pipeline
            .use_middleware(
                transform(|_, args| args.into_iter().rev().collect()),
                MiddlewareOptions::named("reverse", 0),
            )
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = FinalHandler::new(move |_, args| {
            let sink = sink.clone();
            async move {
                *sink.lock() = args;
                anyhow::Ok(())
            }
        });

        pipeline
            .execute("user.login", vec![json!({"user": "a"}), json!(2)], Some(handler))
            .await
            .unwrap();
        assert_eq!(
            *seen.lock(),
            vec![json!(2), json!({"user": "a", "source": "user.login"})]
        );
    }
}
