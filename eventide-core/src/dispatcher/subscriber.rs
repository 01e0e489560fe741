use super::listener::{Listener, ListenerOptions};

/// 一条声明式订阅
#[derive(Debug, Clone)]
pub struct Subscription {
    pub event: String,
    pub listener: Listener,
    pub options: ListenerOptions,
    pub once: bool,
}

impl Subscription {
    pub fn on(event: impl Into<String>, listener: Listener) -> Self {
        Self {
            event: event.into(),
            listener,
            options: ListenerOptions::default(),
            once: false,
        }
    }

    pub fn once(event: impl Into<String>, listener: Listener) -> Self {
        Self {
            once: true,
            ..Self::on(event, listener)
        }
    }

    pub fn with_options(mut self, options: ListenerOptions) -> Self {
        self.options = options;
        self
    }
}

/// 订阅者：一次性声明自身关心的全部事件，由 `Dispatcher::subscribe` 注册
pub trait Subscriber {
    fn subscriptions(&self) -> Vec<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::sync::Arc;

    struct AuditTrail {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Subscriber for AuditTrail {
        fn subscriptions(&self) -> Vec<Subscription> {
            let created = self.seen.clone();
            let deleted = self.seen.clone();
            vec![
                Subscription::on(
                    "user.created",
                    Listener::from_fn(move |args| {
                        created.lock().push(format!("created:{}", args[0]));
                        Ok(Value::Null)
                    }),
                )
                .with_options(ListenerOptions::builder().namespace("audit").build()),
                Subscription::once(
                    "user.deleted",
                    Listener::from_fn(move |_| {
                        deleted.lock().push("deleted".into());
                        Ok(Value::Null)
                    }),
                ),
            ]
        }
    }

    #[test]
    fn subscribe_registers_every_subscription() {
        let d = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ids = d.subscribe(&AuditTrail { seen: seen.clone() });
        assert_eq!(ids.len(), 2);

        d.emit("user.created", &[json!(1)]).unwrap();
        d.emit("user.deleted", &[]).unwrap();
        d.emit("user.deleted", &[]).unwrap();
        assert_eq!(*seen.lock(), vec!["created:1", "deleted"]);

        assert_eq!(d.remove_listeners_by_namespace("audit"), 1);
        assert!(d.event_names().is_empty());
    }
}
