/// 类型化事件示例
/// 用 `#[event_map]` 定义事件表，通过 `TypedDispatcher` 注册与分发
use anyhow::Result as AnyResult;
use eventide_core::dispatcher::{Dispatcher, ListenerOptions};
use eventide_core::typed::{EventKind, TypedDispatcher};
use eventide_macros::event_map;
use std::sync::Arc;
use std::time::Duration;

#[event_map]
#[derive(Debug, Clone)]
enum ShipmentEvent {
    Dispatched { shipment_id: String, carrier: String },
    #[event(name = "shipment.delivered")]
    Delivered { shipment_id: String },
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .init();

    let typed = TypedDispatcher::<ShipmentEvent>::new(Arc::new(Dispatcher::new()));
    for kind in ShipmentEventKind::ALL {
        println!("known event: {}", kind.name());
    }

    typed.on(
        ShipmentEventKind::Dispatched,
        |event| {
            println!("dispatched: {event:?}");
            Ok(())
        },
        ListenerOptions::with_priority(10),
    );
    typed.on_async(
        ShipmentEventKind::Delivered,
        |event| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            println!("delivered (async): {event:?}");
            anyhow::Ok(())
        },
        ListenerOptions::default(),
    );

    typed.emit(ShipmentEvent::Dispatched {
        shipment_id: "s-1".into(),
        carrier: "dhl".into(),
    })?;

    let waiter = {
        let typed = typed.clone();
        tokio::spawn(async move {
            typed
                .wait_for(ShipmentEventKind::Delivered, Some(Duration::from_secs(1)))
                .await
        })
    };
    while typed.listener_count(ShipmentEventKind::Delivered) < 2 {
        tokio::task::yield_now().await;
    }

    typed
        .emit_async(ShipmentEvent::Delivered {
            shipment_id: "s-1".into(),
        })
        .await?;
    println!("waiter saw: {:?}", waiter.await??);
    Ok(())
}
