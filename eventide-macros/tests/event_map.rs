use anyhow::Result as AnyResult;
use eventide_core::dispatcher::{Dispatcher, ListenerOptions};
use eventide_core::typed::{EventKind, EventMap, TypedDispatcher};
use eventide_macros::event_map;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[event_map]
#[derive(Debug, Clone, PartialEq)]
enum InventoryEvent {
    Restocked { sku: String, quantity: u32 },
    #[event(name = "inventory.depleted")]
    Depleted { sku: String },
    Audited,
}

#[event_map(prefix = "cart")]
#[derive(Debug, Clone, PartialEq)]
enum CartEvent {
    ItemAdded(String),
    CheckedOut { total_cents: i64 },
}

#[test]
fn names_follow_defaults_and_overrides() {
    let names: Vec<&str> = InventoryEventKind::ALL.iter().map(|k| k.name()).collect();
    assert_eq!(
        names,
        vec!["InventoryEvent.Restocked", "inventory.depleted", "InventoryEvent.Audited"]
    );
    assert_eq!(CartEventKind::ItemAdded.name(), "cart.ItemAdded");

    let kinds: HashSet<CartEventKind> = CartEventKind::ALL.iter().copied().collect();
    assert_eq!(kinds.len(), 2);
}

#[test]
fn kind_matches_every_variant_shape() {
    assert_eq!(InventoryEvent::Audited.kind(), InventoryEventKind::Audited);
    assert_eq!(
        CartEvent::ItemAdded("sku-1".into()).kind(),
        CartEventKind::ItemAdded
    );
    assert_eq!(
        CartEvent::CheckedOut { total_cents: 10 }.name(),
        "cart.CheckedOut"
    );
}

#[test]
fn serde_derives_are_added() -> AnyResult<()> {
    let event = InventoryEvent::Restocked {
        sku: "sku-9".into(),
        quantity: 3,
    };
    let value = serde_json::to_value(&event)?;
    assert_eq!(value, json!({"Restocked": {"sku": "sku-9", "quantity": 3}}));
    assert_eq!(serde_json::from_value::<InventoryEvent>(value)?, event);
    Ok(())
}

#[test]
fn typed_dispatcher_only_delivers_matching_kind() -> AnyResult<()> {
    let typed = TypedDispatcher::<InventoryEvent>::new(Arc::new(Dispatcher::new()));
    let depleted = Arc::new(Mutex::new(Vec::new()));
    let sink = depleted.clone();
    typed.on(
        InventoryEventKind::Depleted,
        move |event| {
            if let InventoryEvent::Depleted { sku } = event {
                sink.lock().unwrap().push(sku);
            }
            Ok(())
        },
        ListenerOptions::default(),
    );

    assert!(!typed.emit(InventoryEvent::Audited)?);
    assert!(typed.emit(InventoryEvent::Depleted { sku: "sku-1".into() })?);
    assert_eq!(*depleted.lock().unwrap(), vec!["sku-1".to_string()]);
    Ok(())
}
