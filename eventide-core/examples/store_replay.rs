/// 事件存储示例
/// 展示追加、查询、快照恢复与基于回放的状态重建
use anyhow::Result as AnyResult;
use eventide_core::dispatcher::{Listener, ListenerOptions};
use eventide_core::store::{
    EventQuery, EventRecord, EventStore, ExportFormat, OrderBy, SNAPSHOT_CREATED, SortField,
    StoreConfig,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;

fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .init();

    let store = EventStore::new(
        StoreConfig::builder()
            .snapshot_interval(3)
            .enable_compression(true)
            .build(),
    );
    store.notifications().on(
        SNAPSHOT_CREATED,
        Listener::from_fn(|args| {
            println!("snapshot created: {}", args[0]["name"]);
            Ok(Value::Null)
        }),
        ListenerOptions::default(),
    );

    store.store("deposit", json!({"account": "a", "amount": 100}), None)?;
    store.store("deposit", json!({"account": "b", "amount": 40}), None)?;
    store.store("withdraw", json!({"account": "a", "amount": 30}), None)?;
    store.store("deposit", json!({"account": "a", "amount": 5}), None)?;

    // 回放重建余额
    let mut balances: BTreeMap<String, i64> = BTreeMap::new();
    let mut apply = |record: &EventRecord| {
        let account = record.data["account"].as_str().unwrap_or_default().to_string();
        let amount = record.data["amount"].as_i64().unwrap_or_default();
        let sign = if record.event == "withdraw" { -1 } else { 1 };
        *balances.entry(account).or_default() += sign * amount;
    };
    let replayed = store.replay(&EventQuery::all(), Some(&mut apply));
    println!("replayed {} events -> {balances:?}", replayed.len());

    let deposits = store.query(
        &EventQuery::builder()
            .event("deposit")
            .order_by(OrderBy::desc(SortField::Sequence))
            .build(),
    );
    for record in &deposits {
        println!("#{} {} {}", record.sequence, record.event, record.data);
    }

    store.restore_snapshot("auto_3");
    println!("after restore: {} events, stats = {:?}", store.len(), store.stats());

    println!("{}", store.export(ExportFormat::Csv)?);
    Ok(())
}
