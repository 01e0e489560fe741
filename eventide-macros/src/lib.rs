use proc_macro::TokenStream;

mod event_map;
mod utils;

/// 事件表宏
///
/// 作用于枚举，每个变体即一种事件：
/// - 合并 `serde::Serialize` / `serde::Deserialize` 派生；
/// - 生成同可见性的 `<Enum>Kind` 种类枚举（`Copy`，可用 `kind = Ident` 改名）；
/// - 实现 `::eventide_core::typed::EventMap` 与 `::eventide_core::typed::EventKind`。
///
/// 事件名默认为 `"<Enum>.<Variant>"`；`prefix = "..."` 替换前缀，
/// 变体上的 `#[event(name = "...")]` 直接指定完整事件名。
///
/// ```ignore
/// #[event_map(prefix = "billing")]
/// enum BillingEvent {
///     Charged { invoice: String, cents: i64 },   // "billing.Charged"
///     #[event(name = "billing.refund_issued")]
///     Refunded(String),
///     Closed,
/// }
/// ```
#[proc_macro_attribute]
pub fn event_map(attr: TokenStream, item: TokenStream) -> TokenStream {
    event_map::expand(attr, item)
}
