use eventide_core::typed::{EventKind, EventMap};
use eventide_macros::event_map;

#[event_map]
#[derive(Debug, Clone, PartialEq)]
enum BankEvent {
    Opened { id: String, owner: String },
    #[event(name = "bank.renamed")]
    Renamed { id: String, to: String },
}

fn main() {
    let event = BankEvent::Renamed {
        id: "b-1".into(),
        to: "savings".into(),
    };
    assert_eq!(event.kind(), BankEventKind::Renamed);
    assert_eq!(BankEventKind::Opened.name(), "BankEvent.Opened");
}
