//! Event Bus (C9): in-process pub/sub for state changes, consumed by
//! WebSocket fan-out and the TUI (spec.md §4.9).

pub mod bus;
pub mod event;

pub use bus::{EventBus, Subscription};
pub use event::Event;
