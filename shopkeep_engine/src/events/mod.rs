//! Notifications published by the engine after a transaction commits.
//!
//! Each kind of event has its own bounded channel and handler (see [`EventHandler`]). Producers are cheap to clone and
//! are handed to the public APIs through [`EventProducers`]. Delivery is at-least-once from the receiver's point of
//! view, so every event carries an idempotency key.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler, DEFAULT_CONCURRENCY};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
