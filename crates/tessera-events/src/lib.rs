//! Tessera Events
//!
//! Asynchronous delivery of link, credential and proof transitions to
//! whoever is waiting on them. Callers either subscribe to the live stream
//! or wait for the first event matching a predicate, including events that
//! were published before they started waiting.

pub mod bus;
pub mod error;
pub mod event;

pub use bus::EventBus;
pub use error::EventError;
pub use event::{Event, EventRecord};
