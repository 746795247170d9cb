//! Internal notification events.
//!
//! The bus here is an observer mechanism: services publish a fact after it
//! has been committed to storage, and interested consumers (projections,
//! alerting, anomaly detection) react to it. Stored state is never derived
//! from these messages; the movement ledger remains the source of truth, so
//! a lost or duplicated notification is harmless.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{BusError, EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
