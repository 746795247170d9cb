//! Stock movement ledger and the one service allowed to mutate stock.
//!
//! Every change to an article's on-hand quantity flows through
//! [`StockMutationService::apply_movement`], which pairs the counter update
//! with an append-only [`MovementEntry`] in a single atomic commit. The
//! ledger is the source of truth for reconciliation: at any point, the
//! signed sum of an article's movements equals its on-hand quantity.

pub mod movement;
pub mod service;
pub mod store;

pub use movement::{MovementEntry, MovementKind, MovementSource};
pub use service::{Reconciliation, StockMovementRecorded, StockMutationService};
pub use store::StockStore;
