//! In-memory storage backend.
//!
//! [`InMemoryStore`] implements every capability trait the domain crates
//! consume (articles, stock, client orders, supplier orders, sales) over
//! one shared, concurrently accessible state. It is the reference backend
//! for tests and development; a database-backed store would implement the
//! same traits.

pub mod in_memory;

pub use in_memory::InMemoryStore;
