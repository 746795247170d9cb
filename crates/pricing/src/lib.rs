//! Pricing engine.
//!
//! Pure arithmetic for tax-inclusive prices and line totals. No IO, no
//! storage, no side effects; callers validate sign constraints on their own
//! entities before calling in.

pub mod engine;

pub use engine::{line_total, ttc};
