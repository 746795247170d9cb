use chrono::{DateTime, Utc};

/// A domain-agnostic notification event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - published **after** the underlying write has committed
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "stock.movement.recorded").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
