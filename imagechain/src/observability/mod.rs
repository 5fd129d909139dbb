//! Observability utilities.

mod tracing;
mod wide_events;

pub use self::tracing::{init_tracing, subscriber, SpanTimer, StageSpanAttributes, DEFAULT_FILTER};
pub use wide_events::WideEventEmitter;
