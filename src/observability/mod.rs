//! Observability subsystem
//!
//! - Structured logging (JSON lines on stderr)
//! - Counter metrics
//! - Typed lifecycle events
//!
//! Observability is read-only: nothing here changes what a statement returns.
//!
//! # Usage
//!
//! ```ignore
//! use relcore::observability::{Logger, Event, MetricsRegistry};
//!
//! Logger::info(Event::SelectComplete, &[("rows", "2")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_statements_executed();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
