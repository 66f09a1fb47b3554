//! Observability subsystem
//!
//! This module provides:
//! - Structured logging (JSON, one line per event)
//! - Typed events
//! - Engine counters
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```
//! use timelink::observability::{EngineMetrics, Event, Logger, Severity};
//!
//! Logger::info(Event::ConfigLoaded, &[("past_end", "append")]);
//!
//! let metrics = EngineMetrics::new();
//! metrics.increment_splits();
//! assert_eq!(metrics.snapshot().splits, 1);
//! assert!(!Logger::enabled(Severity::Trace));
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{EngineMetrics, MetricsSnapshot};
