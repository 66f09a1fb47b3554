//! Engine metrics
//!
//! - Counters only
//! - Monotonic increase
//! - Owned by one structure, reset only by building a new one

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters of one arena and the structure driving it.
///
/// All counters use Relaxed atomics so a shared reference can read them
/// while the owner holds no lock.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Edits appended to a node log
    log_appends: AtomicU64,
    /// Nodes replaced by a folded copy
    splits: AtomicU64,
    /// Referencer rewrites issued by splits
    pointer_rewrites: AtomicU64,
    /// Nodes allocated by clients
    nodes_allocated: AtomicU64,
    /// Mutating operations committed
    operations: AtomicU64,
    /// Mutating operations rejected
    operations_rejected: AtomicU64,
}

impl EngineMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_log_appends(&self) {
        self.log_appends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_splits(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pointer_rewrites(&self) {
        self.pointer_rewrites.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_nodes_allocated(&self) {
        self.nodes_allocated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_operations(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_operations_rejected(&self) {
        self.operations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Splits performed so far
    pub fn splits(&self) -> u64 {
        self.splits.load(Ordering::Relaxed)
    }

    /// Current values of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            log_appends: self.log_appends.load(Ordering::Relaxed),
            splits: self.splits.load(Ordering::Relaxed),
            pointer_rewrites: self.pointer_rewrites.load(Ordering::Relaxed),
            nodes_allocated: self.nodes_allocated.load(Ordering::Relaxed),
            operations: self.operations.load(Ordering::Relaxed),
            operations_rejected: self.operations_rejected.load(Ordering::Relaxed),
        }
    }

    /// Current values as one JSON object
    pub fn to_json(&self) -> String {
        // a struct of u64 fields always serializes
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub log_appends: u64,
    pub splits: u64,
    pub pointer_rewrites: u64,
    pub nodes_allocated: u64,
    pub operations: u64,
    pub operations_rejected: u64,
}

impl MetricsSnapshot {
    /// Extra nodes created per committed operation.
    ///
    /// Stays bounded by a constant when the in-degree bound holds.
    pub fn splits_per_operation(&self) -> f64 {
        if self.operations == 0 {
            0.0
        } else {
            self.splits as f64 / self.operations as f64
        }
    }
}
