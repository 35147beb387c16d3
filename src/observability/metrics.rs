//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one engine
///
/// All counters use Relaxed atomics; readers only need eventual totals.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    statements_executed: AtomicU64,
    statements_failed: AtomicU64,
    rows_returned: AtomicU64,
    full_scans: AtomicU64,
    index_scans: AtomicU64,
    unique_conflicts: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_statements_executed(&self) {
        self.statements_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_statements_failed(&self) {
        self.statements_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_returned(&self, rows: u64) {
        self.rows_returned.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn increment_full_scans(&self) {
        self.full_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_index_scans(&self) {
        self.index_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unique_conflicts(&self) {
        self.unique_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            statements_executed: self.statements_executed.load(Ordering::Relaxed),
            statements_failed: self.statements_failed.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            full_scans: self.full_scans.load(Ordering::Relaxed),
            index_scans: self.index_scans.load(Ordering::Relaxed),
            unique_conflicts: self.unique_conflicts.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
        }
    }

    /// Snapshot rendered as one JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub statements_executed: u64,
    pub statements_failed: u64,
    pub rows_returned: u64,
    pub full_scans: u64,
    pub index_scans: u64,
    pub unique_conflicts: u64,
    pub commits: u64,
    pub rollbacks: u64,
}
