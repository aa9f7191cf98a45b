//! Bounded historical metrics store
//!
//! Snapshots arrive whenever fresh performance or business data lands from
//! a collaborator. The store keeps insertion order, evicts the oldest entry
//! past capacity, and tolerates malformed numeric fields by dropping them
//! rather than failing the append.

use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Canonical metric names used across the platform
pub mod metric {
    pub const LCP: &str = "lcp";
    pub const CLS: &str = "cls";
    pub const BUNDLE_SIZE: &str = "bundle_size";
    pub const BOUNCE_RATE: &str = "bounce_rate";
    pub const CONVERSION_EVENTS: &str = "conversion_events";
    pub const SESSION_DURATION: &str = "session_duration";
}

/// A timestamped set of named metric readings
///
/// Only finite values are admitted; a NaN or infinite reading means the
/// metric is simply absent from this snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub recorded_at: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

impl MetricSnapshot {
    pub fn new(recorded_at: DateTime<Utc>) -> Self {
        Self {
            recorded_at,
            values: BTreeMap::new(),
        }
    }

    /// Adds a reading, ignoring non-finite values
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set_metric(name, value);
        self
    }

    /// Adds a reading in place, ignoring non-finite values
    pub fn set_metric(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        if value.is_finite() {
            self.values.insert(name, value);
        } else {
            debug!(metric = %name, "dropping non-finite metric value");
        }
    }

    /// Reading for a metric, if present in this snapshot
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// Default number of snapshots retained
pub const DEFAULT_CAPACITY: usize = 500;

/// Append-only, capacity-bounded sequence of metric snapshots
#[derive(Debug)]
pub struct MetricsStore {
    snapshots: RwLock<VecDeque<MetricSnapshot>>,
    capacity: usize,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MetricsStore {
    /// Creates a store retaining at most `capacity` snapshots
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Appends a snapshot, evicting the oldest once capacity is exceeded.
    ///
    /// Never fails: malformed values were already dropped at snapshot
    /// construction, and eviction is silent.
    pub fn append(&self, snapshot: MetricSnapshot) {
        let mut snapshots = self.snapshots.write().unwrap();
        if snapshots.len() == self.capacity {
            snapshots.pop_front();
        }
        snapshots.push_back(snapshot);
    }

    /// All retained snapshots, oldest first.
    ///
    /// Stable between appends: two consecutive calls see the same data.
    pub fn snapshots(&self) -> Vec<MetricSnapshot> {
        self.snapshots.read().unwrap().iter().cloned().collect()
    }

    /// Most recent snapshot, if any
    pub fn latest(&self) -> Option<MetricSnapshot> {
        self.snapshots.read().unwrap().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(name: &str, value: f64) -> MetricSnapshot {
        MetricSnapshot::new(Utc::now()).with_metric(name, value)
    }

    #[test]
    fn test_non_finite_values_are_dropped_not_errors() {
        let snapshot = MetricSnapshot::new(Utc::now())
            .with_metric(metric::LCP, 2400.0)
            .with_metric(metric::CLS, f64::NAN)
            .with_metric(metric::BOUNCE_RATE, f64::INFINITY);

        assert_eq!(snapshot.get(metric::LCP), Some(2400.0));
        assert_eq!(snapshot.get(metric::CLS), None);
        assert_eq!(snapshot.get(metric::BOUNCE_RATE), None);

        let store = MetricsStore::default();
        store.append(snapshot);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let store = MetricsStore::new(3);
        for i in 0..5 {
            store.append(snapshot_with(metric::LCP, i as f64));
        }

        let snapshots = store.snapshots();
        assert_eq!(snapshots.len(), 3);
        let values: Vec<f64> = snapshots
            .iter()
            .map(|s| s.get(metric::LCP).unwrap())
            .collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_snapshots_are_stable_between_appends() {
        let store = MetricsStore::default();
        store.append(snapshot_with(metric::LCP, 1.0));
        store.append(snapshot_with(metric::LCP, 2.0));

        let first = store.snapshots();
        let second = store.snapshots();
        assert_eq!(first, second);

        store.append(snapshot_with(metric::LCP, 3.0));
        assert_eq!(store.snapshots().len(), 3);
    }

    #[test]
    fn test_latest_returns_newest() {
        let store = MetricsStore::default();
        assert!(store.latest().is_none());

        store.append(snapshot_with(metric::LCP, 1.0));
        store.append(snapshot_with(metric::LCP, 2.0));
        assert_eq!(store.latest().unwrap().get(metric::LCP), Some(2.0));
    }
}
