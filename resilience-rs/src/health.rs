//! Per-operation health records
//!
//! The execution wrapper records the outcome of every attempt here. The
//! records are for reporting only; nothing reads them to gate execution.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Whether the most recent execution was served by the primary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Healthy,
    Degraded,
}

/// Health record for a single named operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHealth {
    pub consecutive_failures: u32,
    pub last_status: OperationStatus,
    pub last_error: Option<String>,
}

impl Default for OperationHealth {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            last_status: OperationStatus::Healthy,
            last_error: None,
        }
    }
}

/// Registry of operation health records, shared across the process
///
/// Constructed by the embedder and injected wherever it is needed; there is
/// no global instance.
#[derive(Debug, Default)]
pub struct HealthRegistry {
    records: RwLock<HashMap<String, OperationHealth>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful primary execution
    pub fn record_success(&self, operation: &str) {
        let mut records = self.records.write().unwrap();
        let record = records.entry(operation.to_string()).or_default();
        record.consecutive_failures = 0;
        record.last_status = OperationStatus::Healthy;
        record.last_error = None;
    }

    /// Records a failed primary execution
    pub fn record_primary_failure(&self, operation: &str, error: &SourceError) {
        let mut records = self.records.write().unwrap();
        let record = records.entry(operation.to_string()).or_default();
        record.consecutive_failures += 1;
        record.last_status = OperationStatus::Degraded;
        record.last_error = Some(error.to_string());
    }

    /// Health record for one operation, if it has ever executed
    pub fn get(&self, operation: &str) -> Option<OperationHealth> {
        self.records.read().unwrap().get(operation).cloned()
    }

    /// Read-only snapshot of every record, sorted by operation name
    pub fn snapshot(&self) -> BTreeMap<String, OperationHealth> {
        self.records
            .read()
            .unwrap()
            .iter()
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_accumulate_and_success_resets() {
        let registry = HealthRegistry::new();
        let err = SourceError::network("connection reset");

        registry.record_primary_failure("analyze_performance", &err);
        registry.record_primary_failure("analyze_performance", &err);

        let record = registry.get("analyze_performance").unwrap();
        assert_eq!(record.consecutive_failures, 2);
        assert_eq!(record.last_status, OperationStatus::Degraded);
        assert!(record.last_error.unwrap().contains("connection reset"));

        registry.record_success("analyze_performance");
        let record = registry.get("analyze_performance").unwrap();
        assert_eq!(record.consecutive_failures, 0);
        assert_eq!(record.last_status, OperationStatus::Healthy);
        assert_eq!(record.last_error, None);
    }

    #[test]
    fn test_unknown_operation_has_no_record() {
        let registry = HealthRegistry::new();
        assert!(registry.get("never_ran").is_none());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_is_sorted_by_name() {
        let registry = HealthRegistry::new();
        registry.record_success("zeta");
        registry.record_success("alpha");

        let names: Vec<_> = registry.snapshot().into_keys().collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
