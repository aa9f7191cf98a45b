//! Tool dispatcher
//!
//! Entry point for every named operation request: resolve the descriptor,
//! validate arguments against its schema, consult the TTL cache, and only
//! then execute the handler behind the fallback guard. Results are cached
//! with the operation's TTL; a cache hit short-circuits execution entirely.
//!
//! The dispatcher owns no hidden globals; cache, health registry, and
//! registry are injected at construction so tests and embedders control
//! their lifetimes.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use resilience_rs::{
    CacheStats, FallbackExhausted, HealthRegistry, OperationHealth, TtlCache,
};

use crate::registry::{OperationRegistry, RegisteredOperation};
use crate::schema::SchemaViolation;

/// Dispatch failures surfaced to the caller
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    #[error(transparent)]
    FallbackExhausted(#[from] FallbackExhausted),
}

impl DispatchError {
    /// Stable machine-readable code for the wire protocol
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::UnknownOperation(_) => "UnknownOperation",
            DispatchError::SchemaViolation(_) => "SchemaViolation",
            DispatchError::FallbackExhausted(_) => "FallbackExhausted",
        }
    }
}

/// Successful dispatch result
///
/// `degraded` is true when the value came from a fallback path, either
/// directly or replayed from cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub result: Value,
    pub degraded: bool,
}

/// One completed dispatch, for the operational journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub at: DateTime<Utc>,
    pub operation: String,
    pub cache_hit: bool,
    pub degraded: bool,
}

/// Bounded journal of recent dispatches
#[derive(Debug)]
struct DispatchJournal {
    records: RwLock<VecDeque<DispatchRecord>>,
    capacity: usize,
}

impl DispatchJournal {
    fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    fn record(&self, operation: &str, cache_hit: bool, degraded: bool) {
        let mut records = self.records.write().unwrap();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(DispatchRecord {
            at: Utc::now(),
            operation: operation.to_string(),
            cache_hit,
            degraded,
        });
    }

    fn recent(&self) -> Vec<DispatchRecord> {
        self.records.read().unwrap().iter().cloned().collect()
    }
}

/// Read-only operational snapshot
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub cache: CacheStats,
    pub operations: BTreeMap<String, OperationHealth>,
    pub recent: Vec<DispatchRecord>,
}

/// Dispatcher tuning knobs
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Timeout applied when an operation declares none of its own
    pub default_timeout: Option<Duration>,
    /// Journal depth
    pub journal_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_timeout: Some(Duration::from_secs(30)),
            journal_capacity: 100,
        }
    }
}

/// Routes named operation requests to registered handlers
pub struct Dispatcher {
    registry: OperationRegistry,
    cache: Arc<TtlCache<DispatchOutcome>>,
    health: Arc<HealthRegistry>,
    guard: resilience_rs::ExecutionGuard,
    journal: DispatchJournal,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        registry: OperationRegistry,
        cache: Arc<TtlCache<DispatchOutcome>>,
        health: Arc<HealthRegistry>,
        config: DispatcherConfig,
    ) -> Self {
        let guard = resilience_rs::ExecutionGuard::new(health.clone());
        let journal = DispatchJournal::new(config.journal_capacity);
        Self {
            registry,
            cache,
            health,
            guard,
            journal,
            config,
        }
    }

    /// Validates and executes one operation request.
    pub async fn dispatch(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let operation = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::UnknownOperation(name.to_string()))?;

        operation.descriptor.input_schema.validate(&args)?;

        let key = cache_key(name, &args);
        if let Some(cached) = self.cache.get(&key) {
            debug!(operation = %name, "serving cached result");
            self.journal.record(name, true, cached.degraded);
            return Ok(cached);
        }

        let outcome = self.execute(operation, &args).await?;
        if let Err(err) = self
            .cache
            .insert(key, outcome.clone(), operation.cache_ttl)
        {
            warn!(operation = %name, error = %err, "failed to cache result");
        }
        self.journal.record(name, false, outcome.degraded);
        Ok(outcome)
    }

    async fn execute(
        &self,
        operation: &RegisteredOperation,
        args: &Map<String, Value>,
    ) -> Result<DispatchOutcome, FallbackExhausted> {
        let name = operation.descriptor.name;
        let timeout = operation.timeout.or(self.config.default_timeout);

        let primary = operation.primary.clone();
        let primary_args = args.clone();
        let primary_fut = async move { primary.call(&primary_args).await }.boxed();

        let fallback_fut = operation.fallback.clone().map(|fallback| {
            let fallback_args = args.clone();
            async move { fallback.call(&fallback_args).await }.boxed()
        });

        let executed = self
            .guard
            .execute(name, timeout, primary_fut, fallback_fut)
            .await?;

        Ok(DispatchOutcome {
            result: executed.value,
            degraded: executed.degraded,
        })
    }

    /// Descriptors for protocol-level tool discovery
    pub fn list_operations(&self) -> Vec<Value> {
        self.registry
            .descriptors()
            .iter()
            .map(|d| d.to_json())
            .collect()
    }

    /// Read-only operational snapshot for the health surface
    pub fn health_snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            cache: self.cache.stats(),
            operations: self.health.snapshot(),
            recent: self.journal.recent(),
        }
    }
}

/// Deterministic cache key from the operation name and normalized arguments.
///
/// Object keys are sorted recursively so argument ordering on the wire
/// never changes the key.
pub fn cache_key(name: &str, args: &Map<String, Value>) -> String {
    let canonical = canonicalize(&Value::Object(args.clone()));
    format!("{}:{}", name, canonical)
}

fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let body: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}:{}", key, canonicalize(value)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}
