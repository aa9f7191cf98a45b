//! Primary/fallback execution with health recording
//!
//! The guard runs a primary operation and, when it fails or overruns its
//! time budget, serves the registered fallback instead. A caller only sees
//! an error when the fallback also fails (or none exists); every other path
//! produces a usable value, flagged `degraded` when the fallback supplied
//! it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::error::{FallbackExhausted, SourceError, SourceResult};
use crate::health::HealthRegistry;

/// A value produced by the guard, with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed<T> {
    pub value: T,
    /// True when the fallback produced the value
    pub degraded: bool,
}

/// Executes operations with graceful degradation
#[derive(Debug, Clone)]
pub struct ExecutionGuard {
    health: Arc<HealthRegistry>,
}

impl ExecutionGuard {
    pub fn new(health: Arc<HealthRegistry>) -> Self {
        Self { health }
    }

    /// Runs `primary`, falling back on failure or timeout.
    ///
    /// A timed-out primary is dropped where it stands; a completion after
    /// the budget never reaches the caller. Health is updated after every
    /// attempt: success resets the failure streak, failure increments it and
    /// marks the operation degraded.
    pub async fn execute<T>(
        &self,
        operation: &str,
        timeout: Option<Duration>,
        primary: BoxFuture<'_, SourceResult<T>>,
        fallback: Option<BoxFuture<'_, SourceResult<T>>>,
    ) -> Result<Executed<T>, FallbackExhausted> {
        let start = Instant::now();

        let primary_cause = match self.run_primary(operation, timeout, primary).await {
            Ok(value) => {
                self.health.record_success(operation);
                counter!(format!("guard.{}.primary.success", operation), 1);
                histogram!(
                    format!("guard.{}.duration_ms", operation),
                    start.elapsed().as_millis() as f64
                );
                debug!(
                    operation = %operation,
                    duration_ms = %start.elapsed().as_millis(),
                    "primary succeeded"
                );
                return Ok(Executed {
                    value,
                    degraded: false,
                });
            }
            Err(err) => err,
        };

        self.health.record_primary_failure(operation, &primary_cause);
        counter!(format!("guard.{}.primary.failure", operation), 1);
        warn!(
            operation = %operation,
            error = %primary_cause,
            transient = primary_cause.is_transient(),
            "primary failed, trying fallback"
        );

        let Some(fallback) = fallback else {
            return Err(FallbackExhausted {
                operation: operation.to_string(),
                primary_cause,
                fallback_cause: None,
            });
        };

        match fallback.await {
            Ok(value) => {
                counter!(format!("guard.{}.fallback.success", operation), 1);
                info!(
                    operation = %operation,
                    duration_ms = %start.elapsed().as_millis(),
                    "fallback served degraded result"
                );
                Ok(Executed {
                    value,
                    degraded: true,
                })
            }
            Err(fallback_cause) => {
                counter!(format!("guard.{}.fallback.failure", operation), 1);
                warn!(
                    operation = %operation,
                    primary = %primary_cause,
                    fallback = %fallback_cause,
                    "fallback exhausted"
                );
                Err(FallbackExhausted {
                    operation: operation.to_string(),
                    primary_cause,
                    fallback_cause: Some(fallback_cause),
                })
            }
        }
    }

    async fn run_primary<T>(
        &self,
        operation: &str,
        timeout: Option<Duration>,
        primary: BoxFuture<'_, SourceResult<T>>,
    ) -> SourceResult<T> {
        match timeout {
            Some(budget) => match tokio::time::timeout(budget, primary).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::timeout(format!(
                    "operation '{}' exceeded {}ms budget",
                    operation,
                    budget.as_millis()
                ))),
            },
            None => primary.await,
        }
    }
}
