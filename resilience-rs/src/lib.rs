//! # Resilience Layer
//!
//! Shared resilience substrate for the intelligence platform:
//!
//! - TTL cache with hit/miss accounting and a periodic background sweep
//! - Primary/fallback execution with optional timeout budgets
//! - Per-operation health records for operational visibility
//! - Normalized source-error taxonomy for external collaborators
//!
//! All mutable state lives behind the narrow contracts in this crate;
//! callers construct and inject their own instances rather than reaching
//! for process-wide singletons.

pub mod cache;
pub mod error;
pub mod fallback;
pub mod health;

// Re-export commonly used types
pub use cache::{CacheStats, CacheSweeper, TtlCache};
pub use error::{CacheError, FallbackExhausted, SourceError, SourceResult};
pub use fallback::{Executed, ExecutionGuard};
pub use health::{HealthRegistry, OperationHealth, OperationStatus};
