//! # Insight Analytics
//!
//! Numeric backbone of the intelligence platform:
//!
//! - Bounded, append-only store of historical metric snapshots
//! - Pairwise-complete Pearson correlation across stored metrics
//! - Deterministic, table-driven impact projection for proposed changes
//!
//! Everything here is pure in-memory computation; nothing suspends and
//! nothing draws on randomness, so identical inputs always produce
//! identical outputs.

pub mod correlation;
pub mod impact;
pub mod store;

pub use correlation::CorrelationEngine;
pub use impact::{
    BusinessImpact, ChangeDescriptor, ChangeScope, ChangeType, CompetitiveImpact, ImpactEstimate,
    ImpactEstimator, ImpactWeights, ResourceImpact, TechnicalImpact,
};
pub use store::{metric, MetricSnapshot, MetricsStore};
