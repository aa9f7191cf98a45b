//! Error types for the resilience layer
//!
//! `SourceError` normalizes failures from external collaborators (HTTP
//! fetches, upstream APIs, payload parsing) into a small taxonomy so the
//! fallback wrapper and health registry can reason about them uniformly.

use std::time::Duration;

use thiserror::Error;

/// Result type for operations against external data sources
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Normalized failure raised by a primary or fallback data source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network or connection errors
    #[error("network error: {0}")]
    Network(String),

    /// Operation exceeded its time budget
    #[error("timeout: {0}")]
    Timeout(String),

    /// Upstream throttled the request
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    /// Upstream reachable but unable to serve
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Response could not be decoded
    #[error("parsing error: {0}")]
    Parsing(String),

    /// Client-side misconfiguration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl SourceError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        SourceError::Network(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        SourceError::Timeout(message.into())
    }

    /// Create a rate limit error
    pub fn rate_limit(message: impl Into<String>) -> Self {
        SourceError::RateLimit(message.into())
    }

    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        SourceError::Unavailable(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        SourceError::Parsing(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        SourceError::Configuration(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        SourceError::Internal(message.into())
    }

    /// Check if this failure might clear up on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Network(_)
                | SourceError::Timeout(_)
                | SourceError::RateLimit(_)
                | SourceError::Unavailable(_)
        )
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::timeout(format!("request timed out: {}", err))
        } else if err.is_connect() {
            SourceError::network(format!("connection error: {}", err))
        } else if err.is_decode() {
            SourceError::parsing(format!("response decode error: {}", err))
        } else if err.status().map_or(false, |s| s.as_u16() == 429) {
            SourceError::rate_limit(format!("upstream throttled: {}", err))
        } else if err.status().map_or(false, |s| s.is_server_error()) {
            SourceError::unavailable(format!("upstream error: {}", err))
        } else {
            SourceError::internal(format!("http client error: {}", err))
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::parsing(format!("json error: {}", err))
    }
}

/// Raised when the primary failed and no fallback could produce a result.
///
/// Carries both causes so callers can report why the degraded path was not
/// enough. `fallback_cause` is `None` when the operation had no fallback
/// registered at all.
#[derive(Debug, Clone)]
pub struct FallbackExhausted {
    pub operation: String,
    pub primary_cause: SourceError,
    pub fallback_cause: Option<SourceError>,
}

impl std::error::Error for FallbackExhausted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.primary_cause)
    }
}

impl std::fmt::Display for FallbackExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.fallback_cause {
            Some(fallback) => write!(
                f,
                "operation '{}' failed: primary: {}; fallback: {}",
                self.operation, self.primary_cause, fallback
            ),
            None => write!(
                f,
                "operation '{}' failed with no fallback configured: {}",
                self.operation, self.primary_cause
            ),
        }
    }
}

/// Cache misconfiguration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A TTL of zero would make every entry dead on arrival
    #[error("cache ttl must be positive, got {0:?}")]
    InvalidTtl(Duration),
}
