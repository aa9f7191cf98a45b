//! External data collectors
//!
//! Everything the platform learns about the outside world (field
//! performance, analytics, competitor posture) arrives through the
//! `DataCollector` trait. The HTTP implementation is the production wiring;
//! the baseline implementation serves fixed figures for degraded operation
//! and tests. The core stays deterministic because nothing below this seam
//! invents data.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use resilience_rs::{SourceError, SourceResult};

/// Field performance readings for the primary property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebVitals {
    /// Largest contentful paint, milliseconds
    pub lcp_ms: f64,
    /// Cumulative layout shift
    pub cls: f64,
    /// Shipped bundle size, bytes
    pub bundle_size_bytes: f64,
}

/// Aggregated analytics for the reporting window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    /// Fraction of single-page sessions, 0-1
    pub bounce_rate: f64,
    /// Conversion events in the window
    pub conversion_events: f64,
    /// Mean session duration, seconds
    pub session_duration_secs: f64,
}

/// Public posture of one competitor domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub domain: String,
    /// Lighthouse-style performance score, 0-100
    pub performance_score: f64,
    /// Domain authority estimate, 0-100
    pub authority_score: f64,
}

/// Boundary to the excluded collaborator services
#[async_trait]
pub trait DataCollector: Send + Sync {
    async fn fetch_web_vitals(&self) -> SourceResult<WebVitals>;
    async fn fetch_analytics(&self) -> SourceResult<AnalyticsSummary>;
    async fn fetch_competitor(&self, domain: &str) -> SourceResult<CompetitorProfile>;
}

/// Configuration for the HTTP collector
#[derive(Debug, Clone)]
pub struct HttpCollectorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for HttpCollectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8780".to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Collector backed by the data-aggregation service
pub struct HttpCollector {
    client: reqwest::Client,
    config: HttpCollectorConfig,
}

impl HttpCollector {
    pub fn new(config: HttpCollectorConfig) -> SourceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                SourceError::configuration(format!("failed to build http client: {}", e))
            })?;
        Ok(Self { client, config })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> SourceResult<T> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if response.status().as_u16() == 429 {
            return Err(SourceError::rate_limit(format!("{} throttled", url)));
        }
        if !response.status().is_success() {
            return Err(SourceError::unavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl DataCollector for HttpCollector {
    async fn fetch_web_vitals(&self) -> SourceResult<WebVitals> {
        self.get_json("/v1/vitals").await
    }

    async fn fetch_analytics(&self) -> SourceResult<AnalyticsSummary> {
        self.get_json("/v1/analytics").await
    }

    async fn fetch_competitor(&self, domain: &str) -> SourceResult<CompetitorProfile> {
        self.get_json(&format!("/v1/competitors/{}", domain)).await
    }
}

/// Fixed reference figures used when live sources are unreachable.
///
/// The numbers are intentionally unremarkable mid-range values; consumers
/// see them flagged degraded and treat them as a floor, not a measurement.
pub struct BaselineCollector;

impl BaselineCollector {
    pub const VITALS: WebVitals = WebVitals {
        lcp_ms: 2_500.0,
        cls: 0.1,
        bundle_size_bytes: 450_000.0,
    };

    pub const ANALYTICS: AnalyticsSummary = AnalyticsSummary {
        bounce_rate: 0.48,
        conversion_events: 40.0,
        session_duration_secs: 180.0,
    };
}

#[async_trait]
impl DataCollector for BaselineCollector {
    async fn fetch_web_vitals(&self) -> SourceResult<WebVitals> {
        Ok(Self::VITALS)
    }

    async fn fetch_analytics(&self) -> SourceResult<AnalyticsSummary> {
        Ok(Self::ANALYTICS)
    }

    async fn fetch_competitor(&self, domain: &str) -> SourceResult<CompetitorProfile> {
        Ok(CompetitorProfile {
            domain: domain.to_string(),
            performance_score: 70.0,
            authority_score: 55.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_baseline_collector_is_deterministic() {
        let collector = BaselineCollector;
        let first = collector.fetch_web_vitals().await.unwrap();
        let second = collector.fetch_web_vitals().await.unwrap();
        assert_eq!(first, second);

        let a = collector.fetch_competitor("example.com").await.unwrap();
        let b = collector.fetch_competitor("example.com").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.domain, "example.com");
    }

    #[test]
    fn test_http_collector_builds_with_defaults() {
        let collector = HttpCollector::new(HttpCollectorConfig::default());
        assert!(collector.is_ok());
    }
}
