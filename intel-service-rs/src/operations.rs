//! Built-in intelligence operations
//!
//! Handlers compose the analytics engine, the impact estimator, and the
//! external collector into the operations exposed over the tool protocol.
//! Fetch-heavy primaries fan their independent sub-calls out in parallel
//! and tolerate partial failure; every operation with a live data source
//! also registers a deterministic fallback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::warn;

use insight_analytics_rs::{
    metric, ChangeDescriptor, CorrelationEngine, ImpactEstimator, MetricSnapshot, MetricsStore,
};
use resilience_rs::{SourceError, SourceResult};

use crate::collector::{AnalyticsSummary, BaselineCollector, DataCollector, WebVitals};
use crate::registry::{
    OperationDescriptor, OperationHandler, OperationRegistry, RegisteredOperation, RegistryError,
    DEFAULT_CACHE_TTL,
};
use crate::schema::{FieldKind, FieldSpec, InputSchema};

const FOCUS_AREAS: &[&str] = &["conversion", "engagement", "acquisition", "retention"];
const ANALYSIS_TYPES: &[&str] = &["market_position", "technical_capability", "comprehensive"];
const COMPANY_SIZES: &[&str] = &["small", "medium", "large", "enterprise"];
const DEFAULT_COMPETITORS: &[&str] = &["northlight.dev", "claritymetrics.io"];

/// Shared wiring handed to every handler
#[derive(Clone)]
pub struct OperationContext {
    pub collector: Arc<dyn DataCollector>,
    pub store: Arc<MetricsStore>,
    pub engine: CorrelationEngine,
    pub estimator: Arc<ImpactEstimator>,
}

fn snapshot_from(vitals: Option<&WebVitals>, analytics: Option<&AnalyticsSummary>) -> MetricSnapshot {
    let mut snapshot = MetricSnapshot::new(Utc::now());
    if let Some(vitals) = vitals {
        snapshot.set_metric(metric::LCP, vitals.lcp_ms);
        snapshot.set_metric(metric::CLS, vitals.cls);
        snapshot.set_metric(metric::BUNDLE_SIZE, vitals.bundle_size_bytes);
    }
    if let Some(analytics) = analytics {
        snapshot.set_metric(metric::BOUNCE_RATE, analytics.bounce_rate);
        snapshot.set_metric(metric::CONVERSION_EVENTS, analytics.conversion_events);
        snapshot.set_metric(metric::SESSION_DURATION, analytics.session_duration_secs);
    }
    snapshot
}

fn correlation_figures(engine: &CorrelationEngine) -> Value {
    json!({
        "lcp_to_conversion": engine.correlate(metric::LCP, metric::CONVERSION_EVENTS),
        "lcp_to_bounce": engine.correlate(metric::LCP, metric::BOUNCE_RATE),
        "bundle_to_lcp": engine.correlate(metric::BUNDLE_SIZE, metric::LCP),
    })
}

/// Fetches live vitals and analytics, records a snapshot, and reports with
/// correlation context. Partial upstream failure produces a partial report.
struct AnalyzePerformance {
    ctx: OperationContext,
}

#[async_trait]
impl OperationHandler for AnalyzePerformance {
    async fn call(&self, args: &Map<String, Value>) -> SourceResult<Value> {
        let focus_area = args
            .get("focus_area")
            .and_then(Value::as_str)
            .unwrap_or("conversion");

        // Independent upstreams; one failing must not abort the other.
        let (vitals, analytics) = tokio::join!(
            self.ctx.collector.fetch_web_vitals(),
            self.ctx.collector.fetch_analytics(),
        );

        if let (Err(vitals_err), Err(_)) = (&vitals, &analytics) {
            return Err(vitals_err.clone());
        }

        if let Err(err) = &vitals {
            warn!(error = %err, "vitals fetch failed, reporting partial data");
        }
        if let Err(err) = &analytics {
            warn!(error = %err, "analytics fetch failed, reporting partial data");
        }

        let vitals = vitals.ok();
        let analytics = analytics.ok();
        self.ctx
            .store
            .append(snapshot_from(vitals.as_ref(), analytics.as_ref()));

        Ok(json!({
            "focus_area": focus_area,
            "vitals": vitals,
            "analytics": analytics,
            "partial": vitals.is_none() || analytics.is_none(),
            "correlations": correlation_figures(&self.ctx.engine),
            "history_depth": self.ctx.store.len(),
        }))
    }
}

/// Serves the most recent stored snapshot when live sources are down
struct LastKnownPerformance {
    ctx: OperationContext,
}

#[async_trait]
impl OperationHandler for LastKnownPerformance {
    async fn call(&self, args: &Map<String, Value>) -> SourceResult<Value> {
        let focus_area = args
            .get("focus_area")
            .and_then(Value::as_str)
            .unwrap_or("conversion");

        let snapshot = self
            .ctx
            .store
            .latest()
            .ok_or_else(|| SourceError::unavailable("no historical snapshots recorded"))?;

        Ok(json!({
            "focus_area": focus_area,
            "snapshot": snapshot,
            "correlations": correlation_figures(&self.ctx.engine),
            "history_depth": self.ctx.store.len(),
        }))
    }
}

/// Pure correlation lookup between two stored metrics
struct CorrelateMetrics {
    ctx: OperationContext,
}

#[async_trait]
impl OperationHandler for CorrelateMetrics {
    async fn call(&self, args: &Map<String, Value>) -> SourceResult<Value> {
        let metric_a = args
            .get("metric_a")
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::internal("validated args missing metric_a"))?;
        let metric_b = args
            .get("metric_b")
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::internal("validated args missing metric_b"))?;

        Ok(json!({
            "metric_a": metric_a,
            "metric_b": metric_b,
            "coefficient": self.ctx.engine.correlate(metric_a, metric_b),
            "paired_samples": self.ctx.engine.paired_samples(metric_a, metric_b),
        }))
    }
}

/// Projects cross-dimensional impact for a proposed change
struct ForecastChangeImpact {
    ctx: OperationContext,
}

#[async_trait]
impl OperationHandler for ForecastChangeImpact {
    async fn call(&self, args: &Map<String, Value>) -> SourceResult<Value> {
        let change: ChangeDescriptor =
            serde_json::from_value(Value::Object(args.clone()))?;
        let estimate = self.ctx.estimator.estimate(&change);
        Ok(json!({
            "change": change,
            "estimate": estimate,
            "history_depth": self.ctx.store.len(),
        }))
    }
}

/// Queries competitor posture, tolerating per-domain failures
struct CompetitiveSnapshot {
    ctx: OperationContext,
}

#[async_trait]
impl OperationHandler for CompetitiveSnapshot {
    async fn call(&self, args: &Map<String, Value>) -> SourceResult<Value> {
        let analysis_type = args
            .get("analysis_type")
            .and_then(Value::as_str)
            .unwrap_or("comprehensive");
        let competitors: Vec<String> = match args.get("competitors").and_then(Value::as_array) {
            Some(domains) if !domains.is_empty() => domains
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => DEFAULT_COMPETITORS.iter().map(|d| d.to_string()).collect(),
        };

        let fetches = competitors
            .iter()
            .map(|domain| self.ctx.collector.fetch_competitor(domain));
        let results = join_all(fetches).await;

        let mut profiles = Vec::new();
        let mut failed = Vec::new();
        for (domain, result) in competitors.iter().zip(results) {
            match result {
                Ok(profile) => profiles.push(profile),
                Err(err) => {
                    warn!(domain = %domain, error = %err, "competitor fetch failed");
                    failed.push(domain.clone());
                }
            }
        }

        if profiles.is_empty() {
            return Err(SourceError::unavailable(format!(
                "all {} competitor fetches failed",
                competitors.len()
            )));
        }

        Ok(json!({
            "analysis_type": analysis_type,
            "profiles": profiles,
            "failed": failed,
        }))
    }
}

/// Static competitor table for degraded serving
struct BaselineCompetitive;

#[async_trait]
impl OperationHandler for BaselineCompetitive {
    async fn call(&self, args: &Map<String, Value>) -> SourceResult<Value> {
        let analysis_type = args
            .get("analysis_type")
            .and_then(Value::as_str)
            .unwrap_or("comprehensive");

        let collector = BaselineCollector;
        let mut profiles = Vec::new();
        for domain in DEFAULT_COMPETITORS {
            profiles.push(collector.fetch_competitor(domain).await?);
        }

        Ok(json!({
            "analysis_type": analysis_type,
            "profiles": profiles,
            "failed": [],
        }))
    }
}

/// Table-driven lead scoring weighted by observed engagement correlation
struct ScoreLead {
    ctx: OperationContext,
}

impl ScoreLead {
    fn size_base(size: &str) -> f64 {
        match size {
            "small" => 4.0,
            "medium" => 5.5,
            "large" => 7.0,
            "enterprise" => 8.5,
            _ => 5.0,
        }
    }
}

#[async_trait]
impl OperationHandler for ScoreLead {
    async fn call(&self, args: &Map<String, Value>) -> SourceResult<Value> {
        let company_size = args
            .get("company_size")
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::internal("validated args missing company_size"))?;
        let industry = args.get("industry").and_then(Value::as_str);
        let engagement = args
            .get("engagement_score")
            .and_then(Value::as_f64)
            .unwrap_or(50.0)
            .clamp(0.0, 100.0);

        // Sessions that convert make engagement a stronger signal
        let engagement_weight = 1.0
            + self
                .ctx
                .engine
                .correlate(metric::SESSION_DURATION, metric::CONVERSION_EVENTS);
        let score = (Self::size_base(company_size) + (engagement / 100.0) * 2.0 * engagement_weight)
            .clamp(1.0, 10.0);

        let tier = if score >= 8.0 {
            "hot"
        } else if score >= 6.0 {
            "warm"
        } else {
            "cool"
        };

        Ok(json!({
            "company_size": company_size,
            "industry": industry,
            "score": score,
            "tier": tier,
            "engagement_weight": engagement_weight,
        }))
    }
}

/// Builds the startup operation table.
pub fn builtin_registry(ctx: OperationContext) -> Result<OperationRegistry, RegistryError> {
    let mut registry = OperationRegistry::new();

    registry.register(RegisteredOperation {
        descriptor: OperationDescriptor {
            name: "analyze_performance",
            description: "Current performance and analytics with business correlations",
            input_schema: InputSchema::new(vec![
                FieldSpec::optional("focus_area", FieldKind::Choice(FOCUS_AREAS)),
                FieldSpec::optional("time_range", FieldKind::Text),
            ]),
        },
        primary: Arc::new(AnalyzePerformance { ctx: ctx.clone() }),
        fallback: Some(Arc::new(LastKnownPerformance { ctx: ctx.clone() })),
        cache_ttl: DEFAULT_CACHE_TTL,
        timeout: Some(Duration::from_secs(20)),
    })?;

    registry.register(RegisteredOperation {
        descriptor: OperationDescriptor {
            name: "correlate_metrics",
            description: "Pearson correlation between two recorded metrics",
            input_schema: InputSchema::new(vec![
                FieldSpec::required("metric_a", FieldKind::Text),
                FieldSpec::required("metric_b", FieldKind::Text),
            ]),
        },
        primary: Arc::new(CorrelateMetrics { ctx: ctx.clone() }),
        fallback: None,
        cache_ttl: Duration::from_secs(60),
        timeout: None,
    })?;

    registry.register(RegisteredOperation {
        descriptor: OperationDescriptor {
            name: "forecast_change_impact",
            description: "Cross-dimensional impact projection for a proposed change",
            input_schema: InputSchema::new(vec![
                FieldSpec::required(
                    "change_type",
                    FieldKind::Choice(&["feature", "optimization", "architecture", "design", "content"]),
                ),
                FieldSpec::required(
                    "scope",
                    FieldKind::Choice(&["component", "page", "system", "platform"]),
                ),
                FieldSpec::required("description", FieldKind::Text),
            ]),
        },
        primary: Arc::new(ForecastChangeImpact { ctx: ctx.clone() }),
        fallback: None,
        cache_ttl: Duration::from_secs(120),
        timeout: None,
    })?;

    registry.register(RegisteredOperation {
        descriptor: OperationDescriptor {
            name: "competitive_snapshot",
            description: "Competitor posture with graceful per-domain degradation",
            input_schema: InputSchema::new(vec![
                FieldSpec::optional("competitors", FieldKind::TextArray),
                FieldSpec::optional("analysis_type", FieldKind::Choice(ANALYSIS_TYPES)),
            ]),
        },
        primary: Arc::new(CompetitiveSnapshot { ctx: ctx.clone() }),
        fallback: Some(Arc::new(BaselineCompetitive)),
        cache_ttl: Duration::from_secs(900),
        timeout: Some(Duration::from_secs(20)),
    })?;

    registry.register(RegisteredOperation {
        descriptor: OperationDescriptor {
            name: "score_lead",
            description: "Deterministic lead scoring weighted by engagement correlation",
            input_schema: InputSchema::new(vec![
                FieldSpec::required("company_size", FieldKind::Choice(COMPANY_SIZES)),
                FieldSpec::optional("industry", FieldKind::Text),
                FieldSpec::optional("engagement_score", FieldKind::Number),
            ]),
        },
        primary: Arc::new(ScoreLead { ctx }),
        fallback: None,
        cache_ttl: Duration::from_secs(300),
        timeout: None,
    })?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CompetitorProfile;
    use crate::dispatcher::{Dispatcher, DispatcherConfig};
    use insight_analytics_rs::ImpactWeights;
    use resilience_rs::{HealthRegistry, TtlCache};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Collector with switchable per-source failures
    struct StubCollector {
        fail_vitals: AtomicBool,
        fail_analytics: AtomicBool,
        fail_competitors: AtomicBool,
    }

    impl StubCollector {
        fn healthy() -> Self {
            Self {
                fail_vitals: AtomicBool::new(false),
                fail_analytics: AtomicBool::new(false),
                fail_competitors: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl DataCollector for StubCollector {
        async fn fetch_web_vitals(&self) -> SourceResult<WebVitals> {
            if self.fail_vitals.load(Ordering::SeqCst) {
                return Err(SourceError::network("vitals endpoint offline"));
            }
            Ok(WebVitals {
                lcp_ms: 2_100.0,
                cls: 0.08,
                bundle_size_bytes: 400_000.0,
            })
        }

        async fn fetch_analytics(&self) -> SourceResult<AnalyticsSummary> {
            if self.fail_analytics.load(Ordering::SeqCst) {
                return Err(SourceError::network("analytics endpoint offline"));
            }
            Ok(AnalyticsSummary {
                bounce_rate: 0.42,
                conversion_events: 55.0,
                session_duration_secs: 210.0,
            })
        }

        async fn fetch_competitor(&self, domain: &str) -> SourceResult<CompetitorProfile> {
            if self.fail_competitors.load(Ordering::SeqCst) || domain == "down.example" {
                return Err(SourceError::unavailable(format!("{} unreachable", domain)));
            }
            Ok(CompetitorProfile {
                domain: domain.to_string(),
                performance_score: 80.0,
                authority_score: 60.0,
            })
        }
    }

    fn context_with(collector: Arc<dyn DataCollector>) -> OperationContext {
        let store = Arc::new(MetricsStore::default());
        let engine = CorrelationEngine::new(store.clone());
        let estimator = Arc::new(ImpactEstimator::new(
            engine.clone(),
            ImpactWeights::default(),
        ));
        OperationContext {
            collector,
            store,
            engine,
            estimator,
        }
    }

    fn dispatcher_for(ctx: OperationContext) -> Dispatcher {
        Dispatcher::new(
            builtin_registry(ctx).unwrap(),
            Arc::new(TtlCache::new("ops-test")),
            Arc::new(HealthRegistry::new()),
            DispatcherConfig::default(),
        )
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_analyze_performance_appends_snapshot() {
        let ctx = context_with(Arc::new(StubCollector::healthy()));
        let store = ctx.store.clone();
        let dispatcher = dispatcher_for(ctx);

        let outcome = dispatcher
            .dispatch("analyze_performance", args(json!({"focus_area": "engagement"})))
            .await
            .unwrap();

        assert!(!outcome.degraded);
        assert_eq!(outcome.result["partial"], json!(false));
        assert_eq!(outcome.result["focus_area"], json!("engagement"));
        assert_eq!(store.len(), 1);
        let snapshot = store.latest().unwrap();
        assert_eq!(snapshot.get(metric::LCP), Some(2_100.0));
        assert_eq!(snapshot.get(metric::CONVERSION_EVENTS), Some(55.0));
    }

    #[tokio::test]
    async fn test_analyze_performance_partial_failure() {
        let collector = StubCollector::healthy();
        collector.fail_analytics.store(true, Ordering::SeqCst);
        let ctx = context_with(Arc::new(collector));
        let store = ctx.store.clone();
        let dispatcher = dispatcher_for(ctx);

        let outcome = dispatcher
            .dispatch("analyze_performance", Map::new())
            .await
            .unwrap();

        // Vitals alone still make a usable, non-degraded partial report
        assert!(!outcome.degraded);
        assert_eq!(outcome.result["partial"], json!(true));
        assert!(outcome.result["analytics"].is_null());
        let snapshot = store.latest().unwrap();
        assert_eq!(snapshot.get(metric::LCP), Some(2_100.0));
        assert_eq!(snapshot.get(metric::BOUNCE_RATE), None);
    }

    #[tokio::test]
    async fn test_analyze_performance_degrades_to_last_snapshot() {
        let collector = StubCollector::healthy();
        let ctx = context_with(Arc::new(collector));
        let dispatcher = dispatcher_for(ctx.clone());

        // Seed history through one healthy pass
        dispatcher
            .dispatch("analyze_performance", Map::new())
            .await
            .unwrap();

        // Then lose both upstreams behind a fresh dispatcher
        let failing = StubCollector::healthy();
        failing.fail_vitals.store(true, Ordering::SeqCst);
        failing.fail_analytics.store(true, Ordering::SeqCst);
        let degraded_ctx = OperationContext {
            collector: Arc::new(failing),
            ..ctx
        };
        let degraded_dispatcher = dispatcher_for(degraded_ctx);

        let outcome = degraded_dispatcher
            .dispatch("analyze_performance", args(json!({"focus_area": "retention"})))
            .await
            .unwrap();

        assert!(outcome.degraded);
        assert!(outcome.result["snapshot"]["values"]["lcp"].is_number());
    }

    #[tokio::test]
    async fn test_correlate_metrics_reports_sample_count() {
        let ctx = context_with(Arc::new(StubCollector::healthy()));
        for i in 0..4 {
            ctx.store.append(
                MetricSnapshot::new(Utc::now())
                    .with_metric(metric::LCP, 2_000.0 + i as f64 * 100.0)
                    .with_metric(metric::BOUNCE_RATE, 0.4 + i as f64 * 0.02),
            );
        }
        let dispatcher = dispatcher_for(ctx);

        let outcome = dispatcher
            .dispatch(
                "correlate_metrics",
                args(json!({"metric_a": "lcp", "metric_b": "bounce_rate"})),
            )
            .await
            .unwrap();

        assert_eq!(outcome.result["paired_samples"], json!(4));
        let coefficient = outcome.result["coefficient"].as_f64().unwrap();
        assert!((coefficient - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_forecast_change_impact_is_deterministic() {
        let ctx = context_with(Arc::new(StubCollector::healthy()));
        let dispatcher = dispatcher_for(ctx);
        let payload = json!({
            "change_type": "optimization",
            "scope": "page",
            "description": "defer non-critical scripts",
        });

        let first = dispatcher
            .dispatch("forecast_change_impact", args(payload.clone()))
            .await
            .unwrap();
        let second = dispatcher
            .dispatch("forecast_change_impact", args(payload))
            .await
            .unwrap();

        assert_eq!(first.result, second.result);
        assert!(first.result["estimate"]["resource"]["development_hours"]
            .as_f64()
            .unwrap()
            > 0.0);
    }

    #[tokio::test]
    async fn test_competitive_snapshot_collects_partial_failures() {
        let ctx = context_with(Arc::new(StubCollector::healthy()));
        let dispatcher = dispatcher_for(ctx);

        let outcome = dispatcher
            .dispatch(
                "competitive_snapshot",
                args(json!({"competitors": ["up.example", "down.example"]})),
            )
            .await
            .unwrap();

        assert!(!outcome.degraded);
        assert_eq!(outcome.result["profiles"].as_array().unwrap().len(), 1);
        assert_eq!(outcome.result["failed"], json!(["down.example"]));
    }

    #[tokio::test]
    async fn test_competitive_snapshot_falls_back_to_baseline() {
        let collector = StubCollector::healthy();
        collector.fail_competitors.store(true, Ordering::SeqCst);
        let dispatcher = dispatcher_for(context_with(Arc::new(collector)));

        let outcome = dispatcher
            .dispatch("competitive_snapshot", Map::new())
            .await
            .unwrap();

        assert!(outcome.degraded);
        assert_eq!(
            outcome.result["profiles"].as_array().unwrap().len(),
            DEFAULT_COMPETITORS.len()
        );
    }

    #[tokio::test]
    async fn test_score_lead_is_table_driven() {
        let dispatcher = dispatcher_for(context_with(Arc::new(StubCollector::healthy())));

        let small = dispatcher
            .dispatch(
                "score_lead",
                args(json!({"company_size": "small", "engagement_score": 50})),
            )
            .await
            .unwrap();
        let enterprise = dispatcher
            .dispatch(
                "score_lead",
                args(json!({"company_size": "enterprise", "engagement_score": 50})),
            )
            .await
            .unwrap();

        let small_score = small.result["score"].as_f64().unwrap();
        let enterprise_score = enterprise.result["score"].as_f64().unwrap();
        assert!(enterprise_score > small_score);
        assert_eq!(enterprise.result["tier"], json!("hot"));

        // Empty store means neutral engagement weighting
        assert_eq!(small.result["engagement_weight"], json!(1.0));
    }

    #[tokio::test]
    async fn test_score_lead_rejects_unknown_size() {
        let dispatcher = dispatcher_for(context_with(Arc::new(StubCollector::healthy())));
        let err = dispatcher
            .dispatch("score_lead", args(json!({"company_size": "galactic"})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SchemaViolation");
    }

    #[test]
    fn test_builtin_registry_lists_all_operations() {
        let registry = builtin_registry(context_with(Arc::new(StubCollector::healthy()))).unwrap();
        let names: Vec<_> = registry.descriptors().iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "analyze_performance",
                "competitive_snapshot",
                "correlate_metrics",
                "forecast_change_impact",
                "score_lead",
            ]
        );
    }
}
