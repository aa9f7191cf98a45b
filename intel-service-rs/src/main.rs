// intel-service-rs/src/main.rs
// Main entry point for intel-service-rs
// Serves the intelligence operation surface over newline-delimited JSON on
// stdin/stdout, with TTL caching, graceful degradation, and health export.

use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use insight_analytics_rs::{CorrelationEngine, ImpactEstimator, ImpactWeights, MetricsStore};
use resilience_rs::{CacheSweeper, HealthRegistry, TtlCache};

mod collector;
mod dispatcher;
mod operations;
mod registry;
mod schema;

use collector::{BaselineCollector, DataCollector, HttpCollector, HttpCollectorConfig};
use dispatcher::{Dispatcher, DispatcherConfig};
use operations::OperationContext;

// Track service start time for uptime reporting
static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// One request line on the wire
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum ServiceRequest {
    Call {
        name: String,
        #[serde(default)]
        args: Map<String, Value>,
    },
    List,
    Health,
}

fn env_secs(name: &str, default: u64) -> Duration {
    let value = env::var(name)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or_else(|| {
            if env::var(name).is_ok() {
                log::warn!("ignoring invalid {} value, using {}s", name, default);
            }
            default
        });
    Duration::from_secs(value)
}

fn build_collector() -> Arc<dyn DataCollector> {
    match env::var("INTEL_COLLECTOR_URL") {
        Ok(base_url) => {
            let config = HttpCollectorConfig {
                base_url,
                api_key: env::var("INTEL_COLLECTOR_KEY").ok(),
                timeout: env_secs("INTEL_COLLECTOR_TIMEOUT_SECS", 10),
            };
            match HttpCollector::new(config) {
                Ok(collector) => {
                    log::info!("using http collector");
                    return Arc::new(collector);
                }
                Err(e) => {
                    log::error!("failed to build http collector: {}", e);
                    log::warn!("falling back to baseline collector");
                }
            }
        }
        Err(_) => {
            log::warn!("INTEL_COLLECTOR_URL not set, using baseline collector");
        }
    }
    Arc::new(BaselineCollector)
}

async fn handle_line(dispatcher: &Dispatcher, line: &str) -> Value {
    let request: ServiceRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            return json!({
                "ok": false,
                "code": "BadRequest",
                "message": format!("malformed request: {}", e),
            });
        }
    };

    match request {
        ServiceRequest::Call { name, args } => match dispatcher.dispatch(&name, args).await {
            Ok(outcome) => json!({
                "ok": true,
                "result": outcome.result,
                "degraded": outcome.degraded,
            }),
            Err(e) => json!({
                "ok": false,
                "code": e.code(),
                "message": e.to_string(),
            }),
        },
        ServiceRequest::List => json!({
            "ok": true,
            "result": {"operations": dispatcher.list_operations()},
            "degraded": false,
        }),
        ServiceRequest::Health => {
            let snapshot = dispatcher.health_snapshot();
            json!({
                "ok": true,
                "result": {
                    "uptime_seconds": START_TIME.elapsed().as_secs(),
                    "health": snapshot,
                },
                "degraded": false,
            })
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Initialize start time
    let _ = *START_TIME;

    // Wire the shared state: metrics history, analytics, cache, health
    let store_capacity = env::var("INTEL_METRICS_CAPACITY")
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(insight_analytics_rs::store::DEFAULT_CAPACITY);
    let store = Arc::new(MetricsStore::new(store_capacity));
    let engine = CorrelationEngine::new(store.clone());
    let estimator = Arc::new(ImpactEstimator::new(engine.clone(), ImpactWeights::default()));

    let context = OperationContext {
        collector: build_collector(),
        store,
        engine,
        estimator,
    };

    let registry = operations::builtin_registry(context)?;
    log::info!("registered {} operations", registry.len());

    let cache = Arc::new(TtlCache::new("intel"));
    let health = Arc::new(HealthRegistry::new());
    let config = DispatcherConfig {
        default_timeout: Some(env_secs("INTEL_OPERATION_TIMEOUT_SECS", 30)),
        ..DispatcherConfig::default()
    };
    let dispatcher = Arc::new(Dispatcher::new(registry, cache.clone(), health, config));

    // Background expiry sweep, stopped on shutdown
    let sweeper = CacheSweeper::spawn(cache, env_secs("INTEL_SWEEP_INTERVAL_SECS", 300));

    log::info!("intel-service listening on stdin");
    println!("{}", json!({"ok": true, "result": {"ready": true}, "degraded": false}));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => {
                        let response = handle_line(&dispatcher, line.trim()).await;
                        let mut payload = serde_json::to_vec(&response)?;
                        payload.push(b'\n');
                        stdout.write_all(&payload).await?;
                        stdout.flush().await?;
                    }
                    None => {
                        log::info!("stdin closed, shutting down");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupt received, shutting down");
                break;
            }
        }
    }

    sweeper.shutdown().await;
    let snapshot = dispatcher.health_snapshot();
    log::info!(
        "final cache stats: {} hits, {} misses over {}s uptime",
        snapshot.cache.hits,
        snapshot.cache.misses,
        START_TIME.elapsed().as_secs()
    );

    Ok(())
}
