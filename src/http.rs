//! HTTP status and metrics surface: `GET /status` (JSON snapshot) and
//! `GET /metrics` (Prometheus text exposition), running alongside the
//! pipeline and sharing its cancellation token.

use crate::core::benchmark::BenchmarkRegistry;
use crate::core::status::StatusSnapshot;
use crate::filters::FilterCounters;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct AppState {
    status: Arc<RwLock<StatusSnapshot>>,
    benchmark: Arc<BenchmarkRegistry>,
    input_names: Arc<Vec<String>>,
    filter_counters: Arc<Vec<Arc<FilterCounters>>>,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.read().unwrap().clone())
}

/// Builds a fresh `prometheus::Registry` each scrape and seeds it from the
/// live atomics in `BenchmarkRegistry`/`FilterCounters` — label sets (filter
/// names, rule names) are only known at runtime, so metrics are registered
/// per request rather than once at startup.
async fn metrics_handler(State(state): State<AppState>) -> String {
    let registry = Registry::new();

    let input_generated = IntCounterVec::new(Opts::new("ll_input_generated", "messages accepted by an input"), &["input"]).unwrap();
    registry.register(Box::new(input_generated.clone())).ok();
    for name in state.input_names.iter() {
        if let Some(counter) = state.benchmark.get(name) {
            input_generated.with_label_values(&[name]).inc_by(counter.processed);
        }
    }

    let filters_input = IntCounterVec::new(Opts::new("ll_filters_input", "messages read by a filter stage"), &["filter"]).unwrap();
    let filters_output = IntCounterVec::new(Opts::new("ll_filters_output", "messages forwarded by a filter stage"), &["filter"]).unwrap();
    let regexp_matches = IntCounterVec::new(
        Opts::new("ll_filters_regexp_matches", "per-rule match counts for the regexp filter"),
        &["filter", "rule"],
    )
    .unwrap();
    let regexp_classify_matches = IntCounterVec::new(
        Opts::new("ll_filters_regexp_classify_matches", "per-rule match counts for the regexp_classify filter"),
        &["filter", "rule"],
    )
    .unwrap();
    registry.register(Box::new(filters_input.clone())).ok();
    registry.register(Box::new(filters_output.clone())).ok();
    registry.register(Box::new(regexp_matches.clone())).ok();
    registry.register(Box::new(regexp_classify_matches.clone())).ok();

    for counters in state.filter_counters.iter() {
        filters_input
            .with_label_values(&[&counters.name])
            .inc_by(counters.input.load(std::sync::atomic::Ordering::Relaxed));
        filters_output
            .with_label_values(&[&counters.name])
            .inc_by(counters.output.load(std::sync::atomic::Ordering::Relaxed));

        let target = if counters.plugin == "regexp_classify" { &regexp_classify_matches } else { &regexp_matches };
        for (rule, count) in counters.rule_matches.lock().unwrap().iter() {
            target.with_label_values(&[&counters.name, rule]).inc_by(*count);
        }
    }

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).ok();
    String::from_utf8(buffer).unwrap_or_default()
}

/// Serves `/status` and `/metrics` on `:port` until `cancel` fires.
pub async fn serve(
    port: u16,
    status: Arc<RwLock<StatusSnapshot>>,
    benchmark: Arc<BenchmarkRegistry>,
    input_names: Vec<String>,
    filter_counters: Vec<Arc<FilterCounters>>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let state = AppState {
        status,
        benchmark,
        input_names: Arc::new(input_names),
        filter_counters: Arc::new(filter_counters),
    };

    let app = Router::new()
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}
