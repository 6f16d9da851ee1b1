//! Prometheus metrics and the probe server.
//!
//! # Metrics
//! - `gateway_reconcile_total{result}` - reconciliations by outcome (`success`, `error`)
//! - `gateway_reconcile_errors_total{kind}` - failed reconciliations by error kind
//! - `gateway_export_actions_total{action}` - what successful reconciliations did
//! - `gateway_reconcile_duration_seconds` - reconciliation latency
//!
//! # Endpoints
//! - `GET /healthz` - process is up
//! - `GET /readyz` - first reconciliation has completed
//! - `GET /metrics` - Prometheus text format

use crate::error::ControllerError;
use crate::reconciler::SyncAction;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Controller metrics registry
pub struct Metrics {
    registry: Registry,
    reconcile_total: IntCounterVec,
    reconcile_errors: IntCounterVec,
    export_actions: IntCounterVec,
    reconcile_duration: Histogram,
}

impl Metrics {
    /// Create and register all controller metrics.
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconcile_total = IntCounterVec::new(
            Opts::new("reconcile_total", "Total ClusterInfo reconciliations").namespace("gateway"),
            &["result"],
        )?;
        let reconcile_errors = IntCounterVec::new(
            Opts::new("reconcile_errors_total", "Failed ClusterInfo reconciliations").namespace("gateway"),
            &["kind"],
        )?;
        let export_actions = IntCounterVec::new(
            Opts::new("export_actions_total", "Actions applied to the ClusterInfo export").namespace("gateway"),
            &["action"],
        )?;
        let reconcile_duration = Histogram::with_opts(
            HistogramOpts::new("reconcile_duration_seconds", "Duration of ClusterInfo reconciliations")
                .namespace("gateway")
                .buckets(DURATION_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(reconcile_errors.clone()))?;
        registry.register(Box::new(export_actions.clone()))?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        Ok(Self {
            registry,
            reconcile_total,
            reconcile_errors,
            export_actions,
            reconcile_duration,
        })
    }

    /// Record one reconciliation.
    pub fn observe(&self, result: &Result<SyncAction, ControllerError>, elapsed: Duration) {
        self.reconcile_duration.observe(elapsed.as_secs_f64());
        match result {
            Ok(action) => {
                self.reconcile_total.with_label_values(&["success"]).inc();
                self.export_actions.with_label_values(&[action.as_str()]).inc();
            }
            Err(e) => {
                self.reconcile_total.with_label_values(&["error"]).inc();
                self.reconcile_errors.with_label_values(&[e.kind()]).inc();
            }
        }
    }

    /// Current values in Prometheus text format
    pub fn encode(&self) -> Result<String, ControllerError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

/// State shared between the worker and the probe server
#[derive(Debug, Clone)]
pub struct ProbeState {
    ready: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
}

impl ProbeState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Mark the controller ready; stays ready afterwards.
    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            info!("First reconciliation completed, controller is ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Build the probe router
pub fn probe_routes(state: ProbeState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve probes and metrics on `addr` until the listener fails
pub async fn serve_probes(addr: SocketAddr, state: ProbeState) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Probe server listening on {}", addr);
    axum::serve(listener, probe_routes(state)).await?;
    Ok(())
}

async fn readyz(State(state): State<ProbeState>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics(State(state): State<ProbeState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
