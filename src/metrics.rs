//! Observability metrics for the policy decision point.
//!
//! Collects enforcement decisions, document validation failures, recorded
//! violations, ingestion runs, background task executions, and HTTP traffic.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tracing::{debug, error};

/// Core metrics registry for decision-point observability
pub struct PdpMetricsRegistry {
    /// Prometheus registry for all metrics
    pub registry: Registry,

    // === Decision Metrics ===
    /// Enforcement decisions by outcome and requested access level
    pub decisions_total: IntCounterVec,
    /// Enforcement denials by error kind
    pub access_denials_total: IntCounterVec,
    /// Policy document validation failures by sub-reason
    pub parse_failures_total: IntCounterVec,
    /// Violation records appended, by access level
    pub violations_recorded_total: IntCounterVec,

    // === Lifecycle Metrics ===
    /// Policies ingested at startup, by strategy
    pub policies_ingested_total: IntCounterVec,
    /// Background task executions
    pub background_tasks_total: IntCounterVec,

    // === HTTP Request Metrics ===
    /// HTTP requests by method, endpoint, and status
    pub http_requests_total: IntCounterVec,
    /// HTTP request duration by endpoint
    pub http_request_duration: HistogramVec,
    /// Concurrent HTTP requests
    pub http_requests_in_flight: IntGauge,
}

impl PdpMetricsRegistry {
    /// Create a new metrics registry with all collectors initialized
    pub fn new() -> Self {
        let registry = Registry::new();

        let decisions_total = IntCounterVec::new(
            Opts::new("pdp_decisions_total", "Total enforcement decisions"),
            &["outcome", "access"],
        )
        .expect("Failed to create decisions_total metric");

        let access_denials_total = IntCounterVec::new(
            Opts::new("pdp_access_denials_total", "Total enforcement denials"),
            &["kind"],
        )
        .expect("Failed to create access_denials_total metric");

        let parse_failures_total = IntCounterVec::new(
            Opts::new(
                "pdp_parse_failures_total",
                "Total policy document validation failures",
            ),
            &["reason"],
        )
        .expect("Failed to create parse_failures_total metric");

        let violations_recorded_total = IntCounterVec::new(
            Opts::new(
                "pdp_violations_recorded_total",
                "Total violation records appended",
            ),
            &["access"],
        )
        .expect("Failed to create violations_recorded_total metric");

        let policies_ingested_total = IntCounterVec::new(
            Opts::new(
                "pdp_policies_ingested_total",
                "Total policies ingested at startup",
            ),
            &["strategy"],
        )
        .expect("Failed to create policies_ingested_total metric");

        let background_tasks_total = IntCounterVec::new(
            Opts::new(
                "pdp_background_tasks_total",
                "Total background task executions",
            ),
            &["task_type", "result"],
        )
        .expect("Failed to create background_tasks_total metric");

        let http_requests_total = IntCounterVec::new(
            Opts::new("pdp_http_requests_total", "Total HTTP requests"),
            &["method", "endpoint", "status_code"],
        )
        .expect("Failed to create http_requests_total metric");

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "pdp_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "endpoint"],
        )
        .expect("Failed to create http_request_duration metric");

        let http_requests_in_flight = IntGauge::new(
            "pdp_http_requests_in_flight",
            "Number of HTTP requests currently being processed",
        )
        .expect("Failed to create http_requests_in_flight metric");

        let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(decisions_total.clone()),
            Box::new(access_denials_total.clone()),
            Box::new(parse_failures_total.clone()),
            Box::new(violations_recorded_total.clone()),
            Box::new(policies_ingested_total.clone()),
            Box::new(background_tasks_total.clone()),
            Box::new(http_requests_total.clone()),
            Box::new(http_request_duration.clone()),
            Box::new(http_requests_in_flight.clone()),
        ];

        for metric in metrics {
            if let Err(e) = registry.register(metric) {
                error!("Failed to register metric: {}", e);
            }
        }

        Self {
            registry,
            decisions_total,
            access_denials_total,
            parse_failures_total,
            violations_recorded_total,
            policies_ingested_total,
            background_tasks_total,
            http_requests_total,
            http_request_duration,
            http_requests_in_flight,
        }
    }

    /// Generate Prometheus metrics output
    pub fn gather_metrics(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for PdpMetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global decision-point metrics registry instance
pub static PDP_METRICS: Lazy<PdpMetricsRegistry> = Lazy::new(PdpMetricsRegistry::new);

/// Metrics middleware for the decision point
pub async fn pdp_metrics_middleware(req: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map_or("unknown".to_string(), |p| {
            normalize_path_for_cardinality(p.as_str())
        });

    PDP_METRICS.http_requests_in_flight.inc();

    let response = next.run(req).await;

    PDP_METRICS.http_requests_in_flight.dec();

    let duration = start_time.elapsed();
    let status_code = response.status();

    PDP_METRICS
        .http_requests_total
        .with_label_values(&[
            method.as_str(),
            &path,
            &status_code.as_u16().to_string(),
        ])
        .inc();

    PDP_METRICS
        .http_request_duration
        .with_label_values(&[method.as_str(), &path])
        .observe(duration.as_secs_f64());

    debug!(
        method = %method,
        path = %path,
        status = %status_code,
        duration_ms = %duration.as_millis(),
        "HTTP request processed"
    );

    response
}

/// Normalize path for metrics to prevent cardinality explosion
fn normalize_path_for_cardinality(path: &str) -> String {
    match path {
        p if p.starts_with("/v1/policies/") => "/v1/policies/:id".to_string(),
        p if p.starts_with("/v1/policies") => "/v1/policies".to_string(),
        p if p.starts_with("/v1/violations") => "/v1/violations".to_string(),
        p if p.starts_with("/health") => "/health".to_string(),
        p if p.starts_with("/metrics") => "/metrics".to_string(),
        p => p.to_string(),
    }
}

/// Prometheus metrics endpoint handler
pub async fn pdp_metrics_handler() -> impl IntoResponse {
    match PDP_METRICS.gather_metrics() {
        Ok(metrics) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            metrics,
        ),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Error gathering metrics: {e}"),
            )
        }
    }
}

/// Helper functions for decision-point metrics
pub struct PdpMetricsHelper;

impl PdpMetricsHelper {
    /// Record an enforcement decision
    pub fn record_decision(outcome: &str, access: &str) {
        PDP_METRICS
            .decisions_total
            .with_label_values(&[outcome, access])
            .inc();
    }

    /// Record an enforcement denial by error kind
    pub fn record_denial(kind: &str) {
        PDP_METRICS
            .access_denials_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a policy document validation failure
    pub fn record_parse_failure(reason: &str) {
        PDP_METRICS
            .parse_failures_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record an appended violation record
    pub fn record_violation(access: &str) {
        PDP_METRICS
            .violations_recorded_total
            .with_label_values(&[access])
            .inc();
    }

    /// Record policies ingested at startup
    pub fn record_ingestion(strategy: &str, count: usize) {
        PDP_METRICS
            .policies_ingested_total
            .with_label_values(&[strategy])
            .inc_by(count as u64);
    }

    /// Record a background task execution
    pub fn record_background_task(task_type: &str, result: &str) {
        PDP_METRICS
            .background_tasks_total
            .with_label_values(&[task_type, result])
            .inc();
    }
}
