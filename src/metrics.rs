//! Prometheus request metrics and the `/metrics` exposition endpoint.

use crate::AppState;
use crate::api::error::err_response;
use axum::extract::{Extension, MatchedPath, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

const DURATION_BUCKETS: [f64; 5] = [0.5, 1.0, 2.0, 3.0, 5.0];
const LABELS: [&str; 3] = ["path", "code", "method"];

/// Request counter and latency histogram, labelled by route template,
/// status code and method. Each instance owns its registry.
pub struct HttpMetrics {
    registry: Registry,
    requests: CounterVec,
    duration: HistogramVec,
}

impl HttpMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = CounterVec::new(
            Opts::new("http_requests_total", "Count of HTTP requests"),
            &LABELS,
        )?;
        registry.register(Box::new(requests.clone()))?;

        let duration = HistogramVec::new(
            HistogramOpts::new("http_duration_seconds", "Duration of HTTP requests")
                .buckets(DURATION_BUCKETS.to_vec()),
            &LABELS,
        )?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            requests,
            duration,
        })
    }

    pub fn observe(&self, path: &str, status: StatusCode, method: &str, seconds: f64) {
        let path = path.to_lowercase();
        let method = method.to_lowercase();
        let labels = [path.as_str(), status.as_str(), method.as_str()];

        self.requests.with_label_values(&labels).inc();
        self.duration.with_label_values(&labels).observe(seconds);
    }

    /// Text exposition format of everything registered.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

/// Records every routed request. Unrouted requests share one label so
/// arbitrary URLs cannot grow the label set.
pub async fn track_metrics(
    State(metrics): State<Arc<HttpMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = req.method().clone();
    let started = Instant::now();

    let response = next.run(req).await;

    metrics.observe(
        &path,
        response.status(),
        method.as_str(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// GET /metrics
pub async fn metrics_handler(Extension(state): Extension<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to encode metrics");
            err_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}
