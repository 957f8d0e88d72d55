//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vtrim_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vtrim_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vtrim_http_requests_in_flight";

    // Job metrics (recorded by the media crate)
    pub use vtrim_media::jobs::names::{FFMPEG_DURATION, JOBS_TOTAL};
}

fn describe_metrics() {
    describe_counter!(names::HTTP_REQUESTS_TOTAL, "HTTP requests by method, route and status");
    describe_histogram!(names::HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency");
    describe_gauge!(names::HTTP_REQUESTS_IN_FLIGHT, "HTTP requests being served");
    describe_counter!(names::JOBS_TOTAL, "Media jobs by kind and terminal state");
    describe_histogram!(names::FFMPEG_DURATION, "Wall time of FFmpeg runs by job kind");
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", route.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Route label for a request: the matched route template, so artifact paths
/// and unknown URLs do not each create a new series.
fn route_label(matched: Option<&MatchedPath>) -> String {
    matched
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let route = route_label(request.extensions().get::<MatchedPath>());
    let start = Instant::now();

    // Increment in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    // Decrement in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &route, status, duration);

    response
}
