use std::time::Instant;
use warp::http::{Method, StatusCode};
use warp::path::FullPath;
use warp::reject::Rejection;
use warp::reply::{Reply, Response};
use warp::Filter;

struct RequestStart {
    path: String,
    method: String,
    at: Instant,
}

/// Wraps `filter` so every request it answers is logged with its status and latency.
pub fn with_request_logging<F, T>(
    filter: F,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone
where
    F: Filter<Extract = (T,), Error = Rejection> + Clone + Send + Sync + 'static,
    T: Reply,
{
    warp::any()
        .and(warp::path::full())
        .and(warp::method())
        .map(|path: FullPath, method: Method| {
            tracing::debug!(path = %path.as_str(), method = %method, "incoming request");
            RequestStart {
                path: path.as_str().to_string(),
                method: method.to_string(),
                at: Instant::now(),
            }
        })
        .and(filter)
        .map(|start: RequestStart, reply: T| {
            let response = reply.into_response();
            let metrics = RequestMetrics::new(
                start.path,
                start.method,
                response.status().as_u16(),
                start.at.elapsed().as_millis(),
            );
            log_response(
                response.status(),
                &metrics.path,
                &metrics.method,
                metrics.duration_ms,
            );
            metrics.log();
            response
        })
}

/// Logs a finished request at a level chosen by its status class.
pub fn log_response(status: StatusCode, path: &str, method: &str, duration_ms: u128) {
    if status.is_client_error() {
        tracing::warn!(
            status = status.as_u16(),
            path = %path,
            method = %method,
            duration_ms = duration_ms,
            "client error"
        );
    } else if status.is_server_error() {
        tracing::error!(
            status = status.as_u16(),
            path = %path,
            method = %method,
            duration_ms = duration_ms,
            "server error"
        );
    } else {
        tracing::info!(
            status = status.as_u16(),
            path = %path,
            method = %method,
            duration_ms = duration_ms,
            "response sent"
        );
    }
}

#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub path: String,
    pub method: String,
    pub status: u16,
    pub duration_ms: u128,
}

impl RequestMetrics {
    pub fn new(path: String, method: String, status: u16, duration_ms: u128) -> Self {
        Self {
            path,
            method,
            status,
            duration_ms,
        }
    }

    pub fn log(&self) {
        tracing::trace!(
            path = %self.path,
            method = %self.method,
            status = self.status,
            duration_ms = self.duration_ms,
            "request metrics"
        );
    }
}
