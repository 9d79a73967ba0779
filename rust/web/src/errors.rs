//! Error reporting for the HTTP API.
//!
//! Every component error implements [`IntoErrorResponse`], which fixes its
//! status code, a machine-readable code such as `card_not_found`, and the
//! log level it is reported at.
use serde::{Deserialize, Serialize};
use std::fmt;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

/// Body of every non-2xx API response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error code, e.g. `invalid_state`
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        reply::with_status(reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Decides the log level an error is reported at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 4xx, part of normal play (clicking a matched card, a stale session)
    Client,
    /// 5xx
    Server,
    /// Shared state is no longer trustworthy
    Critical,
}

pub trait IntoErrorResponse {
    fn status_code(&self) -> StatusCode;

    fn error_code(&self) -> &'static str;

    fn error_message(&self) -> String;

    fn error_details(&self) -> Option<serde_json::Value> {
        None
    }

    fn severity(&self) -> ErrorSeverity {
        if self.status_code().is_server_error() {
            ErrorSeverity::Server
        } else {
            ErrorSeverity::Client
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        if let Some(details) = self.error_details() {
            ErrorResponse::with_details(self.error_code(), self.error_message(), details)
        } else {
            ErrorResponse::new(self.error_code(), self.error_message())
        }
    }

    /// Logs the error at its severity and renders it as JSON.
    fn into_http_response(self) -> Response
    where
        Self: Sized,
    {
        let status = self.status_code();
        let severity = self.severity();
        let error_response = self.to_error_response();

        match severity {
            ErrorSeverity::Client => tracing::info!(
                status = status.as_u16(),
                error = %error_response.error,
                message = %error_response.message,
                "client error"
            ),
            ErrorSeverity::Server => tracing::error!(
                status = status.as_u16(),
                error = %error_response.error,
                message = %error_response.message,
                "server error"
            ),
            ErrorSeverity::Critical => tracing::error!(
                status = status.as_u16(),
                error = %error_response.error,
                message = %error_response.message,
                critical = true,
                "critical error"
            ),
        }

        error_response.into_response(status)
    }
}

/// Rejects a request body that failed to parse.
pub fn bad_request(message: impl Into<String>) -> Response {
    ErrorResponse::new("bad_request", message).into_response(StatusCode::BAD_REQUEST)
}
