// src/errors.rs - Error types shared by the gateway handlers and the client-side stores
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Everything a gateway handler can fail with. Rendered to the caller as `{ "error": message }`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or unusable environment configuration.
    #[error("{0}")]
    Config(String),

    /// Required input fields missing from the request.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Non-success response from an external service.
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("{0}")]
    Transport(String),

    #[error("Failed to parse upstream response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Upstream {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Failures surfaced by the account/trade state mirror to its immediate caller.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The execution engine answered with a non-success status.
    #[error("{0}")]
    Rejected(String),

    #[error("Invalid stream endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("TradeMirror::connect must be called from within a Tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Identity provider is not configured (IDENTITY_URL / IDENTITY_ANON_KEY)")]
    NotConfigured,

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse identity response: {0}")]
    Parse(#[from] serde_json::Error),
}
