use crate::protocol::error_shapes::openai_error_payload;

/// Error type shared by every layer of the bridge.
///
/// Only errors raised before the response headers commit are rendered as a
/// status-coded body; anything later is written in-band by the stream session.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("{0}")]
    Validation(String),
    #[error("upstream connection error: {0}")]
    Transport(String),
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    Upstream,
    ServerError,
}

impl BridgeError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::Validation(_) => ErrorCategory::InvalidRequest,
            BridgeError::Auth(_) => ErrorCategory::Authentication,
            BridgeError::Transport(_) | BridgeError::Upstream { .. } => ErrorCategory::Upstream,
            BridgeError::Config(_) | BridgeError::Internal(_) => ErrorCategory::ServerError,
        }
    }

    /// Upstream status code carried by this error, if any.
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            BridgeError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::Upstream => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error as (`status_code`, OpenAI-shaped JSON body).
#[must_use]
pub fn format_error(err: &BridgeError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    let status = http_status_for_category(cat);
    let body = openai_error_payload(cat, &err.to_string());
    (status, body)
}

impl axum::response::IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}
