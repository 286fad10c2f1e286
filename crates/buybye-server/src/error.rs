use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use buybye_core::EngineError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit 4xx errors
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 400 through the `anyhow::Error` chain.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

/// Carries an explicit HTTP 404 through the `anyhow::Error` chain.
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// Run faults (round limit, missing response, aborted query) are logged in
/// full and reach the caller only as a generic message.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    /// Construct a 404 Not Found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }
}

const GENERIC_FAILURE: &str = "Internal server error";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(b) = self.0.downcast_ref::<BadRequestError>() {
            let body = serde_json::json!({ "error": b.0.clone() });
            return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
        }
        if let Some(n) = self.0.downcast_ref::<NotFoundError>() {
            let body = serde_json::json!({ "error": n.0.clone() });
            return (StatusCode::NOT_FOUND, axum::Json(body)).into_response();
        }

        let (status, message) = if let Some(e) = self.0.downcast_ref::<EngineError>() {
            match e {
                EngineError::UnknownConcept(_) | EngineError::UnknownAction(_) => {
                    (StatusCode::NOT_FOUND, e.to_string())
                }
                EngineError::NotARecord(_) | EngineError::Json(_) => {
                    (StatusCode::BAD_REQUEST, e.to_string())
                }
                EngineError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "Request timed out".to_string())
                }
                EngineError::RoundLimitExceeded(_)
                | EngineError::NoResponse(_)
                | EngineError::QueryFailed { .. }
                | EngineError::UnboundVariable { .. }
                | EngineError::DuplicateConcept(_)
                | EngineError::DuplicateSync(_)
                | EngineError::EmptyWhen(_)
                | EngineError::QueryInThen { .. }
                | EngineError::ActionInWhere { .. }
                | EngineError::CollectOverwrites { .. }
                | EngineError::ConfigNotFound(_)
                | EngineError::Io(_)
                | EngineError::Yaml(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE.to_string())
                }
            }
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE.to_string())
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
