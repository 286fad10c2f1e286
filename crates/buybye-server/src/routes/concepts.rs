use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use buybye_core::value::as_record;
use buybye_core::{Record, Route, Value};

use crate::error::AppError;
use crate::state::AppState;

/// POST {base}/{Concept}/{op} (or any other path under the base).
///
/// Included routes call the operation directly. Everything else is reified
/// as `Requesting.request` and answered by the rules. A reply carrying
/// `error` is sent with 400.
pub async fn call_concept(
    State(app): State<AppState>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let route = format!("{}/{}", app.routes.base_url(), path);
    let args = parse_body(&body)?;

    match app.routes.resolve(&route) {
        Some(Route::Direct(action)) => {
            tracing::debug!(%action, "direct call");
            match app.engine.call_direct(&action, &args).await? {
                Ok(value) => Ok(Json(value).into_response()),
                Err(failure) => Err(AppError::bad_request(failure.0)),
            }
        }
        Some(Route::Request { path }) => {
            let outcome = app.engine.handle_request(&path, args).await;
            let payload = outcome.result?;
            Ok(reply(payload))
        }
        None => Err(AppError::not_found(format!("no route for {route}"))),
    }
}

fn parse_body(body: &[u8]) -> Result<Record, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Record::new());
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request(format!("invalid JSON body: {e}")))?;
    Ok(as_record(value)?)
}

fn reply(payload: Record) -> Response {
    let status = if payload.contains_key("error") {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (status, Json(Value::Object(payload))).into_response()
}
