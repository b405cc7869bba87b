use axum::{
    body::{to_bytes, Body},
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value as JsonValue;

use crate::error::Error;

/// Largest body the guard will buffer.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub const BAD_JSON_MESSAGE: &str = "Bad JSON received";

/// The request body, already parsed by [`check_json_is_valid`].
#[derive(Debug, Clone)]
pub struct JsonBody(pub JsonValue);

/// Rejects bodies that are not syntactically valid JSON with a 400 before
/// any field validation runs. The parsed value is left in the request
/// extensions for the handler.
pub async fn check_json_is_valid(req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "could not read request body");
            return Error::MalformedPayload(BAD_JSON_MESSAGE.to_string()).into_response();
        }
    };
    let value = match serde_json::from_slice::<JsonValue>(&bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "rejected malformed json body");
            return Error::MalformedPayload(BAD_JSON_MESSAGE.to_string()).into_response();
        }
    };
    parts.extensions.insert(JsonBody(value));
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
