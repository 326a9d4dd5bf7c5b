//! Request-scoped middleware: correlation-aware spans, error normalization,
//! panic recovery, and the API-key and rate-limit guards.

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bookshelf_authz::{key_prefix, ApiKeyGuard, AuthzError};
use tracing::Span;

use crate::error::{AppError, ErrorBody};
use crate::rate_limit::RateLimiter;

/// Correlation header, set (or echoed) by the request-id layers
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Read the correlation id assigned to a request
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Root span for every request, carrying the correlation id. Headers are
/// deliberately left out: they can carry API keys.
pub fn make_request_span(request: &Request) -> Span {
    tracing::info_span!(
        "http_request",
        request_id = %request_id(request.headers()),
        method = %request.method(),
        uri = %request.uri(),
    )
}

/// Render every error response in the shared `ErrorBody` shape and stamp
/// it with the request's correlation id.
///
/// Errors raised through [`AppError`] carry their body as a response
/// extension; bare framework errors (unknown route, method not allowed,
/// timeout) get a generic body for their status.
pub async fn normalize_errors(request: Request, next: Next) -> Response {
    let request_id = request_id(request.headers()).to_owned();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let error_body = match parts.extensions.remove::<ErrorBody>() {
        Some(error_body) => error_body,
        // Someone already rendered JSON on purpose; leave it alone.
        None if is_json(&parts.headers) => return Response::from_parts(parts, body),
        None => ErrorBody::for_status(status),
    }
    .with_request_id(request_id.clone());

    if status.is_server_error() {
        tracing::error!(
            request_id = %request_id,
            status_code = status.as_u16(),
            error_type = %error_body.error,
            method = %method,
            path = %path,
            "HTTP error occurred"
        );
    } else {
        tracing::warn!(
            request_id = %request_id,
            status_code = status.as_u16(),
            error_type = %error_body.error,
            method = %method,
            path = %path,
            message = %error_body.message,
            "HTTP error occurred"
        );
    }

    let bytes = serde_json::to_vec(&error_body).unwrap_or_default();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(bytes))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Panic handler for `CatchPanicLayer`: log and answer 500.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "panic recovered while handling request");

    AppError::internal(format!("handler panicked: {detail}")).into_response()
}

/// Admit the request only if the process-wide token bucket has a token.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.try_acquire() {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(
                path = %request.uri().path(),
                user_agent = ?request.headers().get(header::USER_AGENT),
                "Rate limit exceeded"
            );
            let seconds = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            AppError::too_many_requests("Rate limit exceeded", seconds).into_response()
        }
    }
}

/// Reject requests without a valid API key when the guard is enabled.
pub async fn require_api_key(
    State(guard): State<Arc<ApiKeyGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(guard.header())
        .and_then(|value| value.to_str().ok());

    match guard.check(presented) {
        Ok(()) => next.run(request).await,
        Err(error) => {
            match error {
                AuthzError::MissingKey => {
                    tracing::warn!(path = %request.uri().path(), "Missing API key");
                }
                AuthzError::InvalidKey => {
                    tracing::warn!(
                        path = %request.uri().path(),
                        api_key_prefix = %key_prefix(presented.unwrap_or_default()),
                        "Invalid API key"
                    );
                }
            }
            AppError::unauthorized(error.to_string()).into_response()
        }
    }
}
