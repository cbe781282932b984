//! Catch-all handler: matches a registered resource, parses the request and runs the pipeline.

use crate::error::HttpError;
use crate::request::Request;
use crate::response::ResponseEnvelope;
use crate::service;
use crate::state::AppState;
use axum::{
    body::to_bytes,
    extract::{Request as HttpRequest, State},
    http::request::Parts,
    response::{IntoResponse, Response},
};

/// Envelope for requests rejected before a `Request` could be built.
fn rejected(parts: &Parts, err: &HttpError) -> Response {
    tracing::warn!(method = %parts.method, path = %parts.uri.path(), error = %err, "request rejected");
    let mut envelope = ResponseEnvelope::new();
    envelope.meta.method = parts.method.to_string();
    envelope.meta.url = parts.uri.to_string();
    envelope.set_status(err);
    envelope.into_response()
}

pub async fn dispatch(State(state): State<AppState>, request: HttpRequest) -> Response {
    let (parts, body) = request.into_parts();
    let Some(resource) = state.registry.find_matched(parts.uri.path()) else {
        return rejected(&parts, &HttpError::url_not_found());
    };

    let limit = resource.limits().largest_payload_size();
    let bytes = match to_bytes(body, usize::try_from(limit).unwrap_or(usize::MAX)).await {
        Ok(bytes) => bytes,
        Err(_) => return rejected(&parts, &HttpError::payload_too_big(limit)),
    };

    let request = match Request::parse(&parts, &bytes, resource.compiled_pattern(), resource.name()) {
        Ok(request) => request,
        Err(err) => return rejected(&parts, &err),
    };

    let envelope = service::process(&resource, request).await;
    if !envelope.is_ok() {
        tracing::warn!(
            resource = resource.name(),
            request_id = %envelope.meta.request_unique_id,
            status = envelope.meta.status_code,
            message = %envelope.meta.status_message,
            "request failed"
        );
    }
    envelope.into_response()
}
