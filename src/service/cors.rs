//! CORS negotiation against the resource's per-operation origin allow-lists.

use crate::error::HttpError;
use crate::request::{MethodKind, Request};
use crate::resource::Resource;
use crate::response::ResponseEnvelope;
use axum::http::header;

/// Writes the CORS headers. Non-preflight calls fail when the method is not allowed for the origin.
pub fn negotiate(resource: &Resource, request: &Request, envelope: &mut ResponseEnvelope) -> Result<(), HttpError> {
    let Some(cors) = resource.cors() else {
        return Ok(());
    };
    let origin = request.origin().unwrap_or_default();
    let allowed = cors.allowed_methods(origin);
    let allowed_text = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
    envelope.set_header(header::ACCESS_CONTROL_ALLOW_METHODS, &allowed_text);

    let preflight = request.kind == MethodKind::Cors;
    let requested = if preflight {
        request.header(header::ACCESS_CONTROL_REQUEST_METHOD).unwrap_or_default().trim()
    } else {
        request.method.as_str()
    };
    let permitted = allowed.iter().any(|m| m.as_str().eq_ignore_ascii_case(requested));
    envelope.set_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, if permitted { origin } else { "null" });

    tracing::debug!(origin, requested, permitted, "cors negotiated");
    if !preflight && !permitted {
        return Err(HttpError::method_not_allowed());
    }
    Ok(())
}
