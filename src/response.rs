//! Uniform response envelope: `{"_items": [...], "_meta": {...}}`.

use crate::error::HttpError;
use crate::request::{new_unique_id, Request};
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

pub const RESPONSE_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const RESPONSE_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";
pub const REQUEST_UNIQUE_ID_HEADER: &str = "x-request-unique-id";
pub const VERSION_HEADER: &str = "x-api-version";

#[derive(Clone, Debug, Serialize)]
pub struct Meta {
    pub status_code: u16,
    pub status_message: String,
    pub total: u64,
    pub total_time_ms: f64,
    pub page: u64,
    pub per_page: u64,
    pub request_unique_id: String,
    pub version: String,
    pub method: String,
    pub url: String,
}

impl Default for Meta {
    fn default() -> Self {
        let ok = HttpError::ok();
        Meta {
            status_code: ok.status().as_u16(),
            status_message: ok.message().to_string(),
            total: 0,
            total_time_ms: 0.0,
            page: 0,
            per_page: 0,
            request_unique_id: String::new(),
            version: String::new(),
            method: String::new(),
            url: String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "_items")]
    pub items: Vec<Map<String, Value>>,
    #[serde(rename = "_meta")]
    pub meta: Meta,
    /// Extra headers written by the pipeline (CORS).
    #[serde(skip)]
    pub headers: HeaderMap,
}

impl ResponseEnvelope {
    /// Envelope with status OK and a fresh request ID.
    pub fn new() -> Self {
        let mut envelope = ResponseEnvelope::default();
        envelope.meta.request_unique_id = new_unique_id();
        envelope
    }

    pub fn for_request(request: &Request) -> Self {
        let mut envelope = ResponseEnvelope::default();
        envelope.meta.request_unique_id = request.unique_id.clone();
        envelope.meta.version = request.version.clone();
        envelope.meta.method = request.method.to_string();
        envelope.meta.url = request.full_url.clone();
        envelope
    }

    pub fn set_status(&mut self, error: &HttpError) {
        self.meta.status_code = error.status().as_u16();
        self.meta.status_message = error.message().to_string();
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.meta.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn is_ok(&self) -> bool {
        self.status() == StatusCode::OK
    }

    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        let value = HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("null"));
        self.headers.insert(name, value);
    }
}

/// `_meta` object attached to an item that carries its own error.
pub fn item_meta(error: &HttpError) -> Value {
    serde_json::json!({
        "status_code": error.status().as_u16(),
        "status_message": error.message(),
    })
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match serde_json::to_vec(&self) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "response envelope serialization failed");
                let err = HttpError::internal_server_error(e);
                serde_json::json!({
                    "_items": [],
                    "_meta": {"status_code": err.status().as_u16(), "status_message": err.message()}
                })
                .to_string()
                .into_bytes()
            }
        };

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.extend(self.headers);
        headers.insert(
            HeaderName::from_static(REQUEST_UNIQUE_ID_HEADER),
            header_value(&self.meta.request_unique_id),
        );
        headers.insert(HeaderName::from_static(VERSION_HEADER), header_value(&self.meta.version));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(RESPONSE_CONTENT_TYPE));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(RESPONSE_CACHE_CONTROL));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let mut envelope = ResponseEnvelope::new();
        envelope.set_status(&HttpError::object_not_found());
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["_items"], serde_json::json!([]));
        assert_eq!(value["_meta"]["status_code"], 404);
        assert_eq!(value["_meta"]["status_message"], "ObjectNotFound: Object not found");
        assert!(value.get("headers").is_none());
    }

    #[test]
    fn test_response_headers() {
        let mut envelope = ResponseEnvelope::new();
        envelope.meta.version = "v1".into();
        let id = envelope.meta.request_unique_id.clone();
        let response = envelope.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[VERSION_HEADER], "v1");
        assert_eq!(response.headers()[REQUEST_UNIQUE_ID_HEADER], id.as_str());
        assert_eq!(response.headers()[header::CONTENT_TYPE], RESPONSE_CONTENT_TYPE);
        assert_eq!(response.headers()[header::CACHE_CONTROL], RESPONSE_CACHE_CONTROL);
    }
}
