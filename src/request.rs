//! Normalized inbound request: method class, version, query modifiers and decoded payload.

use crate::error::HttpError;
use axum::extract::Query;
use axum::http::{header, request::Parts, HeaderMap, Method};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

pub const MAX_URL_LENGTH: usize = 2048;
pub const ALLOWED_ACCEPT_VALUES: [&str; 2] = ["application/json", "*/*"];
pub const REQUEST_CONTENT_TYPE: &str = "application/json";

/// Named group holding the resource URL.
pub const URL_GROUP: &str = "url";
/// Named group holding the API version.
pub const VERSION_GROUP: &str = "version";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodKind {
    Get,
    Delete,
    Insert,
    Update,
    Cors,
    Unsupported,
}

impl MethodKind {
    pub fn classify(method: &Method) -> Self {
        match *method {
            Method::GET => MethodKind::Get,
            Method::DELETE => MethodKind::Delete,
            Method::POST | Method::PUT => MethodKind::Insert,
            Method::PATCH => MethodKind::Update,
            Method::OPTIONS => MethodKind::Cors,
            _ => MethodKind::Unsupported,
        }
    }

    pub fn is_mutation(self) -> bool {
        matches!(self, MethodKind::Delete | MethodKind::Insert | MethodKind::Update)
    }
}

/// One decoded payload object and the error attached to it during validation.
#[derive(Clone, Debug, PartialEq)]
pub struct PayloadItem {
    pub object: Map<String, Value>,
    pub error: Option<HttpError>,
}

impl PayloadItem {
    pub fn new(object: Map<String, Value>) -> Self {
        PayloadItem { object, error: None }
    }
}

#[derive(Clone, Debug)]
pub struct Request {
    pub unique_id: String,
    pub method: Method,
    pub kind: MethodKind,
    pub path: String,
    /// Value of the `url` capture group.
    pub url: String,
    /// Full request URI as received, echoed in `_meta.url`.
    pub full_url: String,
    pub version: String,
    pub resource_name: String,
    pub headers: HeaderMap,
    /// Raw `where` query parameter, interpreted by the storage driver.
    pub filter: String,
    pub sort: String,
    pub projection: BTreeMap<String, bool>,
    pub page: u64,
    /// `None` when the client did not pass `per_page`.
    pub per_page: Option<u64>,
    pub content_length: Option<u64>,
    pub body_len: usize,
    pub items: Vec<PayloadItem>,
}

pub fn new_unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl Request {
    pub fn parse(
        parts: &Parts,
        body: &[u8],
        pattern: &Regex,
        resource_name: &str,
    ) -> Result<Self, HttpError> {
        let path = parts.uri.path().to_string();
        if path.len() > MAX_URL_LENGTH {
            return Err(HttpError::url_too_big(MAX_URL_LENGTH));
        }
        check_accept(&parts.headers)?;

        let kind = MethodKind::classify(&parts.method);
        if kind.is_mutation() {
            check_content_type(&parts.headers)?;
        }

        let captures = pattern
            .captures(&path)
            .ok_or_else(|| HttpError::unable_to_parse_request("path does not match resource pattern"))?;
        let url = captures
            .name(URL_GROUP)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| HttpError::unable_to_parse_request("pattern has no url group match"))?;
        let version = captures
            .name(VERSION_GROUP)
            .map(|m| m.as_str().trim_matches(|c: char| c == '/' || c.is_whitespace()).to_string())
            .unwrap_or_default();

        let query: HashMap<String, String> = Query::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        let param = |name: &str| query.get(name).map(|v| v.trim().to_string()).unwrap_or_default();

        let projection = parse_projection(&param("projection"))?;
        let per_page = query
            .get("per_page")
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(parse_count);

        let content_length = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        Ok(Request {
            unique_id: new_unique_id(),
            method: parts.method.clone(),
            kind,
            path,
            url,
            full_url: parts.uri.to_string(),
            version,
            resource_name: resource_name.to_string(),
            headers: parts.headers.clone(),
            filter: param("where"),
            sort: param("sort"),
            projection,
            page: parse_count(&param("page")),
            per_page,
            content_length,
            body_len: body.len(),
            items: decode_items(body)?,
        })
    }

    pub fn has_where(&self) -> bool {
        !self.filter.is_empty()
    }

    pub fn has_sort(&self) -> bool {
        !self.sort.is_empty()
    }

    pub fn has_page(&self) -> bool {
        self.page > 0
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn origin(&self) -> Option<&str> {
        self.header(header::ORIGIN)
    }
}

/// Parse failures count as zero.
fn parse_count(value: &str) -> u64 {
    value.trim().parse().unwrap_or(0)
}

fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}

fn check_accept(headers: &HeaderMap) -> Result<(), HttpError> {
    let accepted = headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(media_type)
        .any(|m| ALLOWED_ACCEPT_VALUES.iter().any(|allowed| m.eq_ignore_ascii_case(allowed)));
    if accepted {
        Ok(())
    } else {
        Err(HttpError::invalid_accept_header(&ALLOWED_ACCEPT_VALUES))
    }
}

fn check_content_type(headers: &HeaderMap) -> Result<(), HttpError> {
    let matches = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type)
        .is_some_and(|m| m.eq_ignore_ascii_case(REQUEST_CONTENT_TYPE));
    if matches {
        Ok(())
    } else {
        Err(HttpError::invalid_content_type_header(REQUEST_CONTENT_TYPE))
    }
}

fn projection_flag(field: &str, value: &Value) -> Result<bool, HttpError> {
    let flag = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
            _ => None,
        },
        _ => None,
    };
    flag.ok_or_else(|| HttpError::malformed_projection(format!("invalid value for field '{}'", field)))
}

fn parse_projection(raw: &str) -> Result<BTreeMap<String, bool>, HttpError> {
    if raw.is_empty() {
        return Ok(BTreeMap::new());
    }
    match serde_json::from_str::<Value>(raw).map_err(HttpError::malformed_projection)? {
        Value::Object(map) => map
            .iter()
            .map(|(field, value)| Ok((field.clone(), projection_flag(field, value)?)))
            .collect(),
        _ => Err(HttpError::malformed_projection("projection must be a JSON object")),
    }
}

fn decode_items(body: &[u8]) -> Result<Vec<PayloadItem>, HttpError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    match serde_json::from_slice::<Value>(body).map_err(HttpError::cannot_decode_payload)? {
        Value::Object(object) => Ok(vec![PayloadItem::new(object)]),
        Value::Array(values) => values
            .into_iter()
            .map(|value| match value {
                Value::Object(object) => Ok(PayloadItem::new(object)),
                _ => Err(HttpError::cannot_decode_payload("array items must be objects")),
            })
            .collect(),
        _ => Err(HttpError::cannot_decode_payload("expected an object or an array of objects")),
    }
}
