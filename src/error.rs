//! Typed errors: resource construction failures and per-request HTTP failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::backtrace::Backtrace;
use std::fmt;
use thiserror::Error;

/// Raised while building or registering a resource. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("resource URL pattern is not set")]
    PatternNotSet,
    #[error("resource db path is not set")]
    DbPathNotSet,
    #[error("resource name is not set")]
    ResourceNameNotSet,
    #[error("storage driver is not set")]
    DriverNotSet,
    #[error("model is not set")]
    ModelNotSet,
    #[error("JSON schema config is not set")]
    SchemaConfigNotSet,
    #[error("JSON schema config ID field is not set")]
    SchemaIdFieldNotSet,
    #[error("invalid URL pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid version pattern '{pattern}': {source}")]
    InvalidVersionPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid CORS origin pattern '{pattern}': {source}")]
    InvalidCorsPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("ID field '{field}' not found in {model} model of resource '{resource}'")]
    IdFieldNotFound {
        field: String,
        model: &'static str,
        resource: String,
    },
    #[error("ETag field '{field}' not found in {model} model of resource '{resource}'")]
    EtagFieldNotFound {
        field: String,
        model: &'static str,
        resource: String,
    },
    #[error("unknown field '{field}' in {model} model")]
    UnknownField { field: String, model: &'static str },
    #[error("invalid field '{field}' in {model} model: {reason}")]
    InvalidField {
        field: String,
        model: &'static str,
        reason: &'static str,
    },
    #[error("unable to test model against driver: {0}")]
    UnableToTestModel(#[source] ModelError),
    #[error("invalid JSON schema '{name}': {reason}")]
    InvalidSchema { name: String, reason: String },
    #[error("pattern '{0}' is already registered")]
    PatternExists(String),
    #[error("config load: {0}")]
    Load(String),
}

/// Failures while converting or checking a model instance.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid ID '{0}'")]
    InvalidId(String),
    #[error("invalid ETag '{0}'")]
    InvalidEtag(String),
    #[error("contract violation: {0}")]
    Contract(String),
    #[error("store unavailable: {0}")]
    Store(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Ok,
    ModifiersNotAllowed,
    MethodNotAllowed,
    Unauthorized,
    UrlNotFound,
    UnableToParseRequest,
    TooManyInputItems,
    UrlTooBig,
    PayloadTooBig,
    PerPageTooLarge,
    FieldNotFilterable,
    FieldNotSortable,
    FieldNotProjectable,
    FieldNotExists,
    ClientObjectFieldRequired,
    ClientObjectFieldNotInsertable,
    ClientObjectFieldNotUpdatable,
    InvalidAcceptRequestHeader,
    InvalidContentTypeRequestHeader,
    ClientObjectMalformed,
    ServerObjectMalformed,
    PayloadInvalid,
    CannotDecodePayload,
    LowLevelDriver,
    InternalServerError,
    MalformedWhere,
    MalformedSort,
    MalformedProjection,
    ObjectNotFound,
    ObjectNotAffected,
    TooManyObjects,
    UnsupportedVersion,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Ok => "OK",
            ErrorKind::ModifiersNotAllowed => "ModifiersNotAllowed",
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::UrlNotFound => "URLNotFound",
            ErrorKind::UnableToParseRequest => "UnableToParseRequest",
            ErrorKind::TooManyInputItems => "TooManyInputItems",
            ErrorKind::UrlTooBig => "URLTooBig",
            ErrorKind::PayloadTooBig => "PayloadTooBig",
            ErrorKind::PerPageTooLarge => "PerPageTooLarge",
            ErrorKind::FieldNotFilterable => "FieldNotFilterable",
            ErrorKind::FieldNotSortable => "FieldNotSortable",
            ErrorKind::FieldNotProjectable => "FieldNotProjectable",
            ErrorKind::FieldNotExists => "FieldNotExists",
            ErrorKind::ClientObjectFieldRequired => "ClientObjectFieldRequired",
            ErrorKind::ClientObjectFieldNotInsertable => "ClientObjectFieldNotInsertable",
            ErrorKind::ClientObjectFieldNotUpdatable => "ClientObjectFieldNotUpdatable",
            ErrorKind::InvalidAcceptRequestHeader => "InvalidAcceptRequestHeader",
            ErrorKind::InvalidContentTypeRequestHeader => "InvalidContentTypeRequestHeader",
            ErrorKind::ClientObjectMalformed => "ClientObjectMalformed",
            ErrorKind::ServerObjectMalformed => "ServerObjectMalformed",
            ErrorKind::PayloadInvalid => "PayloadInvalid",
            ErrorKind::CannotDecodePayload => "CannotDecodePayload",
            ErrorKind::LowLevelDriver => "LowLevelDriver",
            ErrorKind::InternalServerError => "InternalServerError",
            ErrorKind::MalformedWhere => "MalformedWhere",
            ErrorKind::MalformedSort => "MalformedSort",
            ErrorKind::MalformedProjection => "MalformedProjection",
            ErrorKind::ObjectNotFound => "ObjectNotFound",
            ErrorKind::ObjectNotAffected => "ObjectNotAffected",
            ErrorKind::TooManyObjects => "TooManyObjects",
            ErrorKind::UnsupportedVersion => "UnsupportedVersion",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Ok => StatusCode::OK,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::UrlNotFound | ErrorKind::ObjectNotFound => StatusCode::NOT_FOUND,
            ErrorKind::UrlTooBig => StatusCode::URI_TOO_LONG,
            ErrorKind::PayloadTooBig | ErrorKind::PerPageTooLarge | ErrorKind::TooManyObjects => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ErrorKind::InvalidContentTypeRequestHeader => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorKind::ObjectNotAffected => StatusCode::CONFLICT,
            ErrorKind::UnsupportedVersion => StatusCode::NOT_ACCEPTABLE,
            ErrorKind::UnableToParseRequest
            | ErrorKind::ServerObjectMalformed
            | ErrorKind::LowLevelDriver
            | ErrorKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::ModifiersNotAllowed
            | ErrorKind::TooManyInputItems
            | ErrorKind::FieldNotFilterable
            | ErrorKind::FieldNotSortable
            | ErrorKind::FieldNotProjectable
            | ErrorKind::FieldNotExists
            | ErrorKind::ClientObjectFieldRequired
            | ErrorKind::ClientObjectFieldNotInsertable
            | ErrorKind::ClientObjectFieldNotUpdatable
            | ErrorKind::InvalidAcceptRequestHeader
            | ErrorKind::ClientObjectMalformed
            | ErrorKind::PayloadInvalid
            | ErrorKind::CannotDecodePayload
            | ErrorKind::MalformedWhere
            | ErrorKind::MalformedSort
            | ErrorKind::MalformedProjection => StatusCode::BAD_REQUEST,
        }
    }

    /// Infrastructure failures are logged with a backtrace when raised.
    pub fn is_infrastructure(self) -> bool {
        matches!(
            self,
            ErrorKind::UnableToParseRequest
                | ErrorKind::ServerObjectMalformed
                | ErrorKind::LowLevelDriver
                | ErrorKind::InternalServerError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-request failure with a fixed status and a formatted message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HttpError {
    kind: ErrorKind,
    status: StatusCode,
    message: String,
}

fn format_status_message(kind: ErrorKind, message: &str, cause: Option<&str>) -> String {
    let mut text = kind.name().to_string();
    for part in [Some(message), cause].into_iter().flatten() {
        let part = part.trim();
        if !part.is_empty() {
            text.push_str(": ");
            text.push_str(part);
        }
    }
    text.trim().trim_end_matches(':').to_string()
}

impl HttpError {
    fn build(kind: ErrorKind, message: &str, cause: Option<&str>) -> Self {
        let err = HttpError {
            kind,
            status: kind.status(),
            message: format_status_message(kind, message, cause),
        };
        if kind.is_infrastructure() {
            tracing::error!(
                kind = %kind,
                status = err.status.as_u16(),
                backtrace = %Backtrace::force_capture(),
                "{}",
                err.message
            );
        }
        err
    }

    fn with_cause(kind: ErrorKind, message: &str, cause: impl fmt::Display) -> Self {
        Self::build(kind, message, Some(&cause.to_string()))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ok(&self) -> bool {
        self.kind == ErrorKind::Ok
    }

    pub fn ok() -> Self {
        Self::build(ErrorKind::Ok, "", None)
    }

    pub fn modifiers_not_allowed() -> Self {
        Self::build(ErrorKind::ModifiersNotAllowed, "Modifiers not allowed", None)
    }

    pub fn method_not_allowed() -> Self {
        Self::build(ErrorKind::MethodNotAllowed, "Method Not Allowed", None)
    }

    pub fn unauthorized() -> Self {
        Self::build(ErrorKind::Unauthorized, "", None)
    }

    pub fn url_not_found() -> Self {
        Self::build(ErrorKind::UrlNotFound, "URL not found", None)
    }

    pub fn unable_to_parse_request(cause: impl fmt::Display) -> Self {
        Self::with_cause(ErrorKind::UnableToParseRequest, "Unable to parse request", cause)
    }

    pub fn too_many_input_items(max: u64, got: usize) -> Self {
        let message = format!(
            "Number of the items exceeded maximum limit of {} (got {} items)",
            max, got
        );
        Self::build(ErrorKind::TooManyInputItems, &message, None)
    }

    pub fn url_too_big(max: usize) -> Self {
        let message = format!("URL length exceeded maximum limit of {} bytes", max);
        Self::build(ErrorKind::UrlTooBig, &message, None)
    }

    pub fn payload_too_big(max: u64) -> Self {
        let message = format!("Payload size exceeded maximum limit of {} bytes", max);
        Self::build(ErrorKind::PayloadTooBig, &message, None)
    }

    pub fn per_page_too_large(max: u64) -> Self {
        let message = format!("Maximum allowed per_page value is {}", max);
        Self::build(ErrorKind::PerPageTooLarge, &message, None)
    }

    pub fn field_not_filterable(field: &str) -> Self {
        let message = format!("Field '{}' is not filterable", field);
        Self::build(ErrorKind::FieldNotFilterable, &message, None)
    }

    pub fn field_not_sortable(field: &str) -> Self {
        let message = format!("Field '{}' is not sortable", field);
        Self::build(ErrorKind::FieldNotSortable, &message, None)
    }

    pub fn field_not_projectable(field: &str) -> Self {
        let message = format!("Field '{}' is not projectable", field);
        Self::build(ErrorKind::FieldNotProjectable, &message, None)
    }

    pub fn field_not_exists(field: &str) -> Self {
        let message = format!("Field '{}' does not exist", field);
        Self::build(ErrorKind::FieldNotExists, &message, None)
    }

    pub fn field_required(field: &str) -> Self {
        let message = format!("Field '{}' is required", field);
        Self::build(ErrorKind::ClientObjectFieldRequired, &message, None)
    }

    pub fn field_not_insertable(field: &str) -> Self {
        let message = format!("Field '{}' is not insertable", field);
        Self::build(ErrorKind::ClientObjectFieldNotInsertable, &message, None)
    }

    pub fn field_not_updatable(field: &str) -> Self {
        let message = format!("Field '{}' is not updatable", field);
        Self::build(ErrorKind::ClientObjectFieldNotUpdatable, &message, None)
    }

    pub fn invalid_accept_header(allowed: &[&str]) -> Self {
        let message = format!(
            "Invalid or missing Accept request header; allowed values are {}",
            allowed.join(", ")
        );
        Self::build(ErrorKind::InvalidAcceptRequestHeader, &message, None)
    }

    pub fn invalid_content_type_header(allowed: &str) -> Self {
        let message = format!(
            "Invalid or missing Content-Type request header; allowed value is {}",
            allowed
        );
        Self::build(ErrorKind::InvalidContentTypeRequestHeader, &message, None)
    }

    pub fn client_object_malformed(cause: impl fmt::Display) -> Self {
        Self::with_cause(ErrorKind::ClientObjectMalformed, "Client object is malformed", cause)
    }

    pub fn server_object_malformed(cause: impl fmt::Display) -> Self {
        Self::with_cause(ErrorKind::ServerObjectMalformed, "Server object is malformed", cause)
    }

    pub fn payload_invalid() -> Self {
        Self::build(
            ErrorKind::PayloadInvalid,
            "Passed payload is invalid, cannot be decoded or contains errors",
            None,
        )
    }

    pub fn cannot_decode_payload(cause: impl fmt::Display) -> Self {
        Self::with_cause(ErrorKind::CannotDecodePayload, "Passed payload cannot be decoded", cause)
    }

    pub fn low_level_driver(cause: impl fmt::Display) -> Self {
        Self::with_cause(ErrorKind::LowLevelDriver, "", cause)
    }

    pub fn internal_server_error(cause: impl fmt::Display) -> Self {
        Self::with_cause(ErrorKind::InternalServerError, "", cause)
    }

    pub fn malformed_where(cause: impl fmt::Display) -> Self {
        Self::with_cause(ErrorKind::MalformedWhere, "Malformed where", cause)
    }

    pub fn malformed_sort(cause: impl fmt::Display) -> Self {
        Self::with_cause(ErrorKind::MalformedSort, "Malformed sort", cause)
    }

    pub fn malformed_projection(cause: impl fmt::Display) -> Self {
        Self::with_cause(ErrorKind::MalformedProjection, "Malformed projection", cause)
    }

    pub fn object_not_found() -> Self {
        Self::build(ErrorKind::ObjectNotFound, "Object not found", None)
    }

    pub fn object_not_affected() -> Self {
        Self::build(ErrorKind::ObjectNotAffected, "Object not affected", None)
    }

    pub fn too_many_objects() -> Self {
        Self::build(
            ErrorKind::TooManyObjects,
            "Affected more than one object with the same ID",
            None,
        )
    }

    pub fn unsupported_version(version: &str) -> Self {
        let message = format!("Passed API version '{}' is not supported", version);
        Self::build(ErrorKind::UnsupportedVersion, &message, None)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut envelope = crate::response::ResponseEnvelope::new();
        envelope.set_status(&self);
        envelope.into_response()
    }
}
