//! Resource SDK: declarative REST resources over pluggable storage drivers.
//!
//! A [`Resource`] binds a URL pattern, a document model, a storage driver and
//! per-field schema rules. Requests matching the pattern run through one
//! pipeline (CORS, version, field authorization, hooks, operation) and always
//! answer with the `{"_items": [...], "_meta": {...}}` envelope.

pub mod config;
pub mod driver;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod json_validator;
pub mod model;
pub mod registry;
pub mod request;
pub mod resource;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;
pub mod storage;

pub use config::{
    init_tracing, load_resource_config, parse_resource_config, CorsConfig, FieldSet, Limits, Mutation,
    Operation, Operations, ResourceConfig, SchemaConfig, ServerSettings, Validators, FIELD_ANY,
};
pub use driver::{ContextKind, DriverContext, StorageDriver};
pub use error::{ConfigError, ErrorKind, HttpError, ModelError};
pub use hooks::ResourceHooks;
pub use json_validator::{JsonSchemaValidator, JsonValidator};
pub use model::{Document, DocumentModel, FieldMeta};
pub use registry::ResourceRegistry;
pub use request::Request;
pub use resource::{Resource, ResourceBuilder};
pub use response::ResponseEnvelope;
pub use routes::{common_routes, common_routes_with_ready, resource_routes};
pub use state::AppState;
pub use storage::InMemoryDriver;
