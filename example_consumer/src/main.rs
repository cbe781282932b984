//! Example consumer: a separate Rust project that serves a books resource with resource-sdk.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`

use resource_sdk::{
    common_routes_with_ready, init_tracing, load_resource_config, resource_routes, AppState, DocumentModel,
    FieldMeta, HttpError, InMemoryDriver, JsonSchemaValidator, ModelError, Resource, ResourceHooks,
    ResourceRegistry, ServerSettings,
};
use axum::http::{header, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

const MANIFEST: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/resources/books.json");

#[derive(Debug, Default, Serialize, Deserialize)]
struct Book {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    isbn: Option<String>,
    #[serde(skip)]
    error: Option<HttpError>,
}

impl DocumentModel for Book {
    const MODEL_NAME: &'static str = "Book";
    const FIELDS: &'static [FieldMeta] = &[
        FieldMeta::new("id", "id", "_id"),
        FieldMeta::new("etag", "etag", "_etag"),
        FieldMeta::new("title", "title", "title"),
        FieldMeta::new("author", "author", "author"),
        FieldMeta::new("pages", "pages", "pages"),
        FieldMeta::new("isbn", "isbn", "isbn"),
        FieldMeta::new("error", "-", "-"),
    ];

    fn id(&self) -> Option<Value> {
        self.id.clone().map(Value::String)
    }

    fn set_id(&mut self, id: &str) -> Result<(), ModelError> {
        self.id = Some(id.to_string());
        Ok(())
    }

    fn etag(&self) -> Option<Value> {
        self.etag.clone().map(Value::String)
    }

    fn create_etag(&mut self) -> Option<Value> {
        let etag = uuid::Uuid::new_v4().simple().to_string();
        self.etag = Some(etag.clone());
        Some(Value::String(etag))
    }

    fn set_etag(&mut self, etag: &str) -> Result<(), ModelError> {
        self.etag = Some(etag.to_string());
        Ok(())
    }

    fn error_slot(&self) -> &Option<HttpError> {
        &self.error
    }

    fn error_slot_mut(&mut self) -> &mut Option<HttpError> {
        &mut self.error
    }
}

fn book_hooks() -> ResourceHooks {
    ResourceHooks::default()
        .on_auth(|_, request, _| {
            matches!(request.method, Method::GET | Method::OPTIONS) || request.header(header::AUTHORIZATION).is_some()
        })
        .on_inserted(|resource, _, documents, err| {
            tracing::info!(resource = resource.name(), count = documents.len(), "books inserted");
            err
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("resource_sdk=info,example_consumer=info,tower_http=info");
    let settings = ServerSettings::from_env()?;

    let mut config = load_resource_config(MANIFEST)?;
    if config.driver_timeout_ms == 0 {
        config.driver_timeout_ms = settings.driver_timeout.as_millis() as u64;
    }
    if let Some(schema) = config.schema.as_mut() {
        let validator = JsonSchemaValidator::new(
            "book",
            &json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "minLength": 1},
                    "author": {"type": "string"},
                    "pages": {"type": "integer", "minimum": 1}
                }
            }),
        )?;
        schema.validators.insert = Some(Arc::new(validator));
    }

    let driver = Arc::new(InMemoryDriver::new());
    let books = Resource::builder(config)
        .driver(driver)
        .model(Book::default())
        .hooks(book_hooks())
        .build()?;

    let mut registry = ResourceRegistry::new();
    registry.add_resource(books)?;
    let state = AppState::new(registry);

    let app = common_routes_with_ready(state.clone()).merge(resource_routes(state));
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
