//! Shared fixtures: a Book model, a call-counting driver and request helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use resource_sdk::{
    resource_routes, AppState, Document, DocumentModel, DriverContext, FieldMeta, HttpError, InMemoryDriver,
    ModelError, Resource, ResourceConfig, ResourceHooks, ResourceRegistry, SchemaConfig, StorageDriver,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const BOOKS_PATTERN: &str = "^/(?P<version>v[0-9]+)/(?P<url>books)$";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Book {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip)]
    pub error: Option<HttpError>,
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

/// Delegates to the in-memory driver and counts find/insert calls.
#[derive(Clone, Default)]
pub struct CountingDriver {
    pub inner: InMemoryDriver,
    pub finds: Arc<AtomicUsize>,
    pub inserts: Arc<AtomicUsize>,
    /// When set, `find` fails with a driver error.
    pub find_down: Arc<AtomicBool>,
}

impl CountingDriver {
    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn take_find_down(&self) {
        self.find_down.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageDriver for CountingDriver {
    fn test_model(
        &self,
        id_field: &str,
        etag_field: &str,
        model: &dyn Document,
        db_path: &str,
    ) -> Result<(), ModelError> {
        self.inner.test_model(id_field, etag_field, model, db_path)
    }

    async fn find(
        &self,
        model: &dyn Document,
        filter: &str,
        sort: &str,
        page: u64,
        per_page: u64,
        ctx: &DriverContext,
    ) -> Result<Vec<Box<dyn Document>>, HttpError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        if self.find_down.load(Ordering::SeqCst) {
            return Err(HttpError::low_level_driver("down"));
        }
        self.inner.find(model, filter, sort, page, per_page, ctx).await
    }

    async fn total(&self, model: &dyn Document, filter: &str, ctx: &DriverContext) -> Result<u64, HttpError> {
        self.inner.total(model, filter, ctx).await
    }

    async fn insert(
        &self,
        model: &dyn Document,
        documents: &mut [Box<dyn Document>],
        ctx: &DriverContext,
    ) -> Result<(), HttpError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(model, documents, ctx).await
    }

    async fn update(
        &self,
        model: &dyn Document,
        documents: &mut [Box<dyn Document>],
        ctx: &DriverContext,
    ) -> Result<(), HttpError> {
        self.inner.update(model, documents, ctx).await
    }

    async fn delete(
        &self,
        model: &dyn Document,
        documents: &mut [Box<dyn Document>],
        ctx: &DriverContext,
    ) -> Result<(), HttpError> {
        self.inner.delete(model, documents, ctx).await
    }

    fn where_fields(&self, model: &dyn Document, filter: &str) -> Result<Vec<String>, HttpError> {
        self.inner.where_fields(model, filter)
    }

    fn sort_fields(&self, model: &dyn Document, sort: &str) -> Result<Vec<String>, HttpError> {
        self.inner.sort_fields(model, sort)
    }
}

pub fn books_schema() -> SchemaConfig {
    SchemaConfig::new("id", "etag")
}

pub fn books_config(schema: SchemaConfig) -> ResourceConfig {
    ResourceConfig::new(BOOKS_PATTERN, "library.books", "books")
        .with_id_fields("id", "etag")
        .with_versions(["^v1$"])
        .with_schema(schema)
}

pub fn build_resource(config: ResourceConfig, driver: &CountingDriver, hooks: ResourceHooks) -> Resource {
    Resource::builder(config)
        .driver(Arc::new(driver.clone()))
        .model(Book::default())
        .hooks(hooks)
        .build()
        .expect("resource builds")
}

pub fn app_with(resource: Resource) -> Router {
    let mut registry = ResourceRegistry::new();
    registry.add_resource(resource).expect("resource registers");
    resource_routes(AppState::new(registry))
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn items(&self) -> &Vec<Value> {
        self.body["_items"].as_array().expect("_items array")
    }

    pub fn meta(&self) -> &Value {
        &self.body["_meta"]
    }

    pub fn message(&self) -> &str {
        self.meta()["status_message"].as_str().unwrap_or_default()
    }
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>, extra: &[(&str, &str)]) -> Reply {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ACCEPT, "application/json");
    for (name, value) in extra {
        builder = builder.header(*name, *value);
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request builds"))
        .await
        .expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
    let body = serde_json::from_slice(&bytes).expect("body is JSON");
    Reply { status, headers, body }
}

pub async fn insert_book(app: &Router, title: &str, author: &str) -> Value {
    let reply = send(
        app,
        Method::POST,
        "/v1/books",
        Some(serde_json::json!({"title": title, "author": author, "pages": 120, "isbn": "978-0"})),
        &[],
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    reply.items()[0].clone()
}
