//! Compiled artifacts built once per resource: field index, version and CORS matchers.

use crate::config::{CorsConfig, Operation, SchemaConfig};
use crate::error::ConfigError;
use crate::model::FieldMeta;
use axum::http::Method;
use regex::Regex;

/// JSON field names of a model, with and without the reserved ID/ETag fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldIndex {
    pub json_fields: Vec<String>,
    pub non_reserved: Vec<String>,
    pub id_field: String,
    pub etag_field: Option<String>,
}

impl FieldIndex {
    pub fn build(fields: &[FieldMeta], schema: &SchemaConfig) -> Self {
        let mut json_fields: Vec<String> = Vec::new();
        for meta in fields.iter().filter(|m| m.is_exposed()) {
            let json = meta.json.trim().to_string();
            if !json_fields.contains(&json) {
                json_fields.push(json);
            }
        }
        let id_field = schema.json_id_field.trim().to_string();
        let etag_field = schema.etag_field().map(str::to_string);
        let non_reserved = json_fields
            .iter()
            .filter(|f| **f != id_field && Some(f.as_str()) != etag_field.as_deref())
            .cloned()
            .collect();
        FieldIndex {
            json_fields,
            non_reserved,
            id_field,
            etag_field,
        }
    }

    pub fn exists(&self, field: &str) -> bool {
        self.json_fields.iter().any(|f| f == field)
    }

    pub fn is_reserved(&self, field: &str) -> bool {
        field == self.id_field || Some(field) == self.etag_field.as_deref()
    }
}

pub fn compile_patterns<F>(patterns: &[String], on_error: F) -> Result<Vec<Regex>, ConfigError>
where
    F: Fn(String, regex::Error) -> ConfigError,
{
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| on_error(p.clone(), e)))
        .collect()
}

/// Origin matchers per operation.
#[derive(Clone, Debug)]
pub struct CompiledCors {
    get: Vec<Regex>,
    insert: Vec<Regex>,
    update: Vec<Regex>,
    delete: Vec<Regex>,
}

impl CompiledCors {
    pub fn compile(config: &CorsConfig) -> Result<Self, ConfigError> {
        let compile = |patterns: &[String]| {
            compile_patterns(patterns, |pattern, source| ConfigError::InvalidCorsPattern { pattern, source })
        };
        Ok(CompiledCors {
            get: compile(&config.get_origins)?,
            insert: compile(&config.insert_origins)?,
            update: compile(&config.update_origins)?,
            delete: compile(&config.delete_origins)?,
        })
    }

    pub fn allows(&self, operation: Operation, origin: &str) -> bool {
        let patterns = match operation {
            Operation::Get => &self.get,
            Operation::Insert => &self.insert,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        };
        patterns.iter().any(|p| p.is_match(origin))
    }

    /// Methods the origin may use, always starting with OPTIONS.
    pub fn allowed_methods(&self, origin: &str) -> Vec<Method> {
        let mut methods = vec![Method::OPTIONS];
        if self.allows(Operation::Get, origin) {
            methods.push(Method::GET);
        }
        if self.allows(Operation::Delete, origin) {
            methods.push(Method::DELETE);
        }
        if self.allows(Operation::Insert, origin) {
            methods.push(Method::POST);
            methods.push(Method::PUT);
        }
        if self.allows(Operation::Update, origin) {
            methods.push(Method::PATCH);
        }
        methods
    }
}
