//! Resource configuration types. Serde-deserializable so a resource can be declared in a JSON manifest.

use crate::config::SchemaConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_OUTPUT_ITEMS: u64 = 100;
pub const DEFAULT_MAX_INPUT_ITEMS: u64 = 100;
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_DRIVER_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Insert,
    Update,
    Delete,
}

/// Mutating subset of [`Operation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mutation {
    Insert,
    Update,
    Delete,
}

impl Mutation {
    pub fn operation(self) -> Operation {
        match self {
            Mutation::Insert => Operation::Insert,
            Mutation::Update => Operation::Update,
            Mutation::Delete => Operation::Delete,
        }
    }
}

/// Per-operation enable flags. All enabled by default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Operations {
    pub get: bool,
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl Default for Operations {
    fn default() -> Self {
        Operations {
            get: true,
            insert: true,
            update: true,
            delete: true,
        }
    }
}

impl Operations {
    pub fn allows(&self, operation: Operation) -> bool {
        match operation {
            Operation::Get => self.get,
            Operation::Insert => self.insert,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// Numeric bounds. Zero means "use the default".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub get_max_output_items: u64,
    pub insert_max_input_items: u64,
    pub update_max_input_items: u64,
    pub delete_max_input_items: u64,
    pub insert_max_payload_size: u64,
    pub update_max_payload_size: u64,
    pub delete_max_payload_size: u64,
}

fn or_default(value: u64, default: u64) -> u64 {
    if value == 0 {
        default
    } else {
        value
    }
}

impl Limits {
    pub fn with_defaults(self) -> Self {
        Limits {
            get_max_output_items: or_default(self.get_max_output_items, DEFAULT_MAX_OUTPUT_ITEMS),
            insert_max_input_items: or_default(self.insert_max_input_items, DEFAULT_MAX_INPUT_ITEMS),
            update_max_input_items: or_default(self.update_max_input_items, DEFAULT_MAX_INPUT_ITEMS),
            delete_max_input_items: or_default(self.delete_max_input_items, DEFAULT_MAX_INPUT_ITEMS),
            insert_max_payload_size: or_default(self.insert_max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE),
            update_max_payload_size: or_default(self.update_max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE),
            delete_max_payload_size: or_default(self.delete_max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE),
        }
    }

    pub fn max_input_items(&self, mutation: Mutation) -> u64 {
        match mutation {
            Mutation::Insert => self.insert_max_input_items,
            Mutation::Update => self.update_max_input_items,
            Mutation::Delete => self.delete_max_input_items,
        }
    }

    pub fn max_payload_size(&self, mutation: Mutation) -> u64 {
        match mutation {
            Mutation::Insert => self.insert_max_payload_size,
            Mutation::Update => self.update_max_payload_size,
            Mutation::Delete => self.delete_max_payload_size,
        }
    }

    /// Upper bound for reading a request body before the operation is known.
    pub fn largest_payload_size(&self) -> u64 {
        self.insert_max_payload_size
            .max(self.update_max_payload_size)
            .max(self.delete_max_payload_size)
    }
}

/// Origin allow-lists (regular expressions) per operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub get_origins: Vec<String>,
    pub insert_origins: Vec<String>,
    pub update_origins: Vec<String>,
    pub delete_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        let any = vec![".*".to_string()];
        CorsConfig {
            get_origins: any.clone(),
            insert_origins: any.clone(),
            update_origins: any.clone(),
            delete_origins: any,
        }
    }
}

/// Declarative part of a resource. Driver, model and hooks are bound in code.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Regex with a required `url` named group and an optional `version` group.
    pub pattern: String,
    pub db_path: String,
    pub resource_name: String,
    /// Model-side ID field name.
    pub id_field: String,
    /// Model-side ETag field name; empty when the model has none.
    pub etag_field: String,
    /// Regex patterns; empty accepts any version.
    pub supported_versions: Vec<String>,
    pub schema: Option<SchemaConfig>,
    pub operations: Operations,
    pub limits: Limits,
    pub cors: Option<CorsConfig>,
    pub driver_timeout_ms: u64,
}

impl ResourceConfig {
    pub fn new(
        pattern: impl Into<String>,
        db_path: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> Self {
        ResourceConfig {
            pattern: pattern.into(),
            db_path: db_path.into(),
            resource_name: resource_name.into(),
            ..Default::default()
        }
    }

    pub fn with_id_fields(mut self, id_field: impl Into<String>, etag_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self.etag_field = etag_field.into();
        self
    }

    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = Some(cors);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limits_take_defaults() {
        let limits = Limits {
            get_max_output_items: 10,
            ..Default::default()
        }
        .with_defaults();
        assert_eq!(limits.get_max_output_items, 10);
        assert_eq!(limits.max_input_items(Mutation::Update), DEFAULT_MAX_INPUT_ITEMS);
        assert_eq!(limits.max_payload_size(Mutation::Delete), DEFAULT_MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_manifest_defaults() {
        let config: ResourceConfig =
            serde_json::from_str(r#"{"pattern": "^/books$", "operations": {"delete": false}}"#).unwrap();
        assert!(config.operations.allows(Operation::Get));
        assert!(!config.operations.allows(Operation::Delete));
        assert!(config.schema.is_none());
        assert!(config.cors.is_none());
    }
}
