//! Validator seam for payload objects, plus a JSON Schema implementation.

use crate::error::ConfigError;
use serde_json::{Map, Value};

pub trait JsonValidator: Send + Sync {
    /// Returns a human-readable reason when `object` is rejected.
    fn validate(&self, object: &Map<String, Value>) -> Result<(), String>;
}

/// Validates objects against a compiled JSON Schema document.
pub struct JsonSchemaValidator {
    name: String,
    validator: jsonschema::Validator,
}

impl JsonSchemaValidator {
    pub fn new(name: impl Into<String>, schema: &Value) -> Result<Self, ConfigError> {
        let name = name.into();
        let validator = jsonschema::options()
            .should_validate_formats(true)
            .build(schema)
            .map_err(|e| ConfigError::InvalidSchema {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        Ok(JsonSchemaValidator { name, validator })
    }

    pub fn from_json_str(name: impl Into<String>, schema: &str) -> Result<Self, ConfigError> {
        let name = name.into();
        let schema: Value = serde_json::from_str(schema).map_err(|e| ConfigError::InvalidSchema {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        Self::new(name, &schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl JsonValidator for JsonSchemaValidator {
    fn validate(&self, object: &Map<String, Value>) -> Result<(), String> {
        let instance = Value::Object(object.clone());
        self.validator
            .validate(&instance)
            .map_err(|e| format!("{} schema: {}", self.name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book_schema() -> JsonSchemaValidator {
        JsonSchemaValidator::new(
            "book",
            &json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "minLength": 1},
                    "pages": {"type": "integer", "minimum": 1}
                },
                "required": ["title"]
            }),
        )
        .unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_accepts_valid_object() {
        assert!(book_schema().validate(&object(json!({"title": "Dune", "pages": 412}))).is_ok());
    }

    #[test]
    fn test_rejects_invalid_object() {
        let err = book_schema().validate(&object(json!({"pages": 0}))).unwrap_err();
        assert!(err.starts_with("book schema:"));
    }

    #[test]
    fn test_invalid_schema_is_config_error() {
        let err = JsonSchemaValidator::from_json_str("broken", "{not json").err();
        assert!(matches!(err, Some(ConfigError::InvalidSchema { .. })));
    }
}
