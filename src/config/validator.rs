//! Resource config validation: presence of required settings and schema/model consistency.

use crate::config::{FieldIndex, ResourceConfig, SchemaConfig};
use crate::error::ConfigError;
use crate::model::FieldMeta;
use std::collections::HashSet;

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Checks settings in a fixed order; the first missing one is reported.
pub fn validate_presence(
    config: &ResourceConfig,
    has_driver: bool,
    has_model: bool,
) -> Result<&SchemaConfig, ConfigError> {
    if is_blank(&config.pattern) {
        return Err(ConfigError::PatternNotSet);
    }
    if is_blank(&config.db_path) {
        return Err(ConfigError::DbPathNotSet);
    }
    if is_blank(&config.resource_name) {
        return Err(ConfigError::ResourceNameNotSet);
    }
    if !has_driver {
        return Err(ConfigError::DriverNotSet);
    }
    if !has_model {
        return Err(ConfigError::ModelNotSet);
    }
    let schema = config.schema.as_ref().ok_or(ConfigError::SchemaConfigNotSet)?;
    if is_blank(&schema.json_id_field) {
        return Err(ConfigError::SchemaIdFieldNotSet);
    }
    Ok(schema)
}

/// Every exposed JSON name must be trimmed and unique.
pub fn validate_model_fields(fields: &[FieldMeta], model: &'static str) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for meta in fields.iter().filter(|m| m.is_exposed()) {
        if meta.json != meta.json.trim() {
            return Err(ConfigError::InvalidField {
                field: meta.json.to_string(),
                model,
                reason: "surrounding whitespace",
            });
        }
        if !seen.insert(meta.json) {
            return Err(ConfigError::InvalidField {
                field: meta.json.to_string(),
                model,
                reason: "duplicate JSON name",
            });
        }
    }
    Ok(())
}

/// The declared ID (and ETag) must map to an exposed model field.
pub fn validate_reserved_fields(
    config: &ResourceConfig,
    schema: &SchemaConfig,
    fields: &[FieldMeta],
    model: &'static str,
) -> Result<(), ConfigError> {
    let declared = |model_name: &str, json: &str| {
        fields.iter().any(|m| {
            m.is_exposed() && m.json == json && (is_blank(model_name) || m.name == model_name.trim())
        })
    };
    if !declared(&config.id_field, schema.json_id_field.trim()) {
        return Err(ConfigError::IdFieldNotFound {
            field: schema.json_id_field.clone(),
            model,
            resource: config.resource_name.clone(),
        });
    }
    if let Some(etag) = schema.etag_field() {
        if !declared(&config.etag_field, etag) {
            return Err(ConfigError::EtagFieldNotFound {
                field: etag.to_string(),
                model,
                resource: config.resource_name.clone(),
            });
        }
    }
    Ok(())
}

/// Every field named by a rule must exist in the model; the wildcard is exempt.
pub fn validate_schema_fields(
    schema: &SchemaConfig,
    index: &FieldIndex,
    model: &'static str,
) -> Result<(), ConfigError> {
    for (_, set) in schema.rule_sets() {
        if let Some(field) = set.names().find(|f| !index.exists(f)) {
            return Err(ConfigError::UnknownField {
                field: field.to_string(),
                model,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSet;

    const FIELDS: &[FieldMeta] = &[
        FieldMeta::new("Id", "id", "_id"),
        FieldMeta::new("Title", "title", "title"),
    ];

    fn config() -> ResourceConfig {
        ResourceConfig::new("^/(?P<url>books)$", "books", "books")
            .with_id_fields("Id", "")
            .with_schema(SchemaConfig::new("id", ""))
    }

    #[test]
    fn test_presence_order() {
        let mut cfg = config();
        assert!(matches!(validate_presence(&cfg, false, false), Err(ConfigError::DriverNotSet)));
        assert!(matches!(validate_presence(&cfg, true, false), Err(ConfigError::ModelNotSet)));
        cfg.db_path = " ".into();
        assert!(matches!(validate_presence(&cfg, true, true), Err(ConfigError::DbPathNotSet)));
        cfg = config();
        cfg.schema = None;
        assert!(matches!(validate_presence(&cfg, true, true), Err(ConfigError::SchemaConfigNotSet)));
        cfg.schema = Some(SchemaConfig::default());
        assert!(matches!(validate_presence(&cfg, true, true), Err(ConfigError::SchemaIdFieldNotSet)));
    }

    #[test]
    fn test_reserved_fields_must_exist() {
        let cfg = config();
        let schema = cfg.schema.clone().unwrap();
        assert!(validate_reserved_fields(&cfg, &schema, FIELDS, "Book").is_ok());

        let etag_schema = SchemaConfig::new("id", "etag");
        let err = validate_reserved_fields(&cfg, &etag_schema, FIELDS, "Book").unwrap_err();
        assert!(matches!(err, ConfigError::EtagFieldNotFound { .. }));

        let wrong_name = config().with_id_fields("Key", "");
        let err = validate_reserved_fields(&wrong_name, &schema, FIELDS, "Book").unwrap_err();
        assert!(matches!(err, ConfigError::IdFieldNotFound { .. }));
    }

    #[test]
    fn test_unknown_schema_field() {
        let mut schema = SchemaConfig::new("id", "");
        let index = FieldIndex::build(FIELDS, &schema);
        assert!(validate_schema_fields(&schema, &index, "Book").is_ok());

        schema.hidden_fields = FieldSet::of(["secret"]);
        let err = validate_schema_fields(&schema, &index, "Book").unwrap_err();
        assert_eq!(err.to_string(), "unknown field 'secret' in Book model");
    }

    #[test]
    fn test_duplicate_json_names() {
        let fields = [FieldMeta::new("A", "a", "a"), FieldMeta::new("B", "a", "b")];
        assert!(matches!(
            validate_model_fields(&fields, "Dup"),
            Err(ConfigError::InvalidField { .. })
        ));
    }
}
