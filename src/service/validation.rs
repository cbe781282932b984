//! Per-item payload checks for mutating requests.
//!
//! Order per item: whitespace optimization, required fields, insertable/updatable
//! fields, schema validator. A failing item keeps its error and the batch continues.

use crate::config::{FieldIndex, Mutation, SchemaConfig};
use crate::error::HttpError;
use crate::json_validator::JsonValidator;
use crate::request::PayloadItem;
use serde_json::{Map, Value};

/// Resolved rules for one mutation kind.
pub struct ItemRules<'a> {
    mutation: Mutation,
    optimize: Vec<String>,
    required: Vec<String>,
    /// `None` skips the insertable/updatable check (delete).
    permitted: Option<Vec<String>>,
    always_permitted: Vec<String>,
    validator: Option<&'a dyn JsonValidator>,
}

impl<'a> ItemRules<'a> {
    pub fn new(schema: &'a SchemaConfig, fields: &FieldIndex, mutation: Mutation) -> Self {
        let optimize = schema.optimize_fields(mutation).expand(&fields.non_reserved);
        let required_universe = match mutation {
            Mutation::Insert => &fields.non_reserved,
            Mutation::Update | Mutation::Delete => &fields.json_fields,
        };
        let required = schema.required_fields(mutation).expand(required_universe);
        let (permitted, always_permitted) = match mutation {
            Mutation::Insert => (Some(schema.insertable_fields.expand(&fields.non_reserved)), Vec::new()),
            Mutation::Update => {
                let mut reserved = vec![fields.id_field.clone()];
                reserved.extend(fields.etag_field.clone());
                (Some(schema.updatable_fields.expand(&fields.non_reserved)), reserved)
            }
            Mutation::Delete => (None, Vec::new()),
        };
        ItemRules {
            mutation,
            optimize,
            required,
            permitted,
            always_permitted,
            validator: schema.validators.for_mutation(mutation),
        }
    }

    pub fn check(&self, object: &mut Map<String, Value>) -> Result<(), HttpError> {
        optimize_fields(object, &self.optimize);

        if let Some(missing) = self.required.iter().find(|f| !object.contains_key(f.as_str())) {
            return Err(HttpError::field_required(missing));
        }

        if let Some(permitted) = &self.permitted {
            let rejected = object.keys().find(|key| {
                !self.required.contains(key)
                    && !self.always_permitted.contains(key)
                    && !permitted.contains(key)
            });
            if let Some(field) = rejected {
                return Err(match self.mutation {
                    Mutation::Update => HttpError::field_not_updatable(field),
                    Mutation::Insert | Mutation::Delete => HttpError::field_not_insertable(field),
                });
            }
        }

        if let Some(validator) = self.validator {
            validator.validate(object).map_err(HttpError::client_object_malformed)?;
        }
        Ok(())
    }
}

/// Validates every item, attaching the first failure to the item.
pub fn check_items(rules: &ItemRules<'_>, items: &mut [PayloadItem]) {
    for (index, item) in items.iter_mut().enumerate() {
        if let Err(err) = rules.check(&mut item.object) {
            tracing::debug!(index, error = %err, "payload item rejected");
            item.error = Some(err);
        }
    }
}

/// Collapses runs of whitespace in string values and trims them.
pub fn optimize_fields(object: &mut Map<String, Value>, fields: &[String]) {
    for field in fields {
        if let Some(Value::String(text)) = object.get_mut(field) {
            *text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSet;
    use crate::error::ErrorKind;
    use crate::model::FieldMeta;
    use serde_json::json;
    use std::sync::Arc;

    const FIELDS: &[FieldMeta] = &[
        FieldMeta::new("Id", "id", "_id"),
        FieldMeta::new("Etag", "etag", "etag"),
        FieldMeta::new("Title", "title", "title"),
        FieldMeta::new("Author", "author", "author"),
        FieldMeta::new("Pages", "pages", "pages"),
    ];

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn schema() -> SchemaConfig {
        SchemaConfig::new("id", "etag")
    }

    fn check(schema: &SchemaConfig, mutation: Mutation, value: Value) -> Result<Map<String, Value>, HttpError> {
        let fields = FieldIndex::build(FIELDS, schema);
        let rules = ItemRules::new(schema, &fields, mutation);
        let mut object = object(value);
        rules.check(&mut object).map(|_| object)
    }

    #[test]
    fn test_optimize_collapses_whitespace_and_keeps_key() {
        let out = check(&schema(), Mutation::Insert, json!({"title": "  The   Left\tHand ", "author": "   "})).unwrap();
        assert_eq!(out["title"], "The Left Hand");
        assert_eq!(out["author"], "");
    }

    #[test]
    fn test_optimize_runs_before_required() {
        let mut schema = schema();
        schema.required_on_insert_fields = FieldSet::of(["author"]);
        assert!(check(&schema, Mutation::Insert, json!({"author": "  "})).is_ok());
    }

    #[test]
    fn test_required_field_missing() {
        let mut schema = schema();
        schema.required_on_insert_fields = FieldSet::of(["title"]);
        let err = check(&schema, Mutation::Insert, json!({"author": "x"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientObjectFieldRequired);
        assert!(err.message().contains("'title'"));
    }

    #[test]
    fn test_insert_rejects_reserved_and_unlisted_fields() {
        let err = check(&schema(), Mutation::Insert, json!({"id": "x", "title": "t"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientObjectFieldNotInsertable);

        let mut schema = schema();
        schema.insertable_fields = FieldSet::of(["title"]);
        let err = check(&schema, Mutation::Insert, json!({"title": "t", "pages": 3})).unwrap_err();
        assert_eq!(err.message(), "ClientObjectFieldNotInsertable: Field 'pages' is not insertable");
    }

    #[test]
    fn test_required_fields_bypass_insertable() {
        let mut schema = schema();
        schema.insertable_fields = FieldSet::of(["title"]);
        schema.required_on_insert_fields = FieldSet::of(["author"]);
        assert!(check(&schema, Mutation::Insert, json!({"title": "t", "author": "a"})).is_ok());
    }

    #[test]
    fn test_update_permits_id_and_etag() {
        let mut schema = schema();
        schema.updatable_fields = FieldSet::of(["title"]);
        schema.required_on_update_fields = Some(FieldSet::of(["id"]));
        assert!(check(&schema, Mutation::Update, json!({"id": "1", "etag": "e", "title": "t"})).is_ok());

        let err = check(&schema, Mutation::Update, json!({"id": "1", "pages": 9})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientObjectFieldNotUpdatable);
        assert!(err.message().contains("'pages'"));
    }

    #[test]
    fn test_update_requires_id_and_etag_by_default() {
        let err = check(&schema(), Mutation::Update, json!({"id": "1", "title": "t"})).unwrap_err();
        assert_eq!(err.message(), "ClientObjectFieldRequired: Field 'etag' is required");
    }

    #[test]
    fn test_delete_skips_content_rules() {
        let mut schema = schema();
        schema.updatable_fields = FieldSet::none();
        schema.insertable_fields = FieldSet::none();
        assert!(check(&schema, Mutation::Delete, json!({"id": "1", "etag": "e", "title": "t"})).is_ok());
    }

    struct RejectPages;

    impl JsonValidator for RejectPages {
        fn validate(&self, object: &Map<String, Value>) -> Result<(), String> {
            if object.contains_key("pages") {
                Err("pages not accepted".into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_validator_failure_is_client_object_malformed() {
        let mut schema = schema();
        schema.validators.insert = Some(Arc::new(RejectPages));
        let err = check(&schema, Mutation::Insert, json!({"pages": 1})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientObjectMalformed);
        assert!(err.message().ends_with("pages not accepted"));
    }

    #[test]
    fn test_check_items_marks_only_failing_items() {
        let mut schema = schema();
        schema.required_on_insert_fields = FieldSet::of(["title"]);
        let fields = FieldIndex::build(FIELDS, &schema);
        let rules = ItemRules::new(&schema, &fields, Mutation::Insert);
        let mut items = vec![
            PayloadItem::new(object(json!({"title": "a"}))),
            PayloadItem::new(object(json!({"author": "b"}))),
            PayloadItem::new(object(json!({"title": "c"}))),
        ];
        check_items(&rules, &mut items);
        assert!(items[0].error.is_none());
        assert!(items[1].error.is_some());
        assert!(items[2].error.is_none());
    }
}
