//! Field schema: per-category field sets with a wildcard marker.

use crate::config::Mutation;
use crate::json_validator::JsonValidator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Wildcard marker meaning "all non-reserved JSON fields".
pub const FIELD_ANY: &str = "*";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet(Vec<String>);

impl FieldSet {
    pub fn any() -> Self {
        FieldSet(vec![FIELD_ANY.to_string()])
    }

    pub fn none() -> Self {
        FieldSet(Vec::new())
    }

    pub fn of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSet(fields.into_iter().map(Into::into).collect())
    }

    pub fn is_any(&self) -> bool {
        self.0.iter().any(|f| f == FIELD_ANY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Explicitly listed names, wildcard excluded.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str).filter(|f| *f != FIELD_ANY)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.names().any(|f| f == field)
    }

    /// Concrete names: the wildcard resolves to `universe`.
    pub fn expand(&self, universe: &[String]) -> Vec<String> {
        if self.is_any() {
            universe.to_vec()
        } else {
            self.names().map(str::to_string).collect()
        }
    }

    pub fn permits(&self, field: &str, universe: &[String]) -> bool {
        if self.is_any() {
            universe.iter().any(|f| f == field)
        } else {
            self.contains(field)
        }
    }
}

/// Optional per-operation JSON validators.
#[derive(Clone, Default)]
pub struct Validators {
    pub get: Option<Arc<dyn JsonValidator>>,
    pub insert: Option<Arc<dyn JsonValidator>>,
    pub update: Option<Arc<dyn JsonValidator>>,
    pub delete: Option<Arc<dyn JsonValidator>>,
}

impl Validators {
    pub fn for_mutation(&self, mutation: Mutation) -> Option<&dyn JsonValidator> {
        match mutation {
            Mutation::Insert => self.insert.as_deref(),
            Mutation::Update => self.update.as_deref(),
            Mutation::Delete => self.delete.as_deref(),
        }
    }
}

impl fmt::Debug for Validators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validators")
            .field("get", &self.get.is_some())
            .field("insert", &self.insert.is_some())
            .field("update", &self.update.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub json_id_field: String,
    /// Empty when the model carries no ETag.
    pub json_etag_field: String,
    pub filterable_fields: FieldSet,
    pub sortable_fields: FieldSet,
    pub projectable_fields: FieldSet,
    pub insertable_fields: FieldSet,
    pub updatable_fields: FieldSet,
    pub hidden_fields: FieldSet,
    pub erased_fields: FieldSet,
    pub required_on_insert_fields: FieldSet,
    /// Defaults to the ID and ETag fields.
    pub required_on_update_fields: Option<FieldSet>,
    /// Defaults to the ID and ETag fields.
    pub required_on_delete_fields: Option<FieldSet>,
    pub optimize_on_insert_fields: FieldSet,
    pub optimize_on_update_fields: FieldSet,
    pub optimize_on_delete_fields: FieldSet,
    #[serde(skip)]
    pub validators: Validators,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        SchemaConfig {
            json_id_field: String::new(),
            json_etag_field: String::new(),
            filterable_fields: FieldSet::any(),
            sortable_fields: FieldSet::any(),
            projectable_fields: FieldSet::any(),
            insertable_fields: FieldSet::any(),
            updatable_fields: FieldSet::any(),
            hidden_fields: FieldSet::none(),
            erased_fields: FieldSet::none(),
            required_on_insert_fields: FieldSet::none(),
            required_on_update_fields: None,
            required_on_delete_fields: None,
            optimize_on_insert_fields: FieldSet::any(),
            optimize_on_update_fields: FieldSet::any(),
            optimize_on_delete_fields: FieldSet::none(),
            validators: Validators::default(),
        }
    }
}

impl SchemaConfig {
    pub fn new(json_id_field: impl Into<String>, json_etag_field: impl Into<String>) -> Self {
        SchemaConfig {
            json_id_field: json_id_field.into(),
            json_etag_field: json_etag_field.into(),
            ..Default::default()
        }
    }

    pub fn etag_field(&self) -> Option<&str> {
        let field = self.json_etag_field.trim();
        (!field.is_empty()).then_some(field)
    }

    fn reserved_set(&self) -> FieldSet {
        let mut fields = vec![self.json_id_field.clone()];
        fields.extend(self.etag_field().map(str::to_string));
        FieldSet(fields)
    }

    pub fn required_fields(&self, mutation: Mutation) -> FieldSet {
        match mutation {
            Mutation::Insert => self.required_on_insert_fields.clone(),
            Mutation::Update => self
                .required_on_update_fields
                .clone()
                .unwrap_or_else(|| self.reserved_set()),
            Mutation::Delete => self
                .required_on_delete_fields
                .clone()
                .unwrap_or_else(|| self.reserved_set()),
        }
    }

    pub fn optimize_fields(&self, mutation: Mutation) -> &FieldSet {
        match mutation {
            Mutation::Insert => &self.optimize_on_insert_fields,
            Mutation::Update => &self.optimize_on_update_fields,
            Mutation::Delete => &self.optimize_on_delete_fields,
        }
    }

    /// Every rule category with its name, used for unknown-field checks.
    pub fn rule_sets(&self) -> Vec<(&'static str, FieldSet)> {
        vec![
            ("filterable", self.filterable_fields.clone()),
            ("sortable", self.sortable_fields.clone()),
            ("projectable", self.projectable_fields.clone()),
            ("insertable", self.insertable_fields.clone()),
            ("updatable", self.updatable_fields.clone()),
            ("hidden", self.hidden_fields.clone()),
            ("erased", self.erased_fields.clone()),
            ("required_on_insert", self.required_fields(Mutation::Insert)),
            ("required_on_update", self.required_fields(Mutation::Update)),
            ("required_on_delete", self.required_fields(Mutation::Delete)),
            ("optimize_on_insert", self.optimize_on_insert_fields.clone()),
            ("optimize_on_update", self.optimize_on_update_fields.clone()),
            ("optimize_on_delete", self.optimize_on_delete_fields.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe() -> Vec<String> {
        vec!["title".into(), "author".into(), "pages".into()]
    }

    #[test]
    fn test_wildcard_equals_enumerating_universe() {
        let all = universe();
        let any = FieldSet::any();
        let enumerated = FieldSet::of(all.clone());
        for field in ["title", "author", "pages", "id", "missing"] {
            assert_eq!(any.permits(field, &all), enumerated.permits(field, &all), "{field}");
        }
        assert_eq!(any.expand(&all), enumerated.expand(&all));
    }

    #[test]
    fn test_wildcard_covers_any_subset() {
        let all = universe();
        let subset = FieldSet::of(["author"]);
        for field in subset.names() {
            assert!(FieldSet::any().permits(field, &all));
        }
        assert!(!subset.permits("title", &all));
    }

    #[test]
    fn test_required_defaults_to_reserved_fields() {
        let schema = SchemaConfig::new("id", "etag");
        assert_eq!(schema.required_fields(Mutation::Update), FieldSet::of(["id", "etag"]));
        assert_eq!(schema.required_fields(Mutation::Delete), FieldSet::of(["id", "etag"]));
        assert!(schema.required_fields(Mutation::Insert).is_empty());

        let no_etag = SchemaConfig::new("id", "");
        assert_eq!(no_etag.required_fields(Mutation::Update), FieldSet::of(["id"]));
    }

    #[test]
    fn test_schema_from_manifest() {
        let schema: SchemaConfig = serde_json::from_str(
            r#"{"json_id_field": "id", "hidden_fields": ["secret"], "sortable_fields": ["title"]}"#,
        )
        .unwrap();
        assert!(schema.filterable_fields.is_any());
        assert!(schema.hidden_fields.contains("secret"));
        assert!(!schema.sortable_fields.is_any());
        assert_eq!(schema.etag_field(), None);
    }
}
