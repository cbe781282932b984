//! Field visibility applied to every returned item: hidden, projection, erased.

use crate::config::{FieldIndex, SchemaConfig};
use crate::error::HttpError;
use crate::model::Document;
use crate::response::item_meta;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Converts documents to response items, applying visibility and per-item status.
pub fn render_items(
    schema: &SchemaConfig,
    fields: &FieldIndex,
    projection: &BTreeMap<String, bool>,
    documents: &[Box<dyn Document>],
) -> Vec<Map<String, Value>> {
    let hidden = schema.hidden_fields.expand(&fields.non_reserved);
    let erased = schema.erased_fields.expand(&fields.non_reserved);
    documents
        .iter()
        .map(|document| {
            let (mut item, error) = match document.to_map() {
                Ok(item) => (item, document.error().cloned()),
                Err(e) => (Map::new(), Some(HttpError::server_object_malformed(e))),
            };
            apply_visibility(&mut item, &hidden, &erased, projection);
            if let Some(error) = error {
                item.insert("_meta".to_string(), item_meta(&error));
            }
            item
        })
        .collect()
}

pub fn apply_visibility(
    item: &mut Map<String, Value>,
    hidden: &[String],
    erased: &[String],
    projection: &BTreeMap<String, bool>,
) {
    for field in hidden {
        if projection.get(field) != Some(&true) {
            item.remove(field);
        }
    }
    for (field, _) in projection.iter().filter(|(_, keep)| !**keep) {
        item.remove(field);
    }
    for field in erased {
        if let Some(Value::String(text)) = item.get_mut(field) {
            text.clear();
        }
    }
}
