//! In-memory storage driver. Rows are JSON objects keyed by the model's JSON field names.
//!
//! `where` is a JSON object of field equalities; `$and`/`$or` take arrays of such objects.
//! `sort` is a JSON object of field to `1` (ascending) or `-1` (descending).

use crate::driver::{check_document_contract, DriverContext, StorageDriver};
use crate::error::{HttpError, ModelError};
use crate::model::Document;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Collection {
    db_path: String,
    id_field: String,
    etag_field: Option<String>,
    rows: Vec<Map<String, Value>>,
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryDriver {
    collections: Arc<RwLock<HashMap<&'static str, Collection>>>,
}

type Row = Map<String, Value>;

fn lock_error() -> HttpError {
    HttpError::low_level_driver("in-memory store lock poisoned")
}

fn parse_object(raw: &str) -> Result<Option<Map<String, Value>>, String> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(raw).map_err(|e| e.to_string())? {
        Value::Object(map) => Ok(Some(map)),
        _ => Err("expected a JSON object".into()),
    }
}

fn collect_fields(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if !key.starts_with('$') && !out.contains(key) {
                    out.push(key.clone());
                }
                collect_fields(nested, out);
            }
        }
        Value::Array(values) => values.iter().for_each(|v| collect_fields(v, out)),
        _ => {}
    }
}

fn matches_filter(row: &Row, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| match key.as_str() {
        "$and" => sub_filters(expected).all(|f| matches_filter(row, f)),
        "$or" => sub_filters(expected).any(|f| matches_filter(row, f)),
        _ => row.get(key).unwrap_or(&Value::Null) == expected,
    })
}

fn sub_filters(value: &Value) -> impl Iterator<Item = &Map<String, Value>> {
    value.as_array().into_iter().flatten().filter_map(Value::as_object)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn parse_sort(sort: &str) -> Result<Vec<(String, bool)>, HttpError> {
    let Some(map) = parse_object(sort).map_err(HttpError::malformed_sort)? else {
        return Ok(Vec::new());
    };
    map.into_iter()
        .map(|(field, direction)| match direction.as_i64() {
            Some(1) => Ok((field, true)),
            Some(-1) => Ok((field, false)),
            _ => Err(HttpError::malformed_sort(format!("direction of '{}' must be 1 or -1", field))),
        })
        .collect()
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows currently stored for the model, in insertion order.
    pub fn rows(&self, model: &dyn Document) -> Vec<Row> {
        self.collections
            .read()
            .map(|c| c.get(model.model_name()).map(|c| c.rows.clone()).unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn db_path(&self, model: &dyn Document) -> Option<String> {
        self.collections
            .read()
            .ok()
            .and_then(|c| c.get(model.model_name()).map(|c| c.db_path.clone()))
    }

    fn with_collection<T>(
        &self,
        model: &dyn Document,
        f: impl FnOnce(&mut Collection) -> Result<T, HttpError>,
    ) -> Result<T, HttpError> {
        let mut collections = self.collections.write().map_err(|_| lock_error())?;
        let collection = collections
            .get_mut(model.model_name())
            .ok_or_else(|| HttpError::low_level_driver(format!("model {} is not bound", model.model_name())))?;
        f(collection)
    }

    fn matching(&self, model: &dyn Document, filter: &str) -> Result<Vec<Row>, HttpError> {
        let filter = parse_object(filter).map_err(HttpError::malformed_where)?;
        self.with_collection(model, |collection| {
            Ok(collection
                .rows
                .iter()
                .filter(|row| filter.as_ref().map_or(true, |f| matches_filter(row, f)))
                .cloned()
                .collect())
        })
    }
}

/// Index of the row matching the document's ID and, when present, its ETag.
fn locate(collection: &Collection, document: &dyn Document) -> Result<usize, HttpError> {
    let id = document.id().ok_or_else(HttpError::object_not_found)?;
    let etag = document.etag().filter(|e| !e.is_null());
    let found: Vec<usize> = collection
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.get(&collection.id_field) == Some(&id))
        .filter(|(_, row)| match (&collection.etag_field, &etag) {
            (Some(field), Some(etag)) => row.get(field) == Some(etag),
            _ => true,
        })
        .map(|(index, _)| index)
        .collect();
    match found.as_slice() {
        [] => Err(HttpError::object_not_found()),
        [index] => Ok(*index),
        _ => Err(HttpError::too_many_objects()),
    }
}

#[async_trait]
impl StorageDriver for InMemoryDriver {
    fn test_model(
        &self,
        id_field: &str,
        etag_field: &str,
        model: &dyn Document,
        db_path: &str,
    ) -> Result<(), ModelError> {
        let json_name = |name: &str| {
            model
                .fields()
                .iter()
                .find(|m| m.is_exposed() && (m.name == name || m.json == name))
                .map(|m| m.json.to_string())
        };
        let id_json = json_name(id_field)
            .ok_or_else(|| ModelError::Contract(format!("ID field '{}' is not exposed", id_field)))?;
        let etag_json = match etag_field.trim() {
            "" => None,
            name => Some(
                json_name(name)
                    .ok_or_else(|| ModelError::Contract(format!("ETag field '{}' is not exposed", name)))?,
            ),
        };

        let sample_id = uuid::Uuid::new_v4().simple().to_string();
        check_document_contract(model, &sample_id, etag_json.is_some())?;

        let mut collections = self
            .collections
            .write()
            .map_err(|_| ModelError::Store("in-memory store lock poisoned".into()))?;
        let collection = collections.entry(model.model_name()).or_default();
        collection.db_path = db_path.to_string();
        collection.id_field = id_json;
        collection.etag_field = etag_json;
        Ok(())
    }

    async fn find(
        &self,
        model: &dyn Document,
        filter: &str,
        sort: &str,
        page: u64,
        per_page: u64,
        _ctx: &DriverContext,
    ) -> Result<Vec<Box<dyn Document>>, HttpError> {
        let order = parse_sort(sort)?;
        let mut rows = self.matching(model, filter)?;
        rows.sort_by(|a, b| {
            order
                .iter()
                .map(|(field, ascending)| {
                    let ord = compare_values(
                        a.get(field).unwrap_or(&Value::Null),
                        b.get(field).unwrap_or(&Value::Null),
                    );
                    if *ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let skip = usize::try_from(page.saturating_mul(per_page)).unwrap_or(usize::MAX);
        let take = usize::try_from(per_page).unwrap_or(usize::MAX);
        rows.into_iter()
            .skip(skip)
            .take(take)
            .map(|row| {
                let mut document = model.create_instance();
                document.load_map(row).map_err(HttpError::server_object_malformed)?;
                Ok(document)
            })
            .collect()
    }

    async fn total(&self, model: &dyn Document, filter: &str, _ctx: &DriverContext) -> Result<u64, HttpError> {
        Ok(self.matching(model, filter)?.len() as u64)
    }

    async fn insert(
        &self,
        model: &dyn Document,
        documents: &mut [Box<dyn Document>],
        _ctx: &DriverContext,
    ) -> Result<(), HttpError> {
        self.with_collection(model, |collection| {
            for document in documents.iter_mut().filter(|d| d.error().is_none()) {
                document.create_etag();
                let id = uuid::Uuid::new_v4().simple().to_string();
                let stored = document
                    .set_id(&id)
                    .and_then(|_| document.to_map());
                match stored {
                    Ok(row) => collection.rows.push(row),
                    Err(e) => document.set_error(Some(HttpError::server_object_malformed(e))),
                }
            }
            Ok(())
        })
    }

    async fn update(
        &self,
        model: &dyn Document,
        documents: &mut [Box<dyn Document>],
        _ctx: &DriverContext,
    ) -> Result<(), HttpError> {
        self.with_collection(model, |collection| {
            for document in documents.iter_mut().filter(|d| d.error().is_none()) {
                let index = match locate(collection, document.as_ref()) {
                    Ok(index) => index,
                    Err(err) => {
                        document.set_error(Some(err));
                        continue;
                    }
                };
                document.create_etag();
                let changes = match document.to_map() {
                    Ok(changes) => changes,
                    Err(e) => {
                        document.set_error(Some(HttpError::server_object_malformed(e)));
                        continue;
                    }
                };
                let id_field = collection.id_field.clone();
                let row = &mut collection.rows[index];
                for (field, value) in changes.into_iter().filter(|(field, _)| *field != id_field) {
                    row.insert(field, value);
                }
                if let Err(e) = document.load_map(row.clone()) {
                    document.set_error(Some(HttpError::server_object_malformed(e)));
                }
            }
            Ok(())
        })
    }

    async fn delete(
        &self,
        model: &dyn Document,
        documents: &mut [Box<dyn Document>],
        _ctx: &DriverContext,
    ) -> Result<(), HttpError> {
        self.with_collection(model, |collection| {
            for document in documents.iter_mut().filter(|d| d.error().is_none()) {
                match locate(collection, document.as_ref()) {
                    Ok(index) => {
                        let row = collection.rows.remove(index);
                        if let Err(e) = document.load_map(row) {
                            document.set_error(Some(HttpError::server_object_malformed(e)));
                        }
                    }
                    Err(err) => document.set_error(Some(err)),
                }
            }
            Ok(())
        })
    }

    fn where_fields(&self, _model: &dyn Document, filter: &str) -> Result<Vec<String>, HttpError> {
        let mut fields = Vec::new();
        if let Some(map) = parse_object(filter).map_err(HttpError::malformed_where)? {
            collect_fields(&Value::Object(map), &mut fields);
        }
        Ok(fields)
    }

    fn sort_fields(&self, _model: &dyn Document, sort: &str) -> Result<Vec<String>, HttpError> {
        Ok(parse_sort(sort)?.into_iter().map(|(field, _)| field).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ContextKind;
    use crate::error::ErrorKind;
    use crate::model::{DocumentModel, FieldMeta};
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Task {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rev: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        priority: Option<i64>,
        #[serde(skip)]
        error: Option<HttpError>,
    }

    impl DocumentModel for Task {
        const MODEL_NAME: &'static str = "Task";
        const FIELDS: &'static [FieldMeta] = &[
            FieldMeta::new("id", "id", "_id"),
            FieldMeta::new("rev", "rev", "_rev"),
            FieldMeta::new("name", "name", "name"),
            FieldMeta::new("priority", "priority", "priority"),
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
            self.rev.map(Value::from)
        }

        fn create_etag(&mut self) -> Option<Value> {
            let next = self.rev.unwrap_or(0) + 1;
            self.rev = Some(next);
            Some(Value::from(next))
        }

        fn set_etag(&mut self, etag: &str) -> Result<(), ModelError> {
            self.rev = Some(etag.parse().map_err(|_| ModelError::InvalidEtag(etag.to_string()))?);
            Ok(())
        }

        fn error_slot(&self) -> &Option<HttpError> {
            &self.error
        }

        fn error_slot_mut(&mut self) -> &mut Option<HttpError> {
            &mut self.error
        }
    }

    fn ctx(kind: ContextKind) -> DriverContext {
        DriverContext::with_timeout(kind, Duration::from_secs(5))
    }

    fn task(name: &str, priority: i64) -> Box<dyn Document> {
        Box::new(Task {
            name: Some(name.to_string()),
            priority: Some(priority),
            ..Task::default()
        })
    }

    async fn seeded() -> InMemoryDriver {
        let driver = InMemoryDriver::new();
        driver.test_model("id", "rev", &Task::default(), "work.tasks").unwrap();
        let mut docs = vec![task("write", 2), task("review", 1), task("ship", 3)];
        driver.insert(&Task::default(), &mut docs, &ctx(ContextKind::Insert)).await.unwrap();
        driver
    }

    #[test]
    fn test_test_model_binds_collection() {
        let driver = InMemoryDriver::new();
        driver.test_model("id", "rev", &Task::default(), "work.tasks").unwrap();
        assert_eq!(driver.db_path(&Task::default()).as_deref(), Some("work.tasks"));

        let err = driver.test_model("uid", "", &Task::default(), "work.tasks").unwrap_err();
        assert!(matches!(err, ModelError::Contract(_)));
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_etag() {
        let driver = seeded().await;
        let rows = driver.rows(&Task::default());
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.get("id").and_then(Value::as_str).is_some_and(|id| id.len() == 32)));
        assert!(rows.iter().all(|r| r.get("rev") == Some(&Value::from(1))));
    }

    #[tokio::test]
    async fn test_find_filters_sorts_and_pages() {
        let driver = seeded().await;
        let model = Task::default();

        let sorted = driver
            .find(&model, "", r#"{"priority": -1}"#, 0, 2, &ctx(ContextKind::Find))
            .await
            .unwrap();
        let names: Vec<_> = sorted.iter().map(|d| d.to_map().unwrap()["name"].clone()).collect();
        assert_eq!(names, vec![Value::from("ship"), Value::from("write")]);

        let filter = r#"{"$or": [{"name": "ship"}, {"priority": 1}]}"#;
        let found = driver.find(&model, filter, "", 0, 10, &ctx(ContextKind::Find)).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(driver.total(&model, filter, &ctx(ContextKind::Total)).await.unwrap(), 2);

        let second_page = driver
            .find(&model, "", r#"{"priority": 1}"#, 1, 2, &ctx(ContextKind::Find))
            .await
            .unwrap();
        assert_eq!(second_page.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_modifiers() {
        let driver = seeded().await;
        let model = Task::default();
        let err = driver.find(&model, "", r#"{"priority": 2}"#, 0, 1, &ctx(ContextKind::Find)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedSort);
        let err = driver.where_fields(&model, "[1]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedWhere);
    }

    #[test]
    fn test_where_and_sort_fields() {
        let driver = InMemoryDriver::new();
        let model = Task::default();
        let fields = driver
            .where_fields(&model, r#"{"$and": [{"name": "a"}, {"priority": 1}], "name": "b"}"#)
            .unwrap();
        assert_eq!(fields, vec!["name".to_string(), "priority".to_string()]);
        assert_eq!(driver.sort_fields(&model, r#"{"priority": 1}"#).unwrap(), vec!["priority".to_string()]);
    }

    #[tokio::test]
    async fn test_update_requires_matching_etag() {
        let driver = seeded().await;
        let model = Task::default();
        let stored = driver.rows(&model);
        let id = stored[0]["id"].as_str().unwrap().to_string();

        let mut docs: Vec<Box<dyn Document>> = vec![
            Box::new(Task {
                id: Some(id.clone()),
                rev: Some(7),
                name: Some("stale".into()),
                ..Task::default()
            }),
            Box::new(Task {
                id: Some(id.clone()),
                rev: Some(1),
                name: Some("rewrite".into()),
                ..Task::default()
            }),
        ];
        driver.update(&model, &mut docs, &ctx(ContextKind::Update)).await.unwrap();

        assert_eq!(docs[0].error().map(|e| e.kind()), Some(ErrorKind::ObjectNotFound));
        assert!(docs[1].error().is_none());
        let row = &driver.rows(&model)[0];
        assert_eq!(row["name"], "rewrite");
        assert_eq!(row["priority"], 2);
        assert_eq!(row["rev"], 2);
    }

    #[tokio::test]
    async fn test_delete_skips_documents_with_errors() {
        let driver = seeded().await;
        let model = Task::default();
        let id = driver.rows(&model)[1]["id"].as_str().unwrap().to_string();

        let mut flagged = Task {
            id: Some(id.clone()),
            ..Task::default()
        };
        flagged.error = Some(HttpError::payload_invalid());
        let mut docs: Vec<Box<dyn Document>> = vec![Box::new(flagged)];
        driver.delete(&model, &mut docs, &ctx(ContextKind::Delete)).await.unwrap();
        assert_eq!(driver.rows(&model).len(), 3);

        let mut docs: Vec<Box<dyn Document>> = vec![Box::new(Task {
            id: Some(id),
            ..Task::default()
        })];
        driver.delete(&model, &mut docs, &ctx(ContextKind::Delete)).await.unwrap();
        assert_eq!(driver.rows(&model).len(), 2);
        assert!(docs[0].error().is_none());
    }
}
