//! Documents: model instances the pipeline and drivers exchange.
//!
//! Concrete models are plain serde structs implementing [`DocumentModel`]; the blanket
//! impl turns them into [`Document`] trait objects. Field names are declared once in an
//! explicit [`FieldMeta`] table instead of being discovered at runtime.

use crate::error::{HttpError, ModelError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;

/// JSON name marking a field as not exposed.
pub const JSON_SKIP: &str = "-";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldMeta {
    /// Model-side name.
    pub name: &'static str,
    pub json: &'static str,
    pub storage: &'static str,
}

impl FieldMeta {
    pub const fn new(name: &'static str, json: &'static str, storage: &'static str) -> Self {
        FieldMeta { name, json, storage }
    }

    pub fn is_exposed(&self) -> bool {
        let json = self.json.trim();
        !json.is_empty() && json != JSON_SKIP
    }
}

/// Object-safe capability set used by the engine and storage drivers.
pub trait Document: fmt::Debug + Send + Sync {
    fn model_name(&self) -> &'static str;
    fn fields(&self) -> &'static [FieldMeta];
    fn create_instance(&self) -> Box<dyn Document>;

    fn id(&self) -> Option<Value>;
    fn set_id(&mut self, id: &str) -> Result<(), ModelError>;

    fn etag(&self) -> Option<Value>;
    fn create_etag(&mut self) -> Option<Value>;
    fn set_etag(&mut self, etag: &str) -> Result<(), ModelError>;

    fn error(&self) -> Option<&HttpError>;
    fn set_error(&mut self, error: Option<HttpError>);

    fn to_map(&self) -> Result<Map<String, Value>, ModelError>;
    /// Replaces the content with `map`. The error marker survives.
    fn load_map(&mut self, map: Map<String, Value>) -> Result<(), ModelError>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implemented by concrete model structs.
pub trait DocumentModel:
    Serialize + DeserializeOwned + Default + fmt::Debug + Send + Sync + 'static
{
    const MODEL_NAME: &'static str;
    const FIELDS: &'static [FieldMeta];

    fn id(&self) -> Option<Value>;
    fn set_id(&mut self, id: &str) -> Result<(), ModelError>;

    fn etag(&self) -> Option<Value> {
        None
    }

    fn create_etag(&mut self) -> Option<Value> {
        None
    }

    fn set_etag(&mut self, _etag: &str) -> Result<(), ModelError> {
        Ok(())
    }

    /// Storage for the per-document error; keep it `#[serde(skip)]`.
    fn error_slot(&self) -> &Option<HttpError>;
    fn error_slot_mut(&mut self) -> &mut Option<HttpError>;
}

impl<T: DocumentModel> Document for T {
    fn model_name(&self) -> &'static str {
        T::MODEL_NAME
    }

    fn fields(&self) -> &'static [FieldMeta] {
        T::FIELDS
    }

    fn create_instance(&self) -> Box<dyn Document> {
        Box::new(T::default())
    }

    fn id(&self) -> Option<Value> {
        DocumentModel::id(self)
    }

    fn set_id(&mut self, id: &str) -> Result<(), ModelError> {
        DocumentModel::set_id(self, id)
    }

    fn etag(&self) -> Option<Value> {
        DocumentModel::etag(self)
    }

    fn create_etag(&mut self) -> Option<Value> {
        DocumentModel::create_etag(self)
    }

    fn set_etag(&mut self, etag: &str) -> Result<(), ModelError> {
        DocumentModel::set_etag(self, etag)
    }

    fn error(&self) -> Option<&HttpError> {
        self.error_slot().as_ref()
    }

    fn set_error(&mut self, error: Option<HttpError>) {
        *self.error_slot_mut() = error;
    }

    fn to_map(&self) -> Result<Map<String, Value>, ModelError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(ModelError::Contract(format!(
                "{} serialized to a non-object value: {}",
                T::MODEL_NAME,
                other
            ))),
        }
    }

    fn load_map(&mut self, map: Map<String, Value>) -> Result<(), ModelError> {
        let error = self.error_slot_mut().take();
        let loaded: T = serde_json::from_value(Value::Object(map))?;
        *self = loaded;
        *self.error_slot_mut() = error;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Borrow a document as its concrete model type.
pub fn downcast_ref<T: DocumentModel>(document: &dyn Document) -> Option<&T> {
    document.as_any().downcast_ref::<T>()
}

/// String form of an ID or ETag value.
pub fn value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
