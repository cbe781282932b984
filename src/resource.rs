//! Resource descriptor: a model bound to a storage driver, URL pattern, versions and field schema.

use crate::config::{
    compile_patterns, validate_model_fields, validate_presence, validate_reserved_fields,
    validate_schema_fields, CompiledCors, FieldIndex, Limits, Operations, ResourceConfig,
    SchemaConfig, DEFAULT_DRIVER_TIMEOUT_MS,
};
use crate::driver::{ContextKind, DriverContext, StorageDriver};
use crate::error::ConfigError;
use crate::hooks::ResourceHooks;
use crate::model::Document;
use crate::request::Request;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Validated, immutable resource. Build with [`Resource::builder`].
pub struct Resource {
    pattern: String,
    compiled_pattern: Regex,
    db_path: String,
    name: String,
    id_field: String,
    etag_field: String,
    schema: SchemaConfig,
    fields: FieldIndex,
    versions: Vec<Regex>,
    operations: Operations,
    limits: Limits,
    cors: Option<CompiledCors>,
    hooks: ResourceHooks,
    driver: Arc<dyn StorageDriver>,
    model: Box<dyn Document>,
    driver_timeout: Duration,
}

/// Model-side names fall back to the JSON names when not given.
fn model_side_name(model_name: &str, json_name: &str) -> String {
    if model_name.trim().is_empty() {
        json_name.trim().to_string()
    } else {
        model_name.trim().to_string()
    }
}

pub struct ResourceBuilder {
    config: ResourceConfig,
    driver: Option<Arc<dyn StorageDriver>>,
    model: Option<Box<dyn Document>>,
    hooks: ResourceHooks,
}

impl ResourceBuilder {
    pub fn driver(mut self, driver: Arc<dyn StorageDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn model<D: Document + 'static>(mut self, model: D) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    pub fn boxed_model(mut self, model: Box<dyn Document>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn hooks(mut self, hooks: ResourceHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> Result<Resource, ConfigError> {
        let ResourceBuilder {
            config,
            driver,
            model,
            hooks,
        } = self;
        let schema = validate_presence(&config, driver.is_some(), model.is_some())?.clone();
        let (Some(driver), Some(model)) = (driver, model) else {
            return Err(ConfigError::DriverNotSet);
        };

        let compiled_pattern = Regex::new(&config.pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: config.pattern.clone(),
            source,
        })?;

        let model_name = model.model_name();
        validate_model_fields(model.fields(), model_name)?;
        let fields = FieldIndex::build(model.fields(), &schema);
        validate_reserved_fields(&config, &schema, model.fields(), model_name)?;
        validate_schema_fields(&schema, &fields, model_name)?;

        let versions = compile_patterns(&config.supported_versions, |pattern, source| {
            ConfigError::InvalidVersionPattern { pattern, source }
        })?;
        let cors = config.cors.as_ref().map(CompiledCors::compile).transpose()?;
        let limits = config.limits.with_defaults();
        let timeout_ms = if config.driver_timeout_ms == 0 {
            DEFAULT_DRIVER_TIMEOUT_MS
        } else {
            config.driver_timeout_ms
        };

        let id_field = model_side_name(&config.id_field, &schema.json_id_field);
        let etag_field = model_side_name(&config.etag_field, &schema.json_etag_field);
        driver
            .test_model(&id_field, &etag_field, model.as_ref(), &config.db_path)
            .map_err(ConfigError::UnableToTestModel)?;

        tracing::debug!(
            resource = %config.resource_name,
            model = model_name,
            fields = ?fields.json_fields,
            "resource validated"
        );

        Ok(Resource {
            pattern: config.pattern,
            compiled_pattern,
            db_path: config.db_path,
            name: config.resource_name,
            id_field,
            etag_field,
            schema,
            fields,
            versions,
            operations: config.operations,
            limits,
            cors,
            hooks,
            driver,
            model,
            driver_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

impl Resource {
    pub fn builder(config: ResourceConfig) -> ResourceBuilder {
        ResourceBuilder {
            config,
            driver: None,
            model: None,
            hooks: ResourceHooks::default(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn compiled_pattern(&self) -> &Regex {
        &self.compiled_pattern
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model-side ID and ETag field names.
    pub fn model_id_fields(&self) -> (&str, &str) {
        (&self.id_field, &self.etag_field)
    }

    pub fn schema(&self) -> &SchemaConfig {
        &self.schema
    }

    pub fn fields(&self) -> &FieldIndex {
        &self.fields
    }

    pub fn operations(&self) -> &Operations {
        &self.operations
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn cors(&self) -> Option<&CompiledCors> {
        self.cors.as_ref()
    }

    pub fn hooks(&self) -> &ResourceHooks {
        &self.hooks
    }

    pub fn driver(&self) -> &dyn StorageDriver {
        self.driver.as_ref()
    }

    pub fn model(&self) -> &dyn Document {
        self.model.as_ref()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.compiled_pattern.is_match(path)
    }

    /// An empty version list accepts every version.
    pub fn supports_version(&self, version: &str) -> bool {
        self.versions.is_empty() || self.versions.iter().any(|v| v.is_match(version))
    }

    /// Context for one driver call, from the hook when set.
    pub fn driver_context(&self, request: &Request, kind: ContextKind) -> DriverContext {
        match &self.hooks.create_context {
            Some(hook) => hook(self, request, kind),
            None => DriverContext::with_timeout(kind, self.driver_timeout),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("pattern", &self.pattern)
            .field("db_path", &self.db_path)
            .field("name", &self.name)
            .field("model", &self.model.model_name())
            .field("operations", &self.operations)
            .field("limits", &self.limits)
            .field("hooks", &self.hooks)
            .finish()
    }
}
