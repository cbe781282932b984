//! Registered resources, matched by URL pattern in registration order.

use crate::error::ConfigError;
use crate::resource::Resource;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<Arc<Resource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails when a resource with the same pattern is already registered.
    pub fn add_resource(&mut self, resource: Resource) -> Result<(), ConfigError> {
        if self.resources.iter().any(|r| r.pattern() == resource.pattern()) {
            return Err(ConfigError::PatternExists(resource.pattern().to_string()));
        }
        tracing::info!(
            resource = resource.name(),
            pattern = resource.pattern(),
            db_path = resource.db_path(),
            "resource registered"
        );
        self.resources.push(Arc::new(resource));
        Ok(())
    }

    pub fn find_matched(&self, path: &str) -> Option<Arc<Resource>> {
        self.resources.iter().find(|r| r.matches(path)).cloned()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
