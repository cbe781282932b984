//! Shared application state for all routes. The registry is frozen once the server starts.

use crate::registry::ResourceRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ResourceRegistry>,
}

impl AppState {
    pub fn new(registry: ResourceRegistry) -> Self {
        AppState {
            registry: Arc::new(registry),
        }
    }
}
