//! Optional lifecycle callbacks bound to a resource at construction.

use crate::driver::{ContextKind, DriverContext};
use crate::error::HttpError;
use crate::model::Document;
use crate::request::Request;
use crate::resource::Resource;
use crate::response::ResponseEnvelope;
use std::fmt;
use std::sync::Arc;

pub type AuthHook = Arc<dyn Fn(&Resource, &Request, &ResponseEnvelope) -> bool + Send + Sync>;

pub type PreRequestHook =
    Arc<dyn Fn(&Resource, &Request, &ResponseEnvelope) -> Result<(), HttpError> + Send + Sync>;

/// Returning `Some` replaces the response status.
pub type PostRequestHook =
    Arc<dyn Fn(&Resource, &Request, &ResponseEnvelope) -> Option<HttpError> + Send + Sync>;

/// Receives the current aggregate error and returns the one to keep.
pub type DocumentsHook = Arc<
    dyn Fn(&Resource, &Request, &mut [Box<dyn Document>], Option<HttpError>) -> Option<HttpError>
        + Send
        + Sync,
>;

pub type CreateContextHook = Arc<dyn Fn(&Resource, &Request, ContextKind) -> DriverContext + Send + Sync>;

#[derive(Clone, Default)]
pub struct ResourceHooks {
    pub auth: Option<AuthHook>,
    pub pre_request: Option<PreRequestHook>,
    pub post_request: Option<PostRequestHook>,
    pub fetched: Option<DocumentsHook>,
    pub inserting: Option<DocumentsHook>,
    pub inserted: Option<DocumentsHook>,
    pub updating: Option<DocumentsHook>,
    pub updated: Option<DocumentsHook>,
    pub deleting: Option<DocumentsHook>,
    pub deleted: Option<DocumentsHook>,
    pub create_context: Option<CreateContextHook>,
}

impl ResourceHooks {
    pub fn on_auth<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, &ResponseEnvelope) -> bool + Send + Sync + 'static,
    {
        self.auth = Some(Arc::new(hook));
        self
    }

    pub fn on_pre_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, &ResponseEnvelope) -> Result<(), HttpError> + Send + Sync + 'static,
    {
        self.pre_request = Some(Arc::new(hook));
        self
    }

    pub fn on_post_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, &ResponseEnvelope) -> Option<HttpError> + Send + Sync + 'static,
    {
        self.post_request = Some(Arc::new(hook));
        self
    }

    pub fn on_create_context<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, ContextKind) -> DriverContext + Send + Sync + 'static,
    {
        self.create_context = Some(Arc::new(hook));
        self
    }

    pub fn on_fetched<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, &mut [Box<dyn Document>], Option<HttpError>) -> Option<HttpError>
            + Send
            + Sync
            + 'static,
    {
        self.fetched = Some(Arc::new(hook));
        self
    }

    pub fn on_inserting<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, &mut [Box<dyn Document>], Option<HttpError>) -> Option<HttpError>
            + Send
            + Sync
            + 'static,
    {
        self.inserting = Some(Arc::new(hook));
        self
    }

    pub fn on_inserted<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, &mut [Box<dyn Document>], Option<HttpError>) -> Option<HttpError>
            + Send
            + Sync
            + 'static,
    {
        self.inserted = Some(Arc::new(hook));
        self
    }

    pub fn on_updating<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, &mut [Box<dyn Document>], Option<HttpError>) -> Option<HttpError>
            + Send
            + Sync
            + 'static,
    {
        self.updating = Some(Arc::new(hook));
        self
    }

    pub fn on_updated<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, &mut [Box<dyn Document>], Option<HttpError>) -> Option<HttpError>
            + Send
            + Sync
            + 'static,
    {
        self.updated = Some(Arc::new(hook));
        self
    }

    pub fn on_deleting<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, &mut [Box<dyn Document>], Option<HttpError>) -> Option<HttpError>
            + Send
            + Sync
            + 'static,
    {
        self.deleting = Some(Arc::new(hook));
        self
    }

    pub fn on_deleted<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &Request, &mut [Box<dyn Document>], Option<HttpError>) -> Option<HttpError>
            + Send
            + Sync
            + 'static,
    {
        self.deleted = Some(Arc::new(hook));
        self
    }
}

/// Runs an optional documents hook; an absent hook keeps `current`.
pub(crate) fn call_documents_hook(
    hook: Option<&DocumentsHook>,
    resource: &Resource,
    request: &Request,
    documents: &mut [Box<dyn Document>],
    current: Option<HttpError>,
) -> Option<HttpError> {
    match hook {
        Some(hook) => hook(resource, request, documents, current),
        None => current,
    }
}

impl fmt::Debug for ResourceHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<&str> = [
            ("auth", self.auth.is_some()),
            ("pre_request", self.pre_request.is_some()),
            ("post_request", self.post_request.is_some()),
            ("fetched", self.fetched.is_some()),
            ("inserting", self.inserting.is_some()),
            ("inserted", self.inserted.is_some()),
            ("updating", self.updating.is_some()),
            ("updated", self.updated.is_some()),
            ("deleting", self.deleting.is_some()),
            ("deleted", self.deleted.is_some()),
            ("create_context", self.create_context.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect();
        f.debug_struct("ResourceHooks").field("set", &set).finish()
    }
}
