//! Per-request pipeline: CORS, version, field authorization, hooks, operation
//! dispatch, then finalization. Panics are caught at two boundaries so the
//! envelope is always well-formed.

use crate::config::{FieldIndex, Mutation};
use crate::driver::ContextKind;
use crate::error::HttpError;
use crate::model::Document;
use crate::request::{MethodKind, Request};
use crate::resource::Resource;
use crate::response::ResponseEnvelope;
use crate::service::{cors, get, mutation, visibility};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

/// Runs the whole pipeline and returns the finalized envelope.
pub async fn process(resource: &Resource, mut request: Request) -> ResponseEnvelope {
    let started = Instant::now();
    let mut envelope = ResponseEnvelope::for_request(&request);

    let staged = AssertUnwindSafe(run_stages(resource, &mut request, &mut envelope))
        .catch_unwind()
        .await;
    let documents = match staged {
        Ok(documents) => documents,
        Err(panic) => {
            envelope.set_status(&HttpError::internal_server_error(panic_message(panic.as_ref())));
            Vec::new()
        }
    };

    let finalized = AssertUnwindSafe(finalize(resource, &request, &mut envelope, documents))
        .catch_unwind()
        .await;
    if let Err(panic) = finalized {
        envelope.items.clear();
        envelope.set_status(&HttpError::internal_server_error(panic_message(panic.as_ref())));
    }

    envelope.meta.total_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    tracing::debug!(
        request_id = %envelope.meta.request_unique_id,
        method = %envelope.meta.method,
        url = %envelope.meta.url,
        status = envelope.meta.status_code,
        elapsed_ms = envelope.meta.total_time_ms,
        "request processed"
    );
    envelope
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "request processing panicked".to_string()
    }
}

async fn run_stages(
    resource: &Resource,
    request: &mut Request,
    envelope: &mut ResponseEnvelope,
) -> Vec<Box<dyn Document>> {
    if let Err(err) = authorize(resource, request, envelope) {
        tracing::debug!(error = %err, "request rejected");
        envelope.set_status(&err);
        return Vec::new();
    }

    let (documents, err) = match request.kind {
        MethodKind::Get => get::process(resource, request, envelope).await,
        MethodKind::Insert => mutation::process(resource, request, Mutation::Insert).await,
        MethodKind::Update => mutation::process(resource, request, Mutation::Update).await,
        MethodKind::Delete => mutation::process(resource, request, Mutation::Delete).await,
        MethodKind::Cors => (Vec::new(), None),
        MethodKind::Unsupported => (Vec::new(), Some(HttpError::method_not_allowed())),
    };
    if let Some(err) = err {
        envelope.set_status(&err);
    }
    documents
}

/// Checks that run before any operation, in order.
fn authorize(resource: &Resource, request: &Request, envelope: &mut ResponseEnvelope) -> Result<(), HttpError> {
    cors::negotiate(resource, request, envelope)?;

    if !resource.supports_version(&request.version) {
        return Err(HttpError::unsupported_version(&request.version));
    }

    let fields = resource.fields();
    let schema = resource.schema();
    let projected: Vec<String> = request.projection.keys().cloned().collect();
    check_fields(&projected, fields, |f| schema.projectable_fields.permits(f, &fields.json_fields))
        .map_err(|field| field.into_error(HttpError::field_not_projectable))?;

    if request.has_where() {
        let filtered = resource.driver().where_fields(resource.model(), &request.filter)?;
        check_fields(&filtered, fields, |f| schema.filterable_fields.permits(f, &fields.json_fields))
            .map_err(|field| field.into_error(HttpError::field_not_filterable))?;
    }

    if request.has_sort() {
        let sorted = resource.driver().sort_fields(resource.model(), &request.sort)?;
        check_fields(&sorted, fields, |f| schema.sortable_fields.permits(f, &fields.json_fields))
            .map_err(|field| field.into_error(HttpError::field_not_sortable))?;
    }

    if let Some(hook) = &resource.hooks().pre_request {
        hook(resource, request, &*envelope)?;
    }

    if let Some(hook) = &resource.hooks().auth {
        if !hook(resource, request, &*envelope) {
            return Err(HttpError::unauthorized());
        }
    }
    Ok(())
}

enum FieldRejection {
    Missing(String),
    NotPermitted(String),
}

impl FieldRejection {
    fn into_error(self, not_permitted: fn(&str) -> HttpError) -> HttpError {
        match self {
            FieldRejection::Missing(field) => HttpError::field_not_exists(&field),
            FieldRejection::NotPermitted(field) => not_permitted(&field),
        }
    }
}

/// Existence first across all fields, then permission.
fn check_fields<F>(requested: &[String], fields: &FieldIndex, permits: F) -> Result<(), FieldRejection>
where
    F: Fn(&str) -> bool,
{
    if let Some(missing) = requested.iter().find(|f| !fields.exists(f.as_str())) {
        return Err(FieldRejection::Missing(missing.clone()));
    }
    if let Some(denied) = requested.iter().find(|f| !permits(f.as_str())) {
        return Err(FieldRejection::NotPermitted(denied.clone()));
    }
    Ok(())
}

/// Always runs: render items, totals, post-request hook.
async fn finalize(
    resource: &Resource,
    request: &Request,
    envelope: &mut ResponseEnvelope,
    documents: Vec<Box<dyn Document>>,
) {
    envelope.items = visibility::render_items(resource.schema(), resource.fields(), &request.projection, &documents);

    let ctx = resource.driver_context(request, ContextKind::Total);
    match ctx.run(resource.driver().total(resource.model(), &request.filter, &ctx)).await {
        Ok(total) => envelope.meta.total = total,
        Err(err) => tracing::debug!(error = %err, "total unavailable"),
    }

    if let Some(hook) = &resource.hooks().post_request {
        if let Some(err) = hook(resource, request, &*envelope) {
            envelope.set_status(&err);
        }
    }
}
