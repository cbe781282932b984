//! Insert, update and delete share one flow: preamble, per-item checks,
//! document conversion, before hook, driver call, after hook.

use crate::config::Mutation;
use crate::driver::ContextKind;
use crate::error::HttpError;
use crate::hooks::{call_documents_hook, DocumentsHook};
use crate::model::Document;
use crate::request::{PayloadItem, Request};
use crate::resource::Resource;
use crate::service::validation::{check_items, ItemRules};

fn context_kind(mutation: Mutation) -> ContextKind {
    match mutation {
        Mutation::Insert => ContextKind::Insert,
        Mutation::Update => ContextKind::Update,
        Mutation::Delete => ContextKind::Delete,
    }
}

fn hooks_for(resource: &Resource, mutation: Mutation) -> (Option<&DocumentsHook>, Option<&DocumentsHook>) {
    let hooks = resource.hooks();
    match mutation {
        Mutation::Insert => (hooks.inserting.as_ref(), hooks.inserted.as_ref()),
        Mutation::Update => (hooks.updating.as_ref(), hooks.updated.as_ref()),
        Mutation::Delete => (hooks.deleting.as_ref(), hooks.deleted.as_ref()),
    }
}

/// Operation flag, payload size, item count and modifiers.
pub fn check_preamble(resource: &Resource, request: &Request, mutation: Mutation) -> Result<(), HttpError> {
    if !resource.operations().allows(mutation.operation()) {
        return Err(HttpError::method_not_allowed());
    }
    let max_payload = resource.limits().max_payload_size(mutation);
    let declared_too_big = request.content_length.is_some_and(|len| len > max_payload);
    if request.body_len as u64 > max_payload || declared_too_big {
        return Err(HttpError::payload_too_big(max_payload));
    }
    let max_items = resource.limits().max_input_items(mutation);
    if request.items.len() as u64 > max_items {
        return Err(HttpError::too_many_input_items(max_items, request.items.len()));
    }
    if request.has_where() || request.has_sort() || request.has_page() {
        return Err(HttpError::modifiers_not_allowed());
    }
    Ok(())
}

/// One document per item; conversion failures and item errors land on the document.
pub fn to_documents(model: &dyn Document, items: &[PayloadItem]) -> Vec<Box<dyn Document>> {
    items
        .iter()
        .map(|item| {
            let mut document = model.create_instance();
            if let Err(e) = document.load_map(item.object.clone()) {
                document.set_error(Some(HttpError::client_object_malformed(e)));
            }
            if let Some(err) = &item.error {
                document.set_error(Some(err.clone()));
            }
            document
        })
        .collect()
}

pub async fn process(
    resource: &Resource,
    request: &mut Request,
    mutation: Mutation,
) -> (Vec<Box<dyn Document>>, Option<HttpError>) {
    if let Err(err) = check_preamble(resource, request, mutation) {
        return (Vec::new(), Some(err));
    }

    let rules = ItemRules::new(resource.schema(), resource.fields(), mutation);
    check_items(&rules, &mut request.items);
    let request: &Request = request;

    let mut documents = to_documents(resource.model(), &request.items);
    if documents.iter().any(|d| d.error().is_some()) {
        return (documents, Some(HttpError::payload_invalid()));
    }

    let (before, after) = hooks_for(resource, mutation);
    if let Some(err) = call_documents_hook(before, resource, request, &mut documents, None) {
        return (documents, Some(err));
    }

    let ctx = resource.driver_context(request, context_kind(mutation));
    let driver = resource.driver();
    let model = resource.model();
    let call = match mutation {
        Mutation::Insert => driver.insert(model, &mut documents, &ctx),
        Mutation::Update => driver.update(model, &mut documents, &ctx),
        Mutation::Delete => driver.delete(model, &mut documents, &ctx),
    };
    let driver_err = ctx.run(call).await.err();
    tracing::debug!(
        resource = resource.name(),
        ?mutation,
        count = documents.len(),
        failed = documents.iter().filter(|d| d.error().is_some()).count(),
        "mutation applied"
    );

    let err = call_documents_hook(after, resource, request, &mut documents, driver_err);
    (documents, err)
}
