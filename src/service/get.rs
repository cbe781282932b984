//! Get processor: pagination bounds, driver find and the fetched hook.

use crate::driver::ContextKind;
use crate::error::HttpError;
use crate::hooks::call_documents_hook;
use crate::model::Document;
use crate::request::Request;
use crate::resource::Resource;
use crate::response::ResponseEnvelope;

pub async fn process(
    resource: &Resource,
    request: &Request,
    envelope: &mut ResponseEnvelope,
) -> (Vec<Box<dyn Document>>, Option<HttpError>) {
    if !resource.operations().get {
        return (Vec::new(), Some(HttpError::method_not_allowed()));
    }

    let max = resource.limits().get_max_output_items;
    let per_page = request.per_page.unwrap_or(max);
    envelope.meta.page = request.page;
    envelope.meta.per_page = per_page;
    if per_page > max {
        return (Vec::new(), Some(HttpError::per_page_too_large(max)));
    }
    if per_page == 0 {
        return (Vec::new(), None);
    }

    let ctx = resource.driver_context(request, ContextKind::Find);
    let found = ctx
        .run(resource.driver().find(
            resource.model(),
            &request.filter,
            &request.sort,
            request.page,
            per_page,
            &ctx,
        ))
        .await;
    let (mut documents, find_err) = match found {
        Ok(documents) => (documents, None),
        Err(err) => (Vec::new(), Some(err)),
    };
    tracing::debug!(
        resource = resource.name(),
        count = documents.len(),
        failed = find_err.is_some(),
        "documents fetched"
    );

    if let Some(validator) = resource.schema().validators.get.as_deref() {
        for document in documents.iter_mut() {
            let checked = document
                .to_map()
                .map_err(|e| e.to_string())
                .and_then(|item| validator.validate(&item));
            if let Err(reason) = checked {
                document.set_error(Some(HttpError::server_object_malformed(reason)));
            }
        }
    }

    let err = call_documents_hook(resource.hooks().fetched.as_ref(), resource, request, &mut documents, find_err);
    (documents, err)
}
