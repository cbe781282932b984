//! Storage driver contract and the per-call context handed to it.

use crate::error::{HttpError, ModelError};
use crate::model::{value_string, Document};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Total,
    Find,
    Insert,
    Update,
    Delete,
}

/// Cancellation scope of a single driver call.
#[derive(Clone, Debug)]
pub struct DriverContext {
    pub kind: ContextKind,
    pub deadline: Instant,
}

impl DriverContext {
    pub fn with_timeout(kind: ContextKind, timeout: Duration) -> Self {
        DriverContext {
            kind,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Runs a driver call, failing with a driver error once the deadline passes.
    pub async fn run<F, T>(&self, call: F) -> Result<T, HttpError>
    where
        F: Future<Output = Result<T, HttpError>>,
    {
        let expired = || HttpError::low_level_driver(format!("{:?} call exceeded its deadline", self.kind));
        if self.is_expired() {
            return Err(expired());
        }
        match tokio::time::timeout_at(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(expired()),
        }
    }
}

/// Persistence backend for one or more resources.
///
/// Mutations record per-document failures with `Document::set_error` and only
/// return an error for failures that affect the whole call.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Checks that `model` honors the ID/ETag contract and binds it to `db_path`.
    fn test_model(
        &self,
        id_field: &str,
        etag_field: &str,
        model: &dyn Document,
        db_path: &str,
    ) -> Result<(), ModelError>;

    async fn find(
        &self,
        model: &dyn Document,
        filter: &str,
        sort: &str,
        page: u64,
        per_page: u64,
        ctx: &DriverContext,
    ) -> Result<Vec<Box<dyn Document>>, HttpError>;

    async fn total(&self, model: &dyn Document, filter: &str, ctx: &DriverContext) -> Result<u64, HttpError>;

    async fn insert(
        &self,
        model: &dyn Document,
        documents: &mut [Box<dyn Document>],
        ctx: &DriverContext,
    ) -> Result<(), HttpError>;

    async fn update(
        &self,
        model: &dyn Document,
        documents: &mut [Box<dyn Document>],
        ctx: &DriverContext,
    ) -> Result<(), HttpError>;

    async fn delete(
        &self,
        model: &dyn Document,
        documents: &mut [Box<dyn Document>],
        ctx: &DriverContext,
    ) -> Result<(), HttpError>;

    fn where_fields(&self, model: &dyn Document, filter: &str) -> Result<Vec<String>, HttpError>;

    fn sort_fields(&self, model: &dyn Document, sort: &str) -> Result<Vec<String>, HttpError>;
}

/// ID/ETag round-trip checks shared by driver implementations of `test_model`.
pub fn check_document_contract(
    model: &dyn Document,
    sample_id: &str,
    has_etag: bool,
) -> Result<(), ModelError> {
    let mut instance = model.create_instance();

    instance.set_id(sample_id)?;
    let id = instance
        .id()
        .ok_or_else(|| ModelError::Contract(format!("{} lost its ID after set", model.model_name())))?;
    let id_text = value_string(&id);
    if id_text != sample_id {
        return Err(ModelError::Contract(format!(
            "ID '{}' read back as '{}'",
            sample_id, id_text
        )));
    }
    instance.set_id(&id_text)?;
    if instance.id().as_ref() != Some(&id) {
        return Err(ModelError::Contract(format!("ID '{}' changed when re-set", sample_id)));
    }

    if has_etag {
        let etag = instance
            .create_etag()
            .ok_or_else(|| ModelError::Contract(format!("{} created no ETag", model.model_name())))?;
        if instance.etag().as_ref() != Some(&etag) {
            return Err(ModelError::Contract("created ETag differs from stored ETag".into()));
        }
        instance.set_etag(&value_string(&etag))?;
        if instance.etag().as_ref() != Some(&etag) {
            return Err(ModelError::Contract(format!(
                "ETag '{}' changed when re-set from its string form",
                value_string(&etag)
            )));
        }
    }

    let ok = HttpError::ok();
    instance.set_error(Some(ok.clone()));
    if instance.error() != Some(&ok) {
        return Err(ModelError::Contract("error marker was not stored".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_expired_context_skips_call() {
        let ctx = DriverContext::with_timeout(ContextKind::Find, Duration::ZERO);
        assert!(ctx.is_expired());

        let polled = AtomicBool::new(false);
        let err = ctx
            .run(async {
                polled.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LowLevelDriver);
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let ctx = DriverContext::with_timeout(ContextKind::Insert, Duration::from_millis(20));
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1u64)
            })
            .await
            .unwrap_err();
        assert!(err.message().contains("Insert call exceeded its deadline"));

        let ctx = DriverContext::with_timeout(ContextKind::Total, Duration::from_secs(5));
        assert_eq!(ctx.run(async { Ok(7u64) }).await.unwrap(), 7);
    }
}
