//! Make a template's bytes available on a pool before use.
//!
//! ```text
//! lookup ── staged? ──yes──► done (no install, no copy)
//!    │
//!    no
//!    ▼
//! CreateRequested, CREATING ── install_template (sync) ──err──► ABANDONED, OperationFailed
//!    │
//!    ok
//!    ▼
//! DOWNLOAD_IN_PROGRESS ── copy_async ──► resume
//!                                          ├─ ok  ► OperationSucceeded, CREATED
//!                                          └─ err ► OperationFailed, ABANDONED
//! ```
//!
//! Both failure paths are delivered through the caller's completion, so the
//! caller cannot tell a synchronous install failure from an asynchronous copy
//! failure except by its [`ErrorCode`].

use std::sync::Arc;

use super::record::{StagingEvent, StagingStatus, TemplateStagingRecord};
use crate::async_call::{AsyncCallbackDispatcher, Completion, OperationResult, WorkflowContext};
use crate::backend::{ImageTransferService, PoolProvider};
use crate::catalog::Catalog;
use crate::metrics::RuntimeMetricsStorage;
use crate::types::{PoolId, TemplateId};
use volumeflow_shared::{ErrorCode, Failure, VolumeflowError, VolumeflowResult};

/// Outcome of a staging request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingResult {
    pub record: TemplateStagingRecord,
    pub failure: Option<Failure>,
}

impl StagingResult {
    fn staged(record: TemplateStagingRecord) -> Self {
        Self {
            record,
            failure: None,
        }
    }

    fn failed(record: TemplateStagingRecord, failure: Failure) -> Self {
        Self {
            record,
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

type CopyContext = WorkflowContext<StagingResult, TemplateStagingRecord>;

#[derive(Clone)]
pub struct TemplateStagingWorkflow {
    pools: Arc<dyn PoolProvider>,
    catalog: Arc<dyn Catalog>,
    transfer: Arc<dyn ImageTransferService>,
    dispatcher: AsyncCallbackDispatcher,
    metrics: RuntimeMetricsStorage,
}

impl TemplateStagingWorkflow {
    pub fn new(
        pools: Arc<dyn PoolProvider>,
        catalog: Arc<dyn Catalog>,
        transfer: Arc<dyn ImageTransferService>,
        dispatcher: AsyncCallbackDispatcher,
        metrics: RuntimeMetricsStorage,
    ) -> Self {
        Self {
            pools,
            catalog,
            transfer,
            dispatcher,
            metrics,
        }
    }

    /// Ensure `template_id` is present on `pool_id`.
    ///
    /// Returns `Err` only when nothing was attempted (unknown pool, failing
    /// lookup, failing initial persist). Every other outcome, including an
    /// install failure, is delivered through `callback`.
    pub fn stage_template(
        &self,
        template_id: TemplateId,
        pool_id: PoolId,
        callback: Completion<StagingResult>,
    ) -> VolumeflowResult<()> {
        let pool = self
            .pools
            .get_pool(pool_id)
            .ok_or(VolumeflowError::DataStoreNotFound(pool_id.0))?;

        if let Some(existing) = pool.lookup_template_staging(template_id)?
            && existing.is_staged()
        {
            tracing::debug!(
                template_id = %template_id,
                pool_id = %pool_id,
                "Template already staged, skipping install and copy"
            );
            callback.complete(StagingResult::staged(existing));
            return Ok(());
        }

        let mut record = TemplateStagingRecord::new(template_id, pool_id);
        record.transit(StagingEvent::CreateRequested)?;
        record.update_status(StagingStatus::Creating);
        self.catalog.save_staging(&record)?;

        tracing::info!(template_id = %template_id, pool_id = %pool_id, "Staging template");

        if let Err(e) = pool.install_template(&record) {
            tracing::warn!(
                template_id = %template_id,
                pool_id = %pool_id,
                error = %e,
                "Template install failed"
            );
            record.update_status(StagingStatus::Abandoned);
            record.transit(StagingEvent::OperationFailed)?;
            self.persist_best_effort(&record);
            RuntimeMetricsStorage::incr(&self.metrics.template_staging_failed);

            let failure = Failure::new(ErrorCode::TemplateInstallFailure, e.detail());
            callback.complete(StagingResult::failed(record, failure));
            return Ok(());
        }

        record.update_status(StagingStatus::DownloadInProgress);
        self.persist_best_effort(&record);

        let transfer = Arc::clone(&self.transfer);
        let submitted = record.clone();
        let this = self.clone();
        self.dispatcher.issue(
            "copy_template",
            CopyContext::new(callback, record),
            move |result, ctx| this.on_copy_complete(result, ctx),
            |handle| transfer.copy_async(&submitted, handle),
        );

        Ok(())
    }

    fn on_copy_complete(&self, result: OperationResult, ctx: CopyContext) {
        let (callback, mut record) = ctx.into_parts();

        let outcome = if result.is_success() {
            record
                .transit(StagingEvent::OperationSucceeded)
                .map(|_| record.update_status(StagingStatus::Created))
                .map_err(|e| Failure::from(&e))
        } else {
            let detail = result.detail_or_default();
            record.update_status(StagingStatus::Abandoned);
            match record.transit(StagingEvent::OperationFailed) {
                Ok(_) => Err(Failure::new(ErrorCode::TemplateCopyFailure, detail)),
                Err(e) => Err(Failure::from(&e)),
            }
        };

        if let Some(path) = result.payload_str("install_path") {
            record.install_path = Some(path.to_string());
        }
        self.persist_best_effort(&record);

        match outcome {
            Ok(()) => {
                tracing::info!(
                    template_id = %record.template_id,
                    pool_id = %record.pool_id,
                    "Template staged"
                );
                RuntimeMetricsStorage::incr(&self.metrics.templates_staged);
                callback.complete(StagingResult::staged(record));
            }
            Err(failure) => {
                tracing::warn!(
                    template_id = %record.template_id,
                    pool_id = %record.pool_id,
                    %failure,
                    "Template copy failed"
                );
                RuntimeMetricsStorage::incr(&self.metrics.template_staging_failed);
                callback.complete(StagingResult::failed(record, failure));
            }
        }
    }

    /// The pool is authoritative for staging presence; the catalog row is
    /// bookkeeping, so a failed write is logged and not reported.
    fn persist_best_effort(&self, record: &TemplateStagingRecord) {
        if let Err(e) = self.catalog.save_staging(record) {
            tracing::warn!(
                template_id = %record.template_id,
                pool_id = %record.pool_id,
                error = %e,
                "Failed to persist staging record"
            );
        }
    }
}

impl std::fmt::Debug for TemplateStagingWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStagingWorkflow").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryImageTransfer, MemoryPool, MemoryPools, StoragePoolBackend};
    use crate::catalog::SqliteCatalog;
    use crate::db::Database;
    use crate::metrics::RuntimeMetrics;
    use crate::template::StagingState;

    struct Fixture {
        pools: MemoryPools,
        pool: Arc<MemoryPool>,
        transfer: Arc<MemoryImageTransfer>,
        catalog: Arc<SqliteCatalog>,
        metrics: RuntimeMetricsStorage,
        workflow: TemplateStagingWorkflow,
    }

    fn fixture() -> Fixture {
        let pools = MemoryPools::new();
        let pool = pools.add(PoolId(7));
        let transfer = Arc::new(MemoryImageTransfer::new(pools.clone()));
        let catalog = Arc::new(SqliteCatalog::new(Database::open_in_memory().unwrap()));
        let metrics = RuntimeMetricsStorage::new();
        let workflow = TemplateStagingWorkflow::new(
            Arc::new(pools.clone()),
            catalog.clone(),
            transfer.clone(),
            AsyncCallbackDispatcher::new(metrics.clone()),
            metrics.clone(),
        );
        Fixture {
            pools,
            pool,
            transfer,
            catalog,
            metrics,
            workflow,
        }
    }

    #[tokio::test]
    async fn test_stage_installs_and_copies() {
        let fx = fixture();
        let (done, rx) = Completion::channel();
        fx.workflow
            .stage_template(TemplateId(4), PoolId(7), done)
            .unwrap();

        let result = rx.await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.record.status, StagingStatus::Created);
        assert_eq!(result.record.state, StagingState::Ready);
        assert_eq!(fx.pool.install_calls(), 1);
        assert_eq!(fx.transfer.copy_calls(), 1);

        let saved = fx
            .catalog
            .find_staging(TemplateId(4), PoolId(7))
            .unwrap()
            .unwrap();
        assert_eq!(saved.status, StagingStatus::Created);
        assert!(
            fx.pool
                .lookup_template_staging(TemplateId(4))
                .unwrap()
                .unwrap()
                .is_staged()
        );
        assert_eq!(RuntimeMetrics::new(fx.metrics.clone()).templates_staged_total(), 1);
    }

    #[tokio::test]
    async fn test_already_staged_skips_install_and_copy() {
        let fx = fixture();
        fx.pool.preload_template(TemplateId(4));

        let (done, rx) = Completion::channel();
        fx.workflow
            .stage_template(TemplateId(4), PoolId(7), done)
            .unwrap();

        assert!(rx.await.unwrap().is_success());
        assert_eq!(fx.pool.install_calls(), 0);
        assert_eq!(fx.transfer.copy_calls(), 0);
    }

    #[tokio::test]
    async fn test_install_failure_abandons_without_copy() {
        let fx = fixture();
        fx.pool.fail_install("pool read-only");

        let (done, rx) = Completion::channel();
        fx.workflow
            .stage_template(TemplateId(4), PoolId(7), done)
            .unwrap();

        let result = rx.await.unwrap();
        let failure = result.failure.unwrap();
        assert_eq!(failure.code, ErrorCode::TemplateInstallFailure);
        assert_eq!(failure.detail, "pool read-only");
        assert_eq!(result.record.status, StagingStatus::Abandoned);
        assert_eq!(result.record.state, StagingState::Failed);
        assert_eq!(fx.transfer.copy_calls(), 0);

        let saved = fx
            .catalog
            .find_staging(TemplateId(4), PoolId(7))
            .unwrap()
            .unwrap();
        assert_eq!(saved.status, StagingStatus::Abandoned);
    }

    #[tokio::test]
    async fn test_copy_failure_reports_detail() {
        let fx = fixture();
        fx.transfer.fail_copy("secondary storage unreachable");

        let (done, rx) = Completion::channel();
        fx.workflow
            .stage_template(TemplateId(4), PoolId(7), done)
            .unwrap();

        let result = rx.await.unwrap();
        let failure = result.failure.unwrap();
        assert_eq!(failure.code, ErrorCode::TemplateCopyFailure);
        assert_eq!(failure.detail, "secondary storage unreachable");
        assert_eq!(result.record.status, StagingStatus::Abandoned);
        assert!(
            !fx.pools
                .get(PoolId(7))
                .unwrap()
                .lookup_template_staging(TemplateId(4))
                .unwrap()
                .is_some_and(|r| r.is_staged())
        );
    }

    #[tokio::test]
    async fn test_partial_staging_on_pool_is_restaged() {
        let fx = fixture();
        let leftover = TemplateStagingRecord::new(TemplateId(4), PoolId(7));
        fx.pool.install_template(&leftover).unwrap();
        let before = fx.pool.lookup_template_staging(TemplateId(4)).unwrap().unwrap();
        assert_eq!(before.status, StagingStatus::DownloadInProgress);

        let (done, rx) = Completion::channel();
        fx.workflow
            .stage_template(TemplateId(4), PoolId(7), done)
            .unwrap();

        let result = rx.await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.record.status, StagingStatus::Created);
        assert_eq!(fx.pool.install_calls(), 2);
        assert_eq!(fx.transfer.copy_calls(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_copy_is_restaged_on_retry() {
        let fx = fixture();
        fx.transfer.fail_copy("secondary storage unreachable");

        let (done, rx) = Completion::channel();
        fx.workflow
            .stage_template(TemplateId(4), PoolId(7), done)
            .unwrap();
        assert!(!rx.await.unwrap().is_success());

        fx.transfer.clear_failures();
        let (done, rx) = Completion::channel();
        fx.workflow
            .stage_template(TemplateId(4), PoolId(7), done)
            .unwrap();

        let result = rx.await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.record.status, StagingStatus::Created);
        assert_eq!(fx.pool.install_calls(), 2);
        assert_eq!(fx.transfer.copy_calls(), 2);
        assert_eq!(
            fx.catalog
                .find_staging(TemplateId(4), PoolId(7))
                .unwrap()
                .unwrap()
                .status,
            StagingStatus::Created
        );
    }

    #[test]
    fn test_unknown_pool_fails_synchronously() {
        let fx = fixture();
        let (done, mut rx) = Completion::channel();
        let err = fx
            .workflow
            .stage_template(TemplateId(4), PoolId(99), done)
            .unwrap_err();

        assert!(matches!(err, VolumeflowError::DataStoreNotFound(99)));
        assert!(rx.try_recv().is_err());
    }
}
