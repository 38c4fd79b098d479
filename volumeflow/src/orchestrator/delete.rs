use super::{VolumeApiResult, VolumeContext, VolumeOrchestrator};
use crate::async_call::{Completion, OperationResult};
use crate::metrics::RuntimeMetricsStorage;
use crate::volume::{VolumeEntity, VolumeEvent};
use volumeflow_shared::{ErrorCode, Failure, VolumeflowResult};

impl VolumeOrchestrator {
    /// Destroy `volume`.
    ///
    /// A volume with no pool is expunged on the spot: the catalog row is
    /// removed and `callback` runs before this returns. Otherwise the pool is
    /// asked to delete it; the row is only removed once the pool confirms.
    pub fn delete_volume(
        &self,
        mut volume: VolumeEntity,
        callback: Completion<VolumeApiResult>,
    ) -> VolumeflowResult<()> {
        let Some(pool_id) = volume.pool_id else {
            self.catalog.remove(volume.id)?;
            volume.expunge();
            RuntimeMetricsStorage::incr(&self.metrics.volumes_destroyed);
            tracing::info!(volume_id = %volume.id, "Expunged unmaterialized volume");
            callback.complete(VolumeApiResult::succeeded(volume));
            return Ok(());
        };

        let pool = self.resolve_pool(pool_id)?;
        self.apply_persisted(&mut volume, VolumeEvent::DestroyRequested, |_| {})?;

        tracing::info!(volume_id = %volume.id, pool_id = %pool_id, "Deleting volume");

        let submitted = volume.clone();
        let this = self.clone();
        self.dispatcher.issue(
            "delete_volume",
            VolumeContext::new(callback, volume),
            move |result, ctx| this.on_delete_complete(result, ctx),
            move |handle| pool.delete_async(&submitted, handle),
        );
        Ok(())
    }

    fn on_delete_complete(&self, result: OperationResult, ctx: VolumeContext) {
        let (callback, mut volume) = ctx.into_parts();

        if result.is_success() {
            // The row goes first; the entity only reports Destroyed once it is gone.
            let removed = volume
                .peek(VolumeEvent::OperationSucceeded)
                .and_then(|_| self.catalog.remove(volume.id))
                .and_then(|()| volume.transit(VolumeEvent::OperationSucceeded));
            match removed {
                Ok(_) => {
                    tracing::info!(volume_id = %volume.id, "Volume destroyed");
                    RuntimeMetricsStorage::incr(&self.metrics.volumes_destroyed);
                    callback.complete(VolumeApiResult::succeeded(volume));
                }
                Err(e) => {
                    tracing::error!(
                        volume_id = %volume.id,
                        error = %e,
                        "Volume deleted on pool but catalog row could not be removed"
                    );
                    if let Err(persist) =
                        self.apply_persisted(&mut volume, VolumeEvent::OperationFailed, |_| {})
                    {
                        tracing::warn!(
                            volume_id = %volume.id,
                            error = %persist,
                            "Failed to record delete failure"
                        );
                    }
                    RuntimeMetricsStorage::incr(&self.metrics.volumes_failed);
                    callback.complete(VolumeApiResult::failed(volume, Failure::from(&e)));
                }
            }
            return;
        }

        let detail = result.detail_or_default();
        let failure = match self.apply_persisted(&mut volume, VolumeEvent::OperationFailed, |_| {}) {
            Ok(_) => Failure::new(ErrorCode::BackendFailure, detail),
            Err(e) => Failure::from(&e),
        };
        tracing::warn!(volume_id = %volume.id, %failure, "Volume delete failed");
        RuntimeMetricsStorage::incr(&self.metrics.volumes_failed);
        callback.complete(VolumeApiResult::failed(volume, failure));
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use crate::catalog::{Catalog, SqliteCatalog};
    use crate::template::TemplateStagingRecord;
    use crate::types::{PoolId, TemplateId, VolumeDiskType, VolumeId, VolumeType};
    use crate::volume::VolumeState;
    use std::sync::Arc;
    use volumeflow_shared::VolumeflowError;

    /// Delegates to SQLite but refuses to delete rows.
    struct StickyCatalog(Arc<SqliteCatalog>);

    impl Catalog for StickyCatalog {
        fn allocate(
            &self,
            size: u64,
            volume_type: VolumeType,
            name: &str,
            template_id: Option<TemplateId>,
        ) -> VolumeflowResult<VolumeEntity> {
            self.0.allocate(size, volume_type, name, template_id)
        }

        fn find_by_id(&self, id: VolumeId) -> VolumeflowResult<Option<VolumeEntity>> {
            self.0.find_by_id(id)
        }

        fn update(&self, volume: &VolumeEntity) -> VolumeflowResult<()> {
            self.0.update(volume)
        }

        fn remove(&self, _id: VolumeId) -> VolumeflowResult<()> {
            Err(VolumeflowError::Database("disk I/O error".into()))
        }

        fn list(&self) -> VolumeflowResult<Vec<VolumeEntity>> {
            self.0.list()
        }

        fn save_staging(&self, record: &TemplateStagingRecord) -> VolumeflowResult<()> {
            self.0.save_staging(record)
        }

        fn find_staging(
            &self,
            template_id: TemplateId,
            pool_id: PoolId,
        ) -> VolumeflowResult<Option<TemplateStagingRecord>> {
            self.0.find_staging(template_id, pool_id)
        }
    }

    async fn ready_volume(h: &Harness, name: &str) -> VolumeEntity {
        let vol = h.allocate(name);
        let (done, rx) = Completion::channel();
        h.orchestrator
            .create_volume(vol, PoolId(7), VolumeDiskType::Raw, done)
            .unwrap();
        let result = rx.await.unwrap();
        assert!(result.is_success());
        result.volume
    }

    #[test]
    fn test_unmaterialized_delete_skips_backend() {
        let h = Harness::new();
        let vol = h.allocate("scratch");

        let (done, mut rx) = Completion::channel();
        h.orchestrator.delete_volume(vol.clone(), done).unwrap();

        let result = rx.try_recv().unwrap();
        assert!(result.is_success());
        assert_eq!(result.volume.state(), VolumeState::Destroyed);
        assert!(h.stored(vol.id).is_none());
        assert_eq!(h.pool.delete_calls(), 0);
    }

    #[test]
    fn test_unmaterialized_delete_of_missing_row_fails_synchronously() {
        let h = Harness::new();
        let vol = h.allocate("scratch");
        let (done, _rx) = Completion::channel();
        h.orchestrator.delete_volume(vol.clone(), done).unwrap();

        let (done, mut rx) = Completion::channel();
        let err = h.orchestrator.delete_volume(vol, done).unwrap_err();
        assert!(matches!(err, VolumeflowError::NotFound(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_ready_volume_removes_row() {
        let h = Harness::new();
        let vol = ready_volume(&h, "data-01").await;

        let (done, rx) = Completion::channel();
        h.orchestrator.delete_volume(vol.clone(), done).unwrap();
        assert_eq!(h.stored(vol.id).unwrap().state(), VolumeState::Destroying);

        let result = rx.await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.volume.state(), VolumeState::Destroyed);
        assert!(h.stored(vol.id).is_none());
        assert_eq!(h.pool.volume_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_row() {
        let h = Harness::new();
        let vol = ready_volume(&h, "data-01").await;
        h.pool.fail_delete("device busy");

        let (done, rx) = Completion::channel();
        h.orchestrator.delete_volume(vol.clone(), done).unwrap();

        let result = rx.await.unwrap();
        assert_eq!(result.failure_detail(), Some("device busy"));
        let stored = h.stored(vol.id).unwrap();
        assert_eq!(stored.state(), VolumeState::Failed);
        assert_eq!(stored.pool_id, Some(PoolId(7)));
    }

    #[tokio::test]
    async fn test_row_removal_failure_marks_volume_failed() {
        let h = Harness::new();
        let orchestrator = VolumeOrchestrator::new(
            Arc::new(h.pools.clone()),
            Arc::new(StickyCatalog(h.catalog.clone())),
            h.transfer.clone(),
            h.metrics.clone(),
        );
        let vol = ready_volume(&h, "data-01").await;

        let (done, rx) = Completion::channel();
        orchestrator.delete_volume(vol.clone(), done).unwrap();

        let result = rx.await.unwrap();
        let failure = result.failure.as_ref().unwrap();
        assert_eq!(failure.code, ErrorCode::Internal);
        assert_eq!(failure.detail, "disk I/O error");
        assert_eq!(result.volume.state(), VolumeState::Failed);

        let stored = h.stored(vol.id).unwrap();
        assert_eq!(stored.state(), VolumeState::Failed);
        assert_eq!(stored.pool_id, Some(PoolId(7)));
    }

    #[tokio::test]
    async fn test_failed_create_can_be_expunged() {
        let h = Harness::new();
        h.pool.fail_create("no space");
        let vol = h.allocate("data-01");
        let (done, rx) = Completion::channel();
        h.orchestrator
            .create_volume(vol, PoolId(7), VolumeDiskType::Raw, done)
            .unwrap();
        let failed = rx.await.unwrap().volume;

        let (done, mut rx) = Completion::channel();
        h.orchestrator.delete_volume(failed.clone(), done).unwrap();
        assert!(rx.try_recv().unwrap().is_success());
        assert!(h.stored(failed.id).is_none());
    }

    /// Delete while a create on the same id is still pending is outside the
    /// single-in-flight contract. This only shows that both calls are accepted
    /// and both continuations fire; which final state wins is not defined.
    #[tokio::test]
    async fn test_delete_during_pending_create_is_not_serialized() {
        let h = Harness::new();
        h.pool.set_deferred(true);
        let vol = h.allocate("data-01");

        let (created, create_rx) = Completion::channel();
        h.orchestrator
            .create_volume(vol.clone(), PoolId(7), VolumeDiskType::Raw, created)
            .unwrap();

        let (deleted, delete_rx) = Completion::channel();
        let _ = h.orchestrator.delete_volume(vol, deleted);

        h.pool.release_pending();
        let _ = create_rx.await;
        let _ = delete_rx.await;
    }
}
