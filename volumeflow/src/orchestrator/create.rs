use std::sync::Arc;

use super::{VolumeApiResult, VolumeContext, VolumeOrchestrator};
use crate::async_call::{Completion, OperationResult};
use crate::backend::StoragePoolBackend;
use crate::metrics::RuntimeMetricsStorage;
use crate::template::TemplateStagingRecord;
use crate::types::{PoolId, VolumeDiskType};
use crate::volume::{VolumeEntity, VolumeEvent};
use volumeflow_shared::{ErrorCode, Failure, VolumeflowResult};

impl VolumeOrchestrator {
    /// Materialize `volume` on `pool_id`.
    ///
    /// Fails synchronously with `DataStoreNotFound` for an unknown pool,
    /// `VolumeAlreadyExists` when the pool already has the volume, or
    /// `InvalidTransition` when the volume is not `Allocated`. None of these
    /// change any state.
    pub fn create_volume(
        &self,
        mut volume: VolumeEntity,
        pool_id: PoolId,
        disk_type: VolumeDiskType,
        callback: Completion<VolumeApiResult>,
    ) -> VolumeflowResult<()> {
        let pool = self.resolve_pool(pool_id)?;
        self.ensure_absent(&pool, &volume)?;
        self.begin_create(&mut volume, pool_id)?;

        tracing::info!(
            volume_id = %volume.id,
            pool_id = %pool_id,
            disk_type = disk_type.as_str(),
            "Creating volume"
        );

        let submitted = volume.clone();
        let this = self.clone();
        self.dispatcher.issue(
            "create_volume",
            VolumeContext::new(callback, volume),
            move |result, ctx| this.on_create_complete(result, ctx),
            move |handle| pool.create_async(&submitted, disk_type, handle),
        );
        Ok(())
    }

    /// `CreateRequested` with the pool assignment, persisted together.
    pub(super) fn begin_create(
        &self,
        volume: &mut VolumeEntity,
        pool_id: PoolId,
    ) -> VolumeflowResult<()> {
        self.apply_persisted(volume, VolumeEvent::CreateRequested, |v| {
            v.pool_id = Some(pool_id);
        })?;
        Ok(())
    }

    /// Resume handler shared by plain and base-image creates.
    pub(super) fn on_create_complete(&self, result: OperationResult, ctx: VolumeContext) {
        let (callback, mut volume) = ctx.into_parts();

        let outcome = if result.is_success() {
            let install_path = result.payload_str("install_path").map(str::to_string);
            self.apply_persisted(&mut volume, VolumeEvent::OperationSucceeded, |v| {
                if install_path.is_some() {
                    v.install_path = install_path;
                }
            })
            .map_err(Failure::from)
        } else {
            let failure = Failure::new(ErrorCode::BackendFailure, result.detail_or_default());
            // Nothing was left on the pool, so the volume is released from it.
            match self.apply_persisted(&mut volume, VolumeEvent::OperationFailed, |v| {
                v.pool_id = None;
            }) {
                Ok(_) => Err(failure),
                Err(e) => Err(Failure::from(&e)),
            }
        };

        match outcome {
            Ok(_) => {
                tracing::info!(volume_id = %volume.id, pool_id = ?volume.pool_id, "Volume ready");
                RuntimeMetricsStorage::incr(&self.metrics.volumes_created);
                callback.complete(VolumeApiResult::succeeded(volume));
            }
            Err(failure) => {
                tracing::warn!(
                    volume_id = %volume.id,
                    state = %volume.state(),
                    %failure,
                    "Volume create failed"
                );
                RuntimeMetricsStorage::incr(&self.metrics.volumes_failed);
                callback.complete(VolumeApiResult::failed(volume, failure));
            }
        }
    }

    pub(super) fn issue_base_image_create(
        &self,
        pool: Arc<dyn StoragePoolBackend>,
        volume: VolumeEntity,
        base_image: TemplateStagingRecord,
        callback: Completion<VolumeApiResult>,
    ) {
        let submitted = volume.clone();
        let this = self.clone();
        self.dispatcher.issue(
            "create_from_base_image",
            VolumeContext::new(callback, volume),
            move |result, ctx| this.on_create_complete(result, ctx),
            move |handle| pool.create_from_base_image_async(&submitted, &base_image, handle),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use crate::metrics::RuntimeMetrics;
    use crate::volume::VolumeState;
    use volumeflow_shared::VolumeflowError;

    #[tokio::test]
    async fn test_create_drives_allocated_to_ready() {
        let h = Harness::new();
        let vol = h.allocate("data-01");
        assert_eq!(vol.state(), VolumeState::Allocated);

        let (done, rx) = Completion::channel();
        h.orchestrator
            .create_volume(vol.clone(), PoolId(7), VolumeDiskType::Thin, done)
            .unwrap();

        let result = rx.await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.volume.state(), VolumeState::Ready);
        assert_eq!(result.volume.pool_id, Some(PoolId(7)));

        let stored = h.stored(vol.id).unwrap();
        assert_eq!(stored.state(), VolumeState::Ready);
        assert_eq!(stored.install_path.as_deref(), Some("/pools/7/volumes/1"));
        assert_eq!(
            RuntimeMetrics::new(h.metrics.clone()).volumes_created_total(),
            1
        );
    }

    #[tokio::test]
    async fn test_creating_is_persisted_before_backend_completes() {
        let h = Harness::new();
        h.pool.set_deferred(true);
        let vol = h.allocate("data-01");

        let (done, mut rx) = Completion::channel();
        h.orchestrator
            .create_volume(vol.clone(), PoolId(7), VolumeDiskType::Raw, done)
            .unwrap();

        assert!(rx.try_recv().is_err());
        let stored = h.stored(vol.id).unwrap();
        assert_eq!(stored.state(), VolumeState::Creating);
        assert_eq!(stored.pool_id, Some(PoolId(7)));
        assert_eq!(RuntimeMetrics::new(h.metrics.clone()).calls_in_flight(), 1);

        h.pool.release_pending();
        assert!(rx.await.unwrap().is_success());
        assert_eq!(RuntimeMetrics::new(h.metrics.clone()).calls_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_detail_is_verbatim() {
        let h = Harness::new();
        h.pool.fail_create("LUN allocation failed: pool exhausted");
        let vol = h.allocate("data-01");

        let (done, rx) = Completion::channel();
        h.orchestrator
            .create_volume(vol.clone(), PoolId(7), VolumeDiskType::Raw, done)
            .unwrap();

        let result = rx.await.unwrap();
        assert!(!result.is_success());
        let failure = result.failure.as_ref().unwrap();
        assert_eq!(failure.code, ErrorCode::BackendFailure);
        assert_eq!(
            result.failure_detail(),
            Some("LUN allocation failed: pool exhausted")
        );
        assert_eq!(result.volume.state(), VolumeState::Failed);

        let stored = h.stored(vol.id).unwrap();
        assert_eq!(stored.state(), VolumeState::Failed);
        assert!(stored.pool_id.is_none());
    }

    #[test]
    fn test_existing_volume_fails_synchronously() {
        let h = Harness::new();
        let vol = h.allocate("data-01");

        // Put the volume on the pool behind the orchestrator's back.
        let (seed, _rx) = Completion::channel();
        h.pool.create_async(&vol, VolumeDiskType::Raw, seed);
        assert!(h.pool.exists(&vol).unwrap());

        let (done, mut rx) = Completion::channel();
        let err = h
            .orchestrator
            .create_volume(vol.clone(), PoolId(7), VolumeDiskType::Raw, done)
            .unwrap_err();

        assert!(matches!(
            err,
            VolumeflowError::VolumeAlreadyExists { pool: 7, .. }
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(h.stored(vol.id).unwrap().state(), VolumeState::Allocated);
        assert_eq!(h.pool.create_calls(), 1);
    }

    #[test]
    fn test_unknown_pool_fails_synchronously() {
        let h = Harness::new();
        let vol = h.allocate("data-01");

        let (done, _rx) = Completion::channel();
        let err = h
            .orchestrator
            .create_volume(vol.clone(), PoolId(99), VolumeDiskType::Raw, done)
            .unwrap_err();

        assert!(matches!(err, VolumeflowError::DataStoreNotFound(99)));
        let stored = h.stored(vol.id).unwrap();
        assert_eq!(stored.state(), VolumeState::Allocated);
        assert!(stored.pool_id.is_none());
    }

    #[tokio::test]
    async fn test_create_on_ready_volume_is_invalid_transition() {
        let h = Harness::new();
        let vol = h.allocate("data-01");
        let (done, rx) = Completion::channel();
        h.orchestrator
            .create_volume(vol, PoolId(7), VolumeDiskType::Raw, done)
            .unwrap();
        let ready = rx.await.unwrap().volume;

        h.pools.add(PoolId(8));
        let (done, _rx) = Completion::channel();
        let err = h
            .orchestrator
            .create_volume(ready.clone(), PoolId(8), VolumeDiskType::Raw, done)
            .unwrap_err();

        assert!(matches!(err, VolumeflowError::InvalidTransition { .. }));
        assert_eq!(h.stored(ready.id).unwrap().pool_id, Some(PoolId(7)));
    }
}
