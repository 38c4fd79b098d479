//! Public volume workflows.
//!
//! Continuation-based entry points (`create_volume`, `delete_volume`,
//! `create_volume_from_template`) return `Err` when a precondition fails
//! before anything was issued; in that case the caller's completion is
//! dropped without being invoked. Once `Ok(())` is returned the completion
//! will be invoked exactly once, possibly on a backend thread.
//!
//! Every transition is written to the catalog before the in-memory entity
//! changes and before the matching backend call is issued.
//!
//! At most one workflow may be in flight per volume id. This is a caller
//! contract; nothing here serializes concurrent requests on the same id.

mod create;
mod delete;
mod from_template;
mod result;

pub use result::VolumeApiResult;

use std::sync::Arc;

use crate::async_call::{AsyncCallbackDispatcher, Completion, WorkflowContext};
use crate::backend::{ImageTransferService, PoolProvider, StoragePoolBackend};
use crate::catalog::Catalog;
use crate::metrics::RuntimeMetricsStorage;
use crate::template::TemplateStagingWorkflow;
use crate::types::{PoolId, TemplateId, VolumeId, VolumeType};
use crate::volume::constants::{MAX_NAME_LEN, MAX_VOLUME_SIZE_BYTES, MIN_VOLUME_SIZE_BYTES};
use crate::volume::{VolumeEntity, VolumeEvent, VolumeState};
use volumeflow_shared::{VolumeflowError, VolumeflowResult};

/// Context carried across a single backend call on a volume.
type VolumeContext = WorkflowContext<VolumeApiResult, VolumeEntity>;

#[derive(Clone)]
pub struct VolumeOrchestrator {
    pools: Arc<dyn PoolProvider>,
    catalog: Arc<dyn Catalog>,
    staging: TemplateStagingWorkflow,
    dispatcher: AsyncCallbackDispatcher,
    metrics: RuntimeMetricsStorage,
}

impl VolumeOrchestrator {
    pub fn new(
        pools: Arc<dyn PoolProvider>,
        catalog: Arc<dyn Catalog>,
        transfer: Arc<dyn ImageTransferService>,
        metrics: RuntimeMetricsStorage,
    ) -> Self {
        let dispatcher = AsyncCallbackDispatcher::new(metrics.clone());
        let staging = TemplateStagingWorkflow::new(
            Arc::clone(&pools),
            Arc::clone(&catalog),
            transfer,
            dispatcher.clone(),
            metrics.clone(),
        );
        Self {
            pools,
            catalog,
            staging,
            dispatcher,
            metrics,
        }
    }

    /// Create a catalog-only volume in `Allocated` state with no pool.
    pub fn allocate(
        &self,
        size: u64,
        volume_type: VolumeType,
        name: &str,
        template_id: Option<TemplateId>,
    ) -> VolumeflowResult<VolumeEntity> {
        if name.trim().is_empty() {
            return Err(VolumeflowError::InvalidArgument(
                "volume name must not be empty".into(),
            ));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(VolumeflowError::InvalidArgument(format!(
                "volume name longer than {} bytes",
                MAX_NAME_LEN
            )));
        }
        if !(MIN_VOLUME_SIZE_BYTES..=MAX_VOLUME_SIZE_BYTES).contains(&size) {
            return Err(VolumeflowError::InvalidArgument(format!(
                "volume size {} outside [{}, {}]",
                size, MIN_VOLUME_SIZE_BYTES, MAX_VOLUME_SIZE_BYTES
            )));
        }

        let volume = self.catalog.allocate(size, volume_type, name, template_id)?;
        RuntimeMetricsStorage::incr(&self.metrics.volumes_allocated);
        tracing::info!(
            volume_id = %volume.id,
            name = %volume.name,
            size,
            volume_type = volume_type.as_str(),
            "Allocated volume"
        );
        Ok(volume)
    }

    /// Catalog metadata, joined with the pool's live view when the volume is
    /// materialized. A pool that no longer knows the volume yields the
    /// catalog view alone.
    pub fn lookup(&self, id: VolumeId) -> VolumeflowResult<Option<VolumeEntity>> {
        let Some(mut volume) = self.catalog.find_by_id(id)? else {
            return Ok(None);
        };

        if let Some(pool_id) = volume.pool_id {
            match self.pools.get_pool(pool_id) {
                Some(pool) => match pool.get_volume(id)? {
                    Some(info) => {
                        volume.install_path = Some(info.install_path);
                        volume.physical_size = Some(info.physical_size);
                    }
                    None => tracing::warn!(
                        volume_id = %id,
                        pool_id = %pool_id,
                        "Volume assigned to pool but not present on it"
                    ),
                },
                None => tracing::warn!(
                    volume_id = %id,
                    pool_id = %pool_id,
                    "Volume assigned to unknown pool"
                ),
            }
        }

        Ok(Some(volume))
    }

    pub fn list(&self) -> VolumeflowResult<Vec<VolumeEntity>> {
        self.catalog.list()
    }

    /// Fail volumes left in `Creating` or `Destroying` by a previous process.
    ///
    /// Their completions died with that process, so nothing will ever drive
    /// them out of the transitional state. The pool assignment is kept: the
    /// backend may or may not have finished the work.
    pub fn recover_interrupted(&self) -> VolumeflowResult<usize> {
        let mut recovered = 0;
        for mut volume in self.catalog.list()? {
            if !volume.state().is_transitional() {
                continue;
            }
            let from = volume.state();
            self.apply_persisted(&mut volume, VolumeEvent::OperationFailed, |_| {})?;
            RuntimeMetricsStorage::incr(&self.metrics.volumes_failed);
            tracing::warn!(
                volume_id = %volume.id,
                from = %from,
                pool_id = ?volume.pool_id,
                "Volume was mid-operation at startup, marked Failed"
            );
            recovered += 1;
        }
        Ok(recovered)
    }

    /// Not implemented; follows the same continuation shape as `create_volume`.
    pub fn clone_volume(
        &self,
        _source: &VolumeEntity,
        _pool_id: PoolId,
        _callback: Completion<VolumeApiResult>,
    ) -> VolumeflowResult<()> {
        Err(VolumeflowError::Unsupported("clone volume".into()))
    }

    /// Not implemented; follows the same continuation shape as `create_volume`.
    pub fn create_volume_from_snapshot(
        &self,
        _volume: &VolumeEntity,
        _snapshot_id: u64,
        _callback: Completion<VolumeApiResult>,
    ) -> VolumeflowResult<()> {
        Err(VolumeflowError::Unsupported(
            "create volume from snapshot".into(),
        ))
    }

    pub fn grant_access(&self, _volume: &VolumeEntity, _host: &str) -> VolumeflowResult<()> {
        Err(VolumeflowError::Unsupported("grant access".into()))
    }

    pub fn revoke_access(&self, _volume: &VolumeEntity, _host: &str) -> VolumeflowResult<()> {
        Err(VolumeflowError::Unsupported("revoke access".into()))
    }

    fn resolve_pool(&self, pool_id: PoolId) -> VolumeflowResult<Arc<dyn StoragePoolBackend>> {
        self.pools
            .get_pool(pool_id)
            .ok_or(VolumeflowError::DataStoreNotFound(pool_id.0))
    }

    fn ensure_absent(
        &self,
        pool: &Arc<dyn StoragePoolBackend>,
        volume: &VolumeEntity,
    ) -> VolumeflowResult<()> {
        if pool.exists(volume)? {
            return Err(VolumeflowError::VolumeAlreadyExists {
                volume: volume.id.0,
                pool: pool.id().0,
            });
        }
        Ok(())
    }

    /// Apply `event` to a copy, let `prepare` adjust it, persist, then commit
    /// to `volume`. On any error `volume` is unchanged.
    fn apply_persisted<F>(
        &self,
        volume: &mut VolumeEntity,
        event: VolumeEvent,
        prepare: F,
    ) -> VolumeflowResult<VolumeState>
    where
        F: FnOnce(&mut VolumeEntity),
    {
        let mut next = volume.clone();
        let state = next.transit(event)?;
        prepare(&mut next);
        self.catalog.update(&next)?;
        *volume = next;
        Ok(state)
    }
}

impl std::fmt::Debug for VolumeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeOrchestrator")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::backend::{MemoryImageTransfer, MemoryPool, MemoryPools};
    use crate::catalog::SqliteCatalog;
    use crate::db::Database;
    use crate::volume::constants::GIB;

    pub(crate) struct Harness {
        pub pools: MemoryPools,
        pub pool: Arc<MemoryPool>,
        pub transfer: Arc<MemoryImageTransfer>,
        pub catalog: Arc<SqliteCatalog>,
        pub metrics: RuntimeMetricsStorage,
        pub orchestrator: VolumeOrchestrator,
    }

    impl Harness {
        pub fn new() -> Self {
            let pools = MemoryPools::new();
            let pool = pools.add(PoolId(7));
            let transfer = Arc::new(MemoryImageTransfer::new(pools.clone()));
            let catalog = Arc::new(SqliteCatalog::new(Database::open_in_memory().unwrap()));
            let metrics = RuntimeMetricsStorage::new();
            let orchestrator = VolumeOrchestrator::new(
                Arc::new(pools.clone()),
                catalog.clone(),
                transfer.clone(),
                metrics.clone(),
            );
            Self {
                pools,
                pool,
                transfer,
                catalog,
                metrics,
                orchestrator,
            }
        }

        pub fn allocate(&self, name: &str) -> VolumeEntity {
            self.orchestrator
                .allocate(20 * GIB, VolumeType::DataDisk, name, None)
                .unwrap()
        }

        pub fn stored(&self, id: VolumeId) -> Option<VolumeEntity> {
            self.catalog.find_by_id(id).unwrap()
        }
    }
}
