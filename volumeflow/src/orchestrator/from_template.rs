use std::sync::Arc;

use super::{VolumeApiResult, VolumeOrchestrator};
use crate::async_call::Completion;
use crate::backend::StoragePoolBackend;
use crate::template::StagingResult;
use crate::types::{PoolId, TemplateId, VolumeDiskType};
use crate::volume::{VolumeEntity, VolumeEvent};
use volumeflow_shared::{Failure, VolumeflowResult};

impl VolumeOrchestrator {
    /// Materialize `volume` on `pool_id` from `template_id`, staging the
    /// template onto the pool first when it is not already there.
    ///
    /// The same preconditions as [`VolumeOrchestrator::create_volume`] are
    /// checked up front. A staging failure is reported through `callback`
    /// with the volume untouched in `Allocated`.
    pub fn create_volume_from_template(
        &self,
        volume: VolumeEntity,
        pool_id: PoolId,
        disk_type: VolumeDiskType,
        template_id: TemplateId,
        callback: Completion<VolumeApiResult>,
    ) -> VolumeflowResult<()> {
        let pool = self.resolve_pool(pool_id)?;
        self.ensure_absent(&pool, &volume)?;
        volume.peek(VolumeEvent::CreateRequested)?;

        tracing::info!(
            volume_id = %volume.id,
            pool_id = %pool_id,
            template_id = %template_id,
            disk_type = disk_type.as_str(),
            "Creating volume from template"
        );

        let this = self.clone();
        let staged = Completion::new(move |staging: StagingResult| {
            this.on_template_staged(staging, volume, pool, callback)
        });
        self.staging.stage_template(template_id, pool_id, staged)
    }

    fn on_template_staged(
        &self,
        staging: StagingResult,
        mut volume: VolumeEntity,
        pool: Arc<dyn StoragePoolBackend>,
        callback: Completion<VolumeApiResult>,
    ) {
        if let Some(failure) = staging.failure {
            tracing::warn!(
                volume_id = %volume.id,
                template_id = %staging.record.template_id,
                %failure,
                "Template staging failed, volume left untouched"
            );
            callback.complete(VolumeApiResult::failed(volume, failure));
            return;
        }

        if let Err(e) = self.begin_create(&mut volume, pool.id()) {
            callback.complete(VolumeApiResult::failed(volume, Failure::from(&e)));
            return;
        }

        self.issue_base_image_create(pool, volume, staging.record, callback);
    }
}
