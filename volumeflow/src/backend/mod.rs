//! Collaborator seams: storage pools and the image transfer service.
//!
//! Async entry points take a [`CallbackHandle`] and must invoke it exactly
//! once, from any thread. Synchronous entry points return
//! [`VolumeflowResult`] and are treated as the synchronous failure channel.

mod memory;

pub use memory::{MemoryImageTransfer, MemoryPool, MemoryPools};

use crate::async_call::CallbackHandle;
use crate::template::TemplateStagingRecord;
use crate::types::{PoolId, TemplateId, VolumeDiskType, VolumeId};
use crate::volume::VolumeEntity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use volumeflow_shared::VolumeflowResult;

/// Live view of a volume as the pool sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolVolumeInfo {
    pub install_path: String,
    pub physical_size: u64,
}

/// A primary storage pool capable of hosting materialized volumes.
pub trait StoragePoolBackend: Send + Sync {
    fn id(&self) -> PoolId;

    /// Whether `volume` is already present on this pool.
    fn exists(&self, volume: &VolumeEntity) -> VolumeflowResult<bool>;

    fn create_async(&self, volume: &VolumeEntity, disk_type: VolumeDiskType, callback: CallbackHandle);

    fn delete_async(&self, volume: &VolumeEntity, callback: CallbackHandle);

    /// Prepare the pool to receive a template. Synchronous; may fail.
    fn install_template(&self, record: &TemplateStagingRecord) -> VolumeflowResult<()>;

    fn create_from_base_image_async(
        &self,
        volume: &VolumeEntity,
        base_image: &TemplateStagingRecord,
        callback: CallbackHandle,
    );

    /// The pool's current staging record for `template_id`, if any.
    fn lookup_template_staging(
        &self,
        template_id: TemplateId,
    ) -> VolumeflowResult<Option<TemplateStagingRecord>>;

    fn get_volume(&self, volume_id: VolumeId) -> VolumeflowResult<Option<PoolVolumeInfo>>;
}

/// Copies template bytes from secondary storage onto a pool.
pub trait ImageTransferService: Send + Sync {
    fn copy_async(&self, record: &TemplateStagingRecord, callback: CallbackHandle);
}

/// Resolves pool ids to backends.
pub trait PoolProvider: Send + Sync {
    fn get_pool(&self, pool_id: PoolId) -> Option<Arc<dyn StoragePoolBackend>>;
}
