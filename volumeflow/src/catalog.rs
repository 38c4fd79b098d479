//! Persistent metadata store for volumes and template staging.

use crate::db::{Database, NewVolume, StagingStore, VolumeStore};
use crate::template::TemplateStagingRecord;
use crate::types::{PoolId, TemplateId, VolumeId, VolumeType};
use crate::volume::VolumeEntity;
use volumeflow_shared::{VolumeflowError, VolumeflowResult};

/// Catalog seam used by the orchestrator.
///
/// Called from resume handlers on arbitrary threads, hence `Send + Sync`.
pub trait Catalog: Send + Sync {
    /// Create a row in `Allocated` state with no pool.
    fn allocate(
        &self,
        size: u64,
        volume_type: VolumeType,
        name: &str,
        template_id: Option<TemplateId>,
    ) -> VolumeflowResult<VolumeEntity>;

    fn find_by_id(&self, id: VolumeId) -> VolumeflowResult<Option<VolumeEntity>>;

    /// Persist state, pool assignment and install path.
    fn update(&self, volume: &VolumeEntity) -> VolumeflowResult<()>;

    fn remove(&self, id: VolumeId) -> VolumeflowResult<()>;

    fn list(&self) -> VolumeflowResult<Vec<VolumeEntity>>;

    fn save_staging(&self, record: &TemplateStagingRecord) -> VolumeflowResult<()>;

    fn find_staging(
        &self,
        template_id: TemplateId,
        pool_id: PoolId,
    ) -> VolumeflowResult<Option<TemplateStagingRecord>>;
}

/// SQLite-backed [`Catalog`].
#[derive(Clone, Debug)]
pub struct SqliteCatalog {
    volumes: VolumeStore,
    staging: StagingStore,
}

impl SqliteCatalog {
    pub fn new(db: Database) -> Self {
        Self {
            volumes: VolumeStore::new(db.clone()),
            staging: StagingStore::new(db),
        }
    }
}

impl Catalog for SqliteCatalog {
    fn allocate(
        &self,
        size: u64,
        volume_type: VolumeType,
        name: &str,
        template_id: Option<TemplateId>,
    ) -> VolumeflowResult<VolumeEntity> {
        let volume = self.volumes.insert(&NewVolume {
            size,
            volume_type,
            name,
            template_id,
        })?;
        tracing::debug!(volume_id = %volume.id, name = %volume.name, "Allocated volume row");
        Ok(volume)
    }

    fn find_by_id(&self, id: VolumeId) -> VolumeflowResult<Option<VolumeEntity>> {
        self.volumes.get(id)
    }

    fn update(&self, volume: &VolumeEntity) -> VolumeflowResult<()> {
        self.volumes.update(volume)
    }

    fn remove(&self, id: VolumeId) -> VolumeflowResult<()> {
        if !self.volumes.delete(id)? {
            return Err(VolumeflowError::NotFound(format!("volume {}", id)));
        }
        tracing::debug!(volume_id = %id, "Removed volume row");
        Ok(())
    }

    fn list(&self) -> VolumeflowResult<Vec<VolumeEntity>> {
        self.volumes.list_all()
    }

    fn save_staging(&self, record: &TemplateStagingRecord) -> VolumeflowResult<()> {
        self.staging.upsert(record)
    }

    fn find_staging(
        &self,
        template_id: TemplateId,
        pool_id: PoolId,
    ) -> VolumeflowResult<Option<TemplateStagingRecord>> {
        self.staging.get(template_id, pool_id)
    }
}
