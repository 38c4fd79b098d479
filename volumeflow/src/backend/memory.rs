//! In-memory pools and image transfer.
//!
//! Completions are delivered on a tokio task when a runtime is available, and
//! on a fresh thread otherwise, so callers never see their handle invoked
//! before the issuing call returns.

use super::{ImageTransferService, PoolProvider, PoolVolumeInfo, StoragePoolBackend};
use crate::async_call::{CallbackHandle, OperationResult};
use crate::template::{StagingStatus, TemplateStagingRecord};
use crate::types::{PoolId, TemplateId, VolumeDiskType, VolumeId};
use crate::volume::VolumeEntity;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use volumeflow_shared::{VolumeflowError, VolumeflowResult};

fn complete_later(handle: CallbackHandle, result: OperationResult) {
    match tokio::runtime::Handle::try_current() {
        Ok(rt) => {
            rt.spawn(async move { handle.complete(result) });
        }
        Err(_) => {
            std::thread::spawn(move || handle.complete(result));
        }
    }
}

#[derive(Default)]
struct PoolState {
    volumes: HashMap<VolumeId, PoolVolumeInfo>,
    templates: HashMap<TemplateId, TemplateStagingRecord>,
    fail_create: Option<String>,
    fail_delete: Option<String>,
    fail_install: Option<String>,
}

/// A pool that keeps its volumes and base images in a map.
pub struct MemoryPool {
    id: PoolId,
    root: String,
    state: Mutex<PoolState>,
    deferred: AtomicBool,
    pending: Mutex<Vec<(CallbackHandle, OperationResult)>>,
    create_calls: AtomicU64,
    delete_calls: AtomicU64,
    install_calls: AtomicU64,
    base_image_calls: AtomicU64,
}

impl MemoryPool {
    pub fn new(id: PoolId) -> Self {
        Self {
            id,
            root: format!("/pools/{}", id),
            state: Mutex::new(PoolState::default()),
            deferred: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
            create_calls: AtomicU64::new(0),
            delete_calls: AtomicU64::new(0),
            install_calls: AtomicU64::new(0),
            base_image_calls: AtomicU64::new(0),
        }
    }

    /// Make every subsequent `create_async` / `create_from_base_image_async`
    /// report failure with `detail`.
    pub fn fail_create(&self, detail: impl Into<String>) {
        self.state.lock().fail_create = Some(detail.into());
    }

    pub fn fail_delete(&self, detail: impl Into<String>) {
        self.state.lock().fail_delete = Some(detail.into());
    }

    pub fn fail_install(&self, detail: impl Into<String>) {
        self.state.lock().fail_install = Some(detail.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.fail_create = None;
        state.fail_delete = None;
        state.fail_install = None;
    }

    /// Hold completions until [`MemoryPool::release_pending`] is called.
    pub fn set_deferred(&self, deferred: bool) {
        self.deferred.store(deferred, Ordering::SeqCst);
    }

    /// Deliver every held completion. Returns how many were released.
    pub fn release_pending(&self) -> usize {
        let drained = std::mem::take(&mut *self.pending.lock());
        let count = drained.len();
        for (handle, result) in drained {
            complete_later(handle, result);
        }
        count
    }

    /// Mark `template_id` as already present on this pool.
    pub fn preload_template(&self, template_id: TemplateId) {
        let mut record = TemplateStagingRecord::new(template_id, self.id);
        self.mark_staged(&mut record);
    }

    pub fn create_calls(&self) -> u64 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn install_calls(&self) -> u64 {
        self.install_calls.load(Ordering::SeqCst)
    }

    pub fn base_image_calls(&self) -> u64 {
        self.base_image_calls.load(Ordering::SeqCst)
    }

    pub fn volume_count(&self) -> usize {
        self.state.lock().volumes.len()
    }

    fn volume_path(&self, id: VolumeId) -> String {
        format!("{}/volumes/{}", self.root, id)
    }

    fn mark_staged(&self, record: &mut TemplateStagingRecord) -> String {
        let path = format!("{}/templates/{}", self.root, record.template_id);
        record.status = StagingStatus::Created;
        record.install_path = Some(path.clone());
        self.state
            .lock()
            .templates
            .insert(record.template_id, record.clone());
        path
    }

    fn deliver(&self, handle: CallbackHandle, result: OperationResult) {
        if self.deferred.load(Ordering::SeqCst) {
            self.pending.lock().push((handle, result));
        } else {
            complete_later(handle, result);
        }
    }

    fn materialize(&self, volume: &VolumeEntity, physical_size: u64) -> OperationResult {
        let mut state = self.state.lock();
        if let Some(detail) = &state.fail_create {
            return OperationResult::failure(detail.clone());
        }
        let install_path = self.volume_path(volume.id);
        state.volumes.insert(
            volume.id,
            PoolVolumeInfo {
                install_path: install_path.clone(),
                physical_size,
            },
        );
        OperationResult::success().with_payload(json!({ "install_path": install_path }))
    }
}

impl StoragePoolBackend for MemoryPool {
    fn id(&self) -> PoolId {
        self.id
    }

    fn exists(&self, volume: &VolumeEntity) -> VolumeflowResult<bool> {
        Ok(self.state.lock().volumes.contains_key(&volume.id))
    }

    fn create_async(&self, volume: &VolumeEntity, disk_type: VolumeDiskType, callback: CallbackHandle) {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let physical_size = match disk_type {
            VolumeDiskType::Thin => 0,
            _ => volume.size,
        };
        let result = self.materialize(volume, physical_size);
        self.deliver(callback, result);
    }

    fn delete_async(&self, volume: &VolumeEntity, callback: CallbackHandle) {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let result = {
            let mut state = self.state.lock();
            match &state.fail_delete {
                Some(detail) => OperationResult::failure(detail.clone()),
                None => {
                    state.volumes.remove(&volume.id);
                    OperationResult::success()
                }
            }
        };
        self.deliver(callback, result);
    }

    fn install_template(&self, record: &TemplateStagingRecord) -> VolumeflowResult<()> {
        self.install_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if let Some(detail) = &state.fail_install {
            return Err(VolumeflowError::Backend(detail.clone()));
        }
        let mut placeholder = record.clone();
        placeholder.status = StagingStatus::DownloadInProgress;
        state.templates.insert(record.template_id, placeholder);
        Ok(())
    }

    fn create_from_base_image_async(
        &self,
        volume: &VolumeEntity,
        base_image: &TemplateStagingRecord,
        callback: CallbackHandle,
    ) {
        self.base_image_calls.fetch_add(1, Ordering::SeqCst);
        let staged = self
            .state
            .lock()
            .templates
            .get(&base_image.template_id)
            .is_some_and(|r| r.is_staged());

        let result = if staged {
            self.materialize(volume, volume.size)
        } else {
            OperationResult::failure(format!(
                "base image {} is not staged on pool {}",
                base_image.template_id, self.id
            ))
        };
        self.deliver(callback, result);
    }

    fn lookup_template_staging(
        &self,
        template_id: TemplateId,
    ) -> VolumeflowResult<Option<TemplateStagingRecord>> {
        Ok(self.state.lock().templates.get(&template_id).cloned())
    }

    fn get_volume(&self, volume_id: VolumeId) -> VolumeflowResult<Option<PoolVolumeInfo>> {
        Ok(self.state.lock().volumes.get(&volume_id).cloned())
    }
}

/// Registry of [`MemoryPool`]s, cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryPools {
    pools: Arc<RwLock<HashMap<PoolId, Arc<MemoryPool>>>>,
}

impl MemoryPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool, replacing any existing pool with the same id.
    pub fn add(&self, id: PoolId) -> Arc<MemoryPool> {
        let pool = Arc::new(MemoryPool::new(id));
        self.pools.write().insert(id, Arc::clone(&pool));
        pool
    }

    pub fn get(&self, id: PoolId) -> Option<Arc<MemoryPool>> {
        self.pools.read().get(&id).cloned()
    }
}

impl PoolProvider for MemoryPools {
    fn get_pool(&self, pool_id: PoolId) -> Option<Arc<dyn StoragePoolBackend>> {
        self.get(pool_id)
            .map(|pool| pool as Arc<dyn StoragePoolBackend>)
    }
}

/// Transfer service that "copies" by marking the template present on the
/// target [`MemoryPool`].
pub struct MemoryImageTransfer {
    pools: MemoryPools,
    fail_copy: Mutex<Option<String>>,
    copy_calls: AtomicU64,
}

impl MemoryImageTransfer {
    pub fn new(pools: MemoryPools) -> Self {
        Self {
            pools,
            fail_copy: Mutex::new(None),
            copy_calls: AtomicU64::new(0),
        }
    }

    pub fn fail_copy(&self, detail: impl Into<String>) {
        *self.fail_copy.lock() = Some(detail.into());
    }

    pub fn clear_failures(&self) {
        *self.fail_copy.lock() = None;
    }

    pub fn copy_calls(&self) -> u64 {
        self.copy_calls.load(Ordering::SeqCst)
    }
}

impl ImageTransferService for MemoryImageTransfer {
    fn copy_async(&self, record: &TemplateStagingRecord, callback: CallbackHandle) {
        self.copy_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(detail) = self.fail_copy.lock().clone() {
            complete_later(callback, OperationResult::failure(detail));
            return;
        }

        let Some(pool) = self.pools.get(record.pool_id) else {
            complete_later(
                callback,
                OperationResult::failure(format!("pool {} is not reachable", record.pool_id)),
            );
            return;
        };

        let mut copied = record.clone();
        let path = pool.mark_staged(&mut copied);
        tracing::debug!(
            template_id = %record.template_id,
            pool_id = %record.pool_id,
            install_path = %path,
            "Template copied"
        );
        complete_later(
            callback,
            OperationResult::success().with_payload(json!({ "install_path": path })),
        );
    }
}
