//! Runtime entry point.

use std::sync::Arc;

use super::layout::FilesystemLayout;
use super::options::VolumeflowOptions;
use crate::backend::{ImageTransferService, PoolProvider};
use crate::catalog::SqliteCatalog;
use crate::db::Database;
use crate::init_logging_for;
use crate::metrics::{RuntimeMetrics, RuntimeMetricsStorage};
use crate::orchestrator::VolumeOrchestrator;
use volumeflow_shared::{VolumeflowError, VolumeflowResult};

/// Owns the catalog, metrics and orchestrator for one home directory.
///
/// **Cloning**: cheap, all clones share the same state.
#[derive(Clone)]
pub struct VolumeflowRuntime {
    inner: Arc<RuntimeInnerImpl>,
}

struct RuntimeInnerImpl {
    /// Immutable after init
    layout: FilesystemLayout,
    orchestrator: VolumeOrchestrator,
    /// AtomicU64 based, lock-free
    runtime_metrics: RuntimeMetricsStorage,
}

impl VolumeflowRuntime {
    /// Build a runtime against the given pools and transfer service.
    ///
    /// All setup completes before returning. Volumes left mid-operation by a
    /// previous process are marked `Failed`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `home_dir` is not absolute
    /// - Filesystem initialization fails
    /// - The catalog database cannot be opened or has a newer schema
    pub fn new(
        options: VolumeflowOptions,
        pools: Arc<dyn PoolProvider>,
        transfer: Arc<dyn ImageTransferService>,
    ) -> VolumeflowResult<Self> {
        if !options.home_dir.is_absolute() {
            return Err(VolumeflowError::Config(format!(
                "home_dir must be absolute path, got: {}",
                options.home_dir.display()
            )));
        }

        let layout = FilesystemLayout::new(options.home_dir.clone());
        layout.prepare().map_err(|e| {
            VolumeflowError::Storage(format!(
                "Failed to initialize filesystem at {}: {}",
                layout.home_dir().display(),
                e
            ))
        })?;

        init_logging_for(&layout)?;

        let db = Database::open(&layout.db_path()).map_err(|e| {
            VolumeflowError::Storage(format!(
                "Failed to initialize database at {}: {}",
                layout.db_path().display(),
                e
            ))
        })?;

        let runtime_metrics = RuntimeMetricsStorage::new();
        let orchestrator = VolumeOrchestrator::new(
            pools,
            Arc::new(SqliteCatalog::new(db)),
            transfer,
            runtime_metrics.clone(),
        );

        let recovered = orchestrator.recover_interrupted()?;
        if recovered > 0 {
            tracing::warn!(recovered, "Recovered interrupted volumes");
        }

        tracing::debug!(home_dir = %layout.home_dir().display(), "initialized runtime");

        Ok(Self {
            inner: Arc::new(RuntimeInnerImpl {
                layout,
                orchestrator,
                runtime_metrics,
            }),
        })
    }

    pub fn orchestrator(&self) -> &VolumeOrchestrator {
        &self.inner.orchestrator
    }

    pub fn layout(&self) -> &FilesystemLayout {
        &self.inner.layout
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        RuntimeMetrics::new(self.inner.runtime_metrics.clone())
    }
}

impl std::fmt::Debug for VolumeflowRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeflowRuntime")
            .field("home_dir", &self.inner.layout.home_dir())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_call::Completion;
    use crate::backend::{MemoryImageTransfer, MemoryPools};
    use crate::types::{PoolId, VolumeDiskType, VolumeType};
    use crate::volume::VolumeState;
    use crate::volume::constants::GIB;
    use tempfile::TempDir;

    fn runtime(home: &TempDir, pools: &MemoryPools) -> VolumeflowRuntime {
        VolumeflowRuntime::new(
            VolumeflowOptions::with_home(home.path()),
            Arc::new(pools.clone()),
            Arc::new(MemoryImageTransfer::new(pools.clone())),
        )
        .unwrap()
    }

    #[test]
    fn test_relative_home_is_rejected() {
        let pools = MemoryPools::new();
        let err = VolumeflowRuntime::new(
            VolumeflowOptions::with_home("relative/home"),
            Arc::new(pools.clone()),
            Arc::new(MemoryImageTransfer::new(pools)),
        )
        .unwrap_err();
        assert!(matches!(err, VolumeflowError::Config(_)));
    }

    #[test]
    fn test_new_prepares_layout() {
        let home = TempDir::new().unwrap();
        let rt = runtime(&home, &MemoryPools::new());
        assert!(rt.layout().db_path().exists());
        assert!(rt.layout().logs_dir().is_dir());
    }

    #[tokio::test]
    async fn test_catalog_survives_restart() {
        let home = TempDir::new().unwrap();
        let pools = MemoryPools::new();
        pools.add(PoolId(1));

        let id = {
            let rt = runtime(&home, &pools);
            let vol = rt
                .orchestrator()
                .allocate(20 * GIB, VolumeType::DataDisk, "data-01", None)
                .unwrap();
            let (done, rx) = Completion::channel();
            rt.orchestrator()
                .create_volume(vol, PoolId(1), VolumeDiskType::Thin, done)
                .unwrap();
            let result = rx.await.unwrap();
            assert!(result.is_success());
            assert_eq!(rt.metrics().volumes_created_total(), 1);
            result.volume.id
        };

        let rt = runtime(&home, &pools);
        let found = rt.orchestrator().lookup(id).unwrap().unwrap();
        assert_eq!(found.state(), VolumeState::Ready);
        assert_eq!(found.physical_size, Some(0));
    }

    #[test]
    fn test_restart_fails_interrupted_create() {
        let home = TempDir::new().unwrap();
        let pools = MemoryPools::new();
        let pool = pools.add(PoolId(1));
        pool.set_deferred(true);

        let id = {
            let rt = runtime(&home, &pools);
            let vol = rt
                .orchestrator()
                .allocate(GIB, VolumeType::DataDisk, "data-01", None)
                .unwrap();
            let (done, _rx) = Completion::channel();
            rt.orchestrator()
                .create_volume(vol.clone(), PoolId(1), VolumeDiskType::Raw, done)
                .unwrap();
            vol.id
        };

        let rt = runtime(&home, &pools);
        assert_eq!(rt.metrics().volumes_failed_total(), 1);
        let found = rt.orchestrator().lookup(id).unwrap().unwrap();
        assert_eq!(found.state(), VolumeState::Failed);
    }
}
