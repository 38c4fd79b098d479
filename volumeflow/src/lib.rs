//! Asynchronous volume lifecycle orchestration.
//!
//! A [`VolumeflowRuntime`] wires a persistent catalog, a set of storage pools
//! and an image transfer service into a [`VolumeOrchestrator`]. The
//! orchestrator's workflows issue backend calls through a continuation
//! dispatcher and return immediately; outcomes arrive through a
//! [`Completion`].

pub mod async_call;
pub mod backend;
pub mod catalog;
pub mod db;
pub mod fsm;
mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod runtime;
pub mod template;
pub mod types;
pub mod volume;

pub use async_call::{Completion, OperationResult};
pub use backend::{ImageTransferService, PoolProvider, StoragePoolBackend};
pub use catalog::{Catalog, SqliteCatalog};
pub use logging::init_logging_for;
pub use metrics::{RuntimeMetrics, RuntimeMetricsStorage};
pub use orchestrator::{VolumeApiResult, VolumeOrchestrator};
pub use runtime::{VolumeflowOptions, VolumeflowRuntime};
pub use template::{StagingResult, StagingStatus, TemplateStagingRecord};
pub use types::{PoolId, TemplateId, VolumeDiskType, VolumeId, VolumeType};
pub use volume::{VolumeEntity, VolumeEvent, VolumeState};
pub use volumeflow_shared::{ErrorCode, Failure, VolumeflowError, VolumeflowResult};
