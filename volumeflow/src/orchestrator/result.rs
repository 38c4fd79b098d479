use crate::volume::VolumeEntity;
use serde::{Deserialize, Serialize};
use volumeflow_shared::Failure;

/// Outcome delivered to the caller of a continuation-based volume operation.
///
/// `volume` is the entity as the workflow left it, so a failed create still
/// tells the caller which state the volume ended in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeApiResult {
    pub volume: VolumeEntity,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl VolumeApiResult {
    pub fn succeeded(volume: VolumeEntity) -> Self {
        Self {
            volume,
            success: true,
            failure: None,
        }
    }

    pub fn failed(volume: VolumeEntity, failure: Failure) -> Self {
        Self {
            volume,
            success: false,
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn failure_detail(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.detail.as_str())
    }
}
