use super::state::{VolumeEvent, VolumeState};
use crate::fsm;
use crate::types::{PoolId, TemplateId, VolumeId, VolumeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use volumeflow_shared::VolumeflowResult;

/// A virtual volume as tracked by the catalog.
///
/// Owned by whichever workflow currently has it in flight; the catalog holds
/// the durable copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeEntity {
    pub id: VolumeId,
    /// Requested capacity in bytes.
    pub size: u64,
    pub volume_type: VolumeType,
    pub name: String,
    pub template_id: Option<TemplateId>,
    /// Pool the volume is materialized on, if any.
    pub pool_id: Option<PoolId>,
    /// Backend-reported location once materialized.
    #[serde(default)]
    pub install_path: Option<String>,
    /// Bytes actually used on the pool. Live value, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_size: Option<u64>,
    pub(crate) state: VolumeState,
    pub created_at: DateTime<Utc>,
}

impl VolumeEntity {
    pub fn state(&self) -> VolumeState {
        self.state
    }

    /// Next state for `event`, or `InvalidTransition`. Does not mutate.
    pub fn peek(&self, event: VolumeEvent) -> VolumeflowResult<VolumeState> {
        fsm::peek(self.state, event)
    }

    /// Apply `event` through the transition table.
    pub fn transit(&mut self, event: VolumeEvent) -> VolumeflowResult<VolumeState> {
        let from = self.state;
        let to = fsm::transit(&mut self.state, event)?;
        tracing::debug!(
            volume_id = %self.id,
            from = %from,
            to = %to,
            event = ?event,
            "Volume state transition"
        );
        Ok(to)
    }

    /// Mark a never-materialized volume as gone.
    ///
    /// Not a table transition: an unmaterialized volume has no backend
    /// resource to destroy, so there is no `Destroying` phase to pass through.
    pub(crate) fn expunge(&mut self) {
        tracing::debug!(volume_id = %self.id, from = %self.state, "Expunging volume");
        self.state = VolumeState::Destroyed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocated(id: u64) -> VolumeEntity {
        VolumeEntity {
            id: VolumeId(id),
            size: 1 << 30,
            volume_type: VolumeType::DataDisk,
            name: format!("vol-{id}"),
            template_id: None,
            pool_id: None,
            install_path: None,
            physical_size: None,
            state: VolumeState::Allocated,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_transit_updates_state() {
        let mut vol = allocated(1);
        vol.transit(VolumeEvent::CreateRequested).unwrap();
        assert_eq!(vol.state(), VolumeState::Creating);
    }

    #[test]
    fn test_illegal_transit_keeps_state() {
        let mut vol = allocated(1);
        assert!(vol.transit(VolumeEvent::DestroyRequested).is_err());
        assert_eq!(vol.state(), VolumeState::Allocated);
    }

    #[test]
    fn test_expunge_from_allocated() {
        let mut vol = allocated(1);
        vol.expunge();
        assert_eq!(vol.state(), VolumeState::Destroyed);
    }
}
