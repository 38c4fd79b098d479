//! Volume lifecycle state machine.
//!
//! ```text
//! Allocated ──CreateRequested──► Creating ──OperationSucceeded──► Ready
//!                                   │                               │
//!                            OperationFailed                DestroyRequested
//!                                   ▼                               ▼
//!                                Failed ◄──OperationFailed──── Destroying
//!                                                                   │
//!                                                        OperationSucceeded
//!                                                                   ▼
//!                                                               Destroyed
//! ```

use crate::fsm::StateMachine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use volumeflow_shared::VolumeflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeState {
    /// Catalog row only; nothing on any pool.
    Allocated,
    Creating,
    Ready,
    Destroying,
    Destroyed,
    /// Terminal for the attempt that failed.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeEvent {
    CreateRequested,
    DestroyRequested,
    OperationSucceeded,
    OperationFailed,
}

impl VolumeState {
    pub const ALL: [VolumeState; 6] = [
        Self::Allocated,
        Self::Creating,
        Self::Ready,
        Self::Destroying,
        Self::Destroyed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allocated => "Allocated",
            Self::Creating => "Creating",
            Self::Ready => "Ready",
            Self::Destroying => "Destroying",
            Self::Destroyed => "Destroyed",
            Self::Failed => "Failed",
        }
    }

    /// A backend call is outstanding in this state.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Creating | Self::Destroying)
    }
}

impl VolumeEvent {
    pub const ALL: [VolumeEvent; 4] = [
        Self::CreateRequested,
        Self::DestroyRequested,
        Self::OperationSucceeded,
        Self::OperationFailed,
    ];
}

impl StateMachine for VolumeState {
    type Event = VolumeEvent;

    fn next(self, event: VolumeEvent) -> Option<Self> {
        use VolumeEvent::*;
        use VolumeState::*;

        match (self, event) {
            (Allocated, CreateRequested) => Some(Creating),
            (Creating, OperationSucceeded) => Some(Ready),
            (Creating, OperationFailed) => Some(Failed),
            (Ready, DestroyRequested) => Some(Destroying),
            (Destroying, OperationSucceeded) => Some(Destroyed),
            (Destroying, OperationFailed) => Some(Failed),
            _ => None,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed | Self::Failed)
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeState {
    type Err = VolumeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| VolumeflowError::Database(format!("unknown volume state: {}", s)))
    }
}
