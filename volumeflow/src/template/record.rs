use crate::fsm::{self, StateMachine};
use crate::types::{PoolId, TemplateId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use volumeflow_shared::{VolumeflowError, VolumeflowResult};

/// How far a template's bytes have made it onto a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StagingStatus {
    NotPresent,
    Creating,
    Created,
    DownloadInProgress,
    Abandoned,
}

impl StagingStatus {
    pub const ALL: [StagingStatus; 5] = [
        Self::NotPresent,
        Self::Creating,
        Self::Created,
        Self::DownloadInProgress,
        Self::Abandoned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotPresent => "NOT_PRESENT",
            Self::Creating => "CREATING",
            Self::Created => "CREATED",
            Self::DownloadInProgress => "DOWNLOAD_IN_PROGRESS",
            Self::Abandoned => "ABANDONED",
        }
    }

    /// The template can be used as a base image on its pool.
    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Created)
    }
}

impl fmt::Display for StagingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StagingStatus {
    type Err = VolumeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| VolumeflowError::Database(format!("unknown staging status: {}", s)))
    }
}

/// Lifecycle of one staging attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StagingState {
    Allocated,
    Creating,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StagingEvent {
    CreateRequested,
    OperationSucceeded,
    OperationFailed,
}

impl StagingState {
    pub const ALL: [StagingState; 4] = [Self::Allocated, Self::Creating, Self::Ready, Self::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allocated => "Allocated",
            Self::Creating => "Creating",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        }
    }
}

impl StateMachine for StagingState {
    type Event = StagingEvent;

    fn next(self, event: StagingEvent) -> Option<Self> {
        match (self, event) {
            (Self::Allocated, StagingEvent::CreateRequested) => Some(Self::Creating),
            (Self::Creating, StagingEvent::OperationSucceeded) => Some(Self::Ready),
            (Self::Creating, StagingEvent::OperationFailed) => Some(Self::Failed),
            _ => None,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

impl FromStr for StagingState {
    type Err = VolumeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| VolumeflowError::Database(format!("unknown staging state: {}", s)))
    }
}

/// A template's presence on one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStagingRecord {
    pub template_id: TemplateId,
    pub pool_id: PoolId,
    pub status: StagingStatus,
    pub state: StagingState,
    /// Where the pool keeps the base image, once installed.
    #[serde(default)]
    pub install_path: Option<String>,
}

impl TemplateStagingRecord {
    pub fn new(template_id: TemplateId, pool_id: PoolId) -> Self {
        Self {
            template_id,
            pool_id,
            status: StagingStatus::NotPresent,
            state: StagingState::Allocated,
            install_path: None,
        }
    }

    pub fn is_staged(&self) -> bool {
        self.status.is_staged()
    }

    pub fn transit(&mut self, event: StagingEvent) -> VolumeflowResult<StagingState> {
        let to = fsm::transit(&mut self.state, event)?;
        tracing::debug!(
            template_id = %self.template_id,
            pool_id = %self.pool_id,
            state = ?to,
            event = ?event,
            "Template staging transition"
        );
        Ok(to)
    }

    pub fn update_status(&mut self, status: StagingStatus) {
        tracing::trace!(
            template_id = %self.template_id,
            pool_id = %self.pool_id,
            old_status = %self.status,
            new_status = %status,
            "Updating staging status"
        );
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_created_counts_as_staged() {
        let staged: Vec<_> = StagingStatus::ALL
            .into_iter()
            .filter(|s| s.is_staged())
            .collect();
        assert_eq!(staged, vec![StagingStatus::Created]);
    }

    #[test]
    fn test_staging_table() {
        let mut rec = TemplateStagingRecord::new(TemplateId(1), PoolId(2));
        assert!(rec.transit(StagingEvent::OperationSucceeded).is_err());
        assert_eq!(rec.state, StagingState::Allocated);

        rec.transit(StagingEvent::CreateRequested).unwrap();
        rec.transit(StagingEvent::OperationFailed).unwrap();
        assert_eq!(rec.state, StagingState::Failed);
        assert!(rec.transit(StagingEvent::CreateRequested).is_err());
    }

    #[test]
    fn test_status_parse() {
        for status in StagingStatus::ALL {
            assert_eq!(status.as_str().parse::<StagingStatus>().unwrap(), status);
        }
    }
}
