//! Template staging: records, their state machine, and the staging workflow.

mod record;
mod staging;

pub use record::{StagingEvent, StagingState, StagingStatus, TemplateStagingRecord};
pub use staging::{StagingResult, TemplateStagingWorkflow};
