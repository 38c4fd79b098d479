//! Volume entity and its lifecycle state machine.

pub mod constants;
mod entity;
mod state;

pub use entity::VolumeEntity;
pub use state::{VolumeEvent, VolumeState};
