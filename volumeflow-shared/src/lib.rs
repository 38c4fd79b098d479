//! Shared types for volumeflow crates.

pub mod errors;

pub use errors::{ErrorCode, Failure, VolumeflowError, VolumeflowResult};
