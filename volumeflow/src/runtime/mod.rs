//! Runtime assembly: options, on-disk layout and the wired orchestrator.

mod core;
pub mod layout;
mod options;

pub use self::core::VolumeflowRuntime;
pub use layout::FilesystemLayout;
pub use options::{HOME_ENV, VolumeflowOptions, default_home_dir};
