use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the default home directory.
pub const HOME_ENV: &str = "VOLUMEFLOW_HOME";

/// Configuration for a [`VolumeflowRuntime`](super::VolumeflowRuntime).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VolumeflowOptions {
    /// Root of the catalog database and logs. Must be absolute.
    #[serde(default = "default_home_dir")]
    pub home_dir: PathBuf,
}

impl Default for VolumeflowOptions {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
        }
    }
}

impl VolumeflowOptions {
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
        }
    }
}

/// `$VOLUMEFLOW_HOME`, else `~/.volumeflow`, else a directory under the
/// system temp dir when no home directory can be determined.
pub fn default_home_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .map(|home| home.join(".volumeflow"))
        .unwrap_or_else(|| std::env::temp_dir().join("volumeflow"))
}
