//! Identifiers and small enums shared across modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use volumeflow_shared::VolumeflowError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

numeric_id!(
    /// Catalog-assigned volume identifier.
    VolumeId
);
numeric_id!(
    /// Primary storage pool identifier.
    PoolId
);
numeric_id!(
    /// Template image identifier.
    TemplateId
);

/// Role of a volume on its virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeType {
    Root,
    DataDisk,
    Iso,
    Unknown,
}

impl VolumeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "ROOT",
            Self::DataDisk => "DATADISK",
            Self::Iso => "ISO",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeType {
    type Err = VolumeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ROOT" => Ok(Self::Root),
            "DATADISK" => Ok(Self::DataDisk),
            "ISO" => Ok(Self::Iso),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(VolumeflowError::InvalidArgument(format!(
                "unknown volume type: {}",
                other
            ))),
        }
    }
}

/// On-pool disk format requested for a new volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeDiskType {
    Raw,
    Qcow2,
    Vhd,
    Thin,
}

impl VolumeDiskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::Qcow2 => "QCOW2",
            Self::Vhd => "VHD",
            Self::Thin => "THIN",
        }
    }
}

impl fmt::Display for VolumeDiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeDiskType {
    type Err = VolumeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RAW" => Ok(Self::Raw),
            "QCOW2" => Ok(Self::Qcow2),
            "VHD" => Ok(Self::Vhd),
            "THIN" => Ok(Self::Thin),
            other => Err(VolumeflowError::InvalidArgument(format!(
                "unknown disk type: {}",
                other
            ))),
        }
    }
}
