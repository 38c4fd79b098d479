//! Size constants.

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

/// Smallest volume the catalog accepts.
pub const MIN_VOLUME_SIZE_BYTES: u64 = MIB;

/// Upper bound on a single volume (64 TiB).
pub const MAX_VOLUME_SIZE_BYTES: u64 = 64 * 1024 * GIB;

/// Longest volume name accepted by `allocate`.
pub const MAX_NAME_LEN: usize = 255;
