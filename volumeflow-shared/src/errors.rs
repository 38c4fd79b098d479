//! Error types for volumeflow.
//!
//! Every fallible operation returns [`VolumeflowResult`]. Errors that have to
//! cross a continuation boundary are flattened into a [`Failure`], which keeps
//! exactly one [`ErrorCode`] and a free-text detail.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type VolumeflowResult<T> = Result<T, VolumeflowError>;

#[derive(Debug, Error)]
pub enum VolumeflowError {
    /// The (state, event) pair is not present in the transition table.
    #[error("invalid transition: event {event} not allowed in state {from}")]
    InvalidTransition { from: String, event: String },

    #[error("can't find data store: {0}")]
    DataStoreNotFound(u64),

    #[error("volume {volume} already exists on primary data store {pool}")]
    VolumeAlreadyExists { volume: u64, pool: u64 },

    /// Synchronous template install on the pool failed.
    #[error("template install failed: {0}")]
    TemplateInstallFailure(String),

    /// Asynchronous template copy reported failure.
    #[error("template copy failed: {0}")]
    TemplateCopyFailure(String),

    /// A storage backend reported failure.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<std::io::Error> for VolumeflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl VolumeflowError {
    /// Create a [`VolumeflowError::Backend`] from anything displayable.
    pub fn backend<E: fmt::Display>(e: E) -> Self {
        Self::Backend(e.to_string())
    }

    /// Failure code reported to callers for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::DataStoreNotFound(_) => ErrorCode::DataStoreNotFound,
            Self::VolumeAlreadyExists { .. } => ErrorCode::VolumeAlreadyExists,
            Self::TemplateInstallFailure(_) => ErrorCode::TemplateInstallFailure,
            Self::TemplateCopyFailure(_) => ErrorCode::TemplateCopyFailure,
            Self::Backend(_) => ErrorCode::BackendFailure,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidArgument(_) => ErrorCode::InvalidRequest,
            Self::Unsupported(_) => ErrorCode::Unsupported,
            Self::Database(_) | Self::Storage(_) | Self::Config(_) => ErrorCode::Internal,
        }
    }

    /// Human-readable detail without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::TemplateInstallFailure(d)
            | Self::TemplateCopyFailure(d)
            | Self::Backend(d)
            | Self::NotFound(d)
            | Self::InvalidArgument(d)
            | Self::Unsupported(d)
            | Self::Database(d)
            | Self::Storage(d)
            | Self::Config(d) => d.clone(),
            other => other.to_string(),
        }
    }
}

/// Failure code surfaced to callers, whichever channel the failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidTransition,
    DataStoreNotFound,
    VolumeAlreadyExists,
    TemplateInstallFailure,
    TemplateCopyFailure,
    BackendFailure,
    NotFound,
    InvalidRequest,
    Unsupported,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidTransition => "invalid_transition",
            Self::DataStoreNotFound => "data_store_not_found",
            Self::VolumeAlreadyExists => "volume_already_exists",
            Self::TemplateInstallFailure => "template_install_failure",
            Self::TemplateCopyFailure => "template_copy_failure",
            Self::BackendFailure => "backend_failure",
            Self::NotFound => "not_found",
            Self::InvalidRequest => "invalid_request",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// One failure code plus a free-text detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub code: ErrorCode,
    pub detail: String,
}

impl Failure {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.detail)
    }
}

impl From<&VolumeflowError> for Failure {
    fn from(err: &VolumeflowError) -> Self {
        Self::new(err.code(), err.detail())
    }
}

impl From<VolumeflowError> for Failure {
    fn from(err: VolumeflowError) -> Self {
        Self::from(&err)
    }
}
