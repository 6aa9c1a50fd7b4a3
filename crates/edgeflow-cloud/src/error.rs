//! Edge deploy error types

use crate::client::ResourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Edge deploy errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Cache setting not found: {0}")]
    CacheSettingNotFound(String),

    #[error("Origin not found: {0}")]
    OriginNotFound(String),

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("API error ({kind}): {message}")]
    Api { kind: ResourceKind, message: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("State file not found: {}", .0.display())]
    StateNotFound(PathBuf),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Upload failed for {}: {message}", .path.display())]
    Upload { path: PathBuf, message: String },

    #[error("Purge failed: {0}")]
    Purge(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl CloudError {
    /// Build an API error for a backend rejection
    pub fn api(kind: ResourceKind, message: impl Into<String>) -> Self {
        CloudError::Api {
            kind,
            message: message.into(),
        }
    }

    /// Whether this error is an unresolved name reference in the manifest
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            CloudError::CacheSettingNotFound(_)
                | CloudError::OriginNotFound(_)
                | CloudError::FunctionNotFound(_)
        )
    }

    /// Whether the backend reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::ResourceNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
