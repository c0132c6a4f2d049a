// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{StorageError, StorageErrorKind};
use storage_sys::SysError;
use thiserror::Error;

/// Service-specific errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict { property: String, message: String },

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Settings store error: {0}")]
    Io(#[from] SysError),

    #[error("No RAID level satisfies the goal: {0}")]
    NoMatch(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    pub fn kind(&self) -> StorageErrorKind {
        match self {
            ServiceError::NotFound(_) => StorageErrorKind::NotFound,
            ServiceError::Conflict { .. } => StorageErrorKind::Conflict,
            ServiceError::Unsupported(_) => StorageErrorKind::Unsupported,
            ServiceError::Io(_) => StorageErrorKind::IoFailure,
            ServiceError::NoMatch(_) => StorageErrorKind::NoMatch,
            ServiceError::ResourceExhausted(_) => StorageErrorKind::ResourceExhausted,
            ServiceError::InvalidArgument(_) => StorageErrorKind::InvalidInput,
            ServiceError::Config(_) => StorageErrorKind::Internal,
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(SysError::Io(err))
    }
}

impl From<ServiceError> for StorageError {
    fn from(err: ServiceError) -> Self {
        let kind = err.kind();
        match err {
            ServiceError::Conflict { property, message } => {
                StorageError::new(kind, message).with_property(property)
            }
            other => StorageError::new(kind, other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
