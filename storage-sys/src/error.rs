// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

/// Error types for settings store operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path:?}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid store name: {0}")]
    InvalidName(String),
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
