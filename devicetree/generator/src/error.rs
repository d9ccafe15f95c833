// Licensed under the Apache-2.0 license

use std::path::PathBuf;

use sapphire_dt_header::HeaderError;
use thiserror::Error;

/// Errors that can occur while building or rendering a device tree.
#[derive(Error, Debug)]
pub enum GenError {
    /// The SoC header is missing a value the tree cannot do without.
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// An override names a node that is not in the tree.
    #[error("override target '{key}' not found in the node tree")]
    UnknownTarget { key: String },

    /// An append names a node that is not a `chosen` or `aliases` node.
    #[error("append target '{key}' is not a chosen or aliases node")]
    InvalidAppendTarget { key: String },

    #[error("malformed user configuration {path}: {reason}")]
    MalformedUserConfig { path: String, reason: String },

    #[error("invalid driver database: {0}")]
    DriverDatabase(String),

    #[error("{board} development kit is not supported")]
    UnsupportedBoard { board: String },

    /// A user-supplied property has the wrong shape for its key.
    #[error("invalid value for property '{key}': {reason}")]
    InvalidProperty { key: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for device tree generation.
pub type Result<T> = std::result::Result<T, GenError>;
