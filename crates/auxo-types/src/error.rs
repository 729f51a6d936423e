//! Shared error taxonomy for the Auxo system.
//!
//! Each crate has its own error enum; all of them convert into [`AuxoError`]
//! so process entry points can report one clearly attributed failure.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Auxo processes.
#[derive(Error, Debug)]
pub enum AuxoError {
    /// An endpoint could not be bound or connected.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A wire payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A service manifest could not be parsed.
    #[error("Manifest parse error in {}: {reason}", path.display())]
    ManifestParse {
        /// The offending manifest file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A control-plane call failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// A background task ended abnormally.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Filesystem or socket failure outside the categories above.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for results carrying an [`AuxoError`].
pub type AuxoResult<T> = Result<T, AuxoError>;
