//! Registry errors.

use auxo_types::AuxoError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to walk {}: {reason}", path.display())]
    Walk { path: PathBuf, reason: String },
    #[error("Manifest parse error in {}: {reason}", path.display())]
    ManifestParse { path: PathBuf, reason: String },
    #[error("Failed to export registry to {}: {reason}", path.display())]
    Export { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RegistryError> for AuxoError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::ManifestParse { path, reason } => AuxoError::ManifestParse { path, reason },
            RegistryError::Io(io) => AuxoError::Io(io),
            other => AuxoError::Io(std::io::Error::other(other.to_string())),
        }
    }
}
