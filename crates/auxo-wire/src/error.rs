//! Errors from the wire layer.

use crate::codec::{DecodeError, EncodeError};
use crate::transport::Identity;
use auxo_types::AuxoError;
use std::fmt;
use thiserror::Error;

/// Errors from the wire protocol layer.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("{0} endpoint is not bound")]
    NotBound(&'static str),
    #[error("No connection with identity {0}")]
    UnknownIdentity(Identity),
}

/// One endpoint that could not be set up.
#[derive(Debug)]
pub struct EndpointFailure {
    /// Which endpoint (e.g. "remote", "local").
    pub role: &'static str,
    /// The address that was attempted.
    pub endpoint: String,
    /// What went wrong.
    pub error: Box<WireError>,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} endpoint {}: {}", self.role, self.endpoint, self.error)
    }
}

/// Every endpoint failure from one setup attempt.
///
/// Setup does not stop at the first broken endpoint, so operators see all of
/// them at once.
#[derive(Debug, Error)]
#[error("failed to set up {count} endpoint(s): {details}", count = .failures.len(), details = describe(.failures))]
pub struct BindError {
    pub failures: Vec<EndpointFailure>,
}

impl BindError {
    /// `Ok(())` when nothing failed.
    pub fn into_result(failures: Vec<EndpointFailure>) -> Result<(), WireError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(WireError::Bind(BindError { failures }))
        }
    }

    /// Roles of the failed endpoints.
    pub fn roles(&self) -> Vec<&'static str> {
        self.failures.iter().map(|f| f.role).collect()
    }
}

fn describe(failures: &[EndpointFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<WireError> for AuxoError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Configuration(msg) => AuxoError::Config(msg),
            WireError::InvalidEndpoint { .. } => AuxoError::Config(e.to_string()),
            other => AuxoError::Connection(other.to_string()),
        }
    }
}

impl From<DecodeError> for AuxoError {
    fn from(e: DecodeError) -> Self {
        AuxoError::Decode(e.to_string())
    }
}
