//! Control-plane RPC errors.

use auxo_types::AuxoError;
use auxo_wire::WireError;
use thiserror::Error;

pub const CODE_INVALID_PARAMS: u16 = 400;
pub const CODE_METHOD_NOT_FOUND: u16 = 404;
pub const CODE_INTERNAL: u16 = 500;
pub const CODE_UNAVAILABLE: u16 = 503;
pub const CODE_DEADLINE_EXCEEDED: u16 = 504;

/// Errors from a control-plane call, on either side of the connection.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Deadline exceeded calling {0}")]
    DeadlineExceeded(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Remote error {code}: {message}")]
    Remote { code: u16, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl RpcError {
    /// Status code carried on the wire.
    pub fn code(&self) -> u16 {
        match self {
            Self::DeadlineExceeded(_) => CODE_DEADLINE_EXCEEDED,
            Self::Unavailable(_) => CODE_UNAVAILABLE,
            Self::MethodNotFound(_) => CODE_METHOD_NOT_FOUND,
            Self::InvalidParams(_) => CODE_INVALID_PARAMS,
            Self::Remote { code, .. } => *code,
            Self::Io(_) | Self::Codec(_) => CODE_INTERNAL,
        }
    }

    /// Inverse of [`RpcError::code`] for errors received from a server.
    pub fn from_code(code: u16, message: String) -> Self {
        match code {
            CODE_DEADLINE_EXCEEDED => Self::DeadlineExceeded(message),
            CODE_UNAVAILABLE => Self::Unavailable(message),
            CODE_METHOD_NOT_FOUND => Self::MethodNotFound(message),
            CODE_INVALID_PARAMS => Self::InvalidParams(message),
            code => Self::Remote { code, message },
        }
    }

    /// Message sent to the caller (the variant detail without its prefix).
    pub fn remote_message(&self) -> String {
        match self {
            Self::DeadlineExceeded(m)
            | Self::Unavailable(m)
            | Self::MethodNotFound(m)
            | Self::InvalidParams(m) => m.clone(),
            Self::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded(_))
    }
}

impl From<WireError> for RpcError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Io(io) => Self::Io(io),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<RpcError> for AuxoError {
    fn from(e: RpcError) -> Self {
        AuxoError::Rpc(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        let errors = vec![
            RpcError::DeadlineExceeded("m".to_string()),
            RpcError::Unavailable("m".to_string()),
            RpcError::MethodNotFound("m".to_string()),
            RpcError::InvalidParams("m".to_string()),
        ];
        for err in errors {
            let back = RpcError::from_code(err.code(), err.remote_message());
            assert_eq!(back.code(), err.code());
            assert_eq!(back.to_string(), err.to_string());
        }
    }

    #[test]
    fn test_unknown_code_is_remote() {
        match RpcError::from_code(418, "teapot".to_string()) {
            RpcError::Remote { code, message } => {
                assert_eq!(code, 418);
                assert_eq!(message, "teapot");
            }
            other => panic!("Expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn test_closed_connection_is_unavailable() {
        let err: RpcError = WireError::ConnectionClosed.into();
        assert!(matches!(err, RpcError::Unavailable(_)));
    }
}
