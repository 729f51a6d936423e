//! HTTP rendering of forwarded RPC failures.

use auxo_rpc::RpcError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{upstream} call failed: {source}")]
    Upstream {
        upstream: &'static str,
        #[source]
        source: RpcError,
    },
}

impl ApiError {
    pub fn fleet(source: RpcError) -> Self {
        Self::Upstream {
            upstream: "olympus",
            source,
        }
    }

    pub fn oracle(source: RpcError) -> Self {
        Self::Upstream {
            upstream: "oracle",
            source,
        }
    }

    /// 504 when the upstream deadline ran out, 502 for anything else.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upstream { source, .. } if source.is_deadline_exceeded() => {
                StatusCode::GATEWAY_TIMEOUT
            }
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let Self::Upstream { upstream, source } = &self;
        tracing::warn!(upstream, error = %source, status = status.as_u16(), "Upstream call failed");
        (
            status,
            Json(serde_json::json!({
                "error": {
                    "message": self.to_string(),
                    "upstream": upstream,
                    "code": source.code(),
                }
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let timeout = ApiError::fleet(RpcError::DeadlineExceeded("x".to_string()));
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let down = ApiError::oracle(RpcError::Unavailable("refused".to_string()));
        assert_eq!(down.status(), StatusCode::BAD_GATEWAY);

        let remote = ApiError::oracle(RpcError::Remote {
            code: 500,
            message: "boom".to_string(),
        });
        assert_eq!(remote.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_message_names_upstream() {
        let err = ApiError::fleet(RpcError::Unavailable("refused".to_string()));
        assert!(err.to_string().starts_with("olympus call failed"));
    }
}
