//! Control-plane RPC messages.
//!
//! Every call is one JSON [`RpcRequest`] answered by one JSON [`RpcResponse`]
//! carrying the same `id`, both framed with the 4-byte length prefix used on
//! every Auxo stream.

use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fleet-state query served by the broker.
pub const GET_NUMBER_OF_AGENTS: &str = "HestiaFrontendService.GetNumberOfAgents";

/// Registry lookup served by the oracle.
pub const CHECK_SERVICE_EXISTS: &str = "OracleBackendService.CheckServiceExists";

/// A call to a named method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Correlates the response with this request.
    pub id: String,
    /// `Service.Method`.
    pub method: String,
    /// Time the caller is willing to wait. Zero means the server default.
    #[serde(default)]
    pub deadline_ms: u64,
    #[serde(default)]
    pub params: Value,
}

/// The answer to one [`RpcRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    pub status: RpcStatus,
}

/// Outcome of a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcStatus {
    Ok { result: Value },
    Error { code: u16, message: String },
}

impl RpcResponse {
    pub fn from_result(id: String, result: Result<Value, RpcError>) -> Self {
        let status = match result {
            Ok(result) => RpcStatus::Ok { result },
            Err(e) => RpcStatus::Error {
                code: e.code(),
                message: e.remote_message(),
            },
        };
        Self { id, status }
    }

    /// Turn the status back into a `Result`, rebuilding typed errors from codes.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.status {
            RpcStatus::Ok { result } => Ok(result),
            RpcStatus::Error { code, message } => Err(RpcError::from_code(code, message)),
        }
    }
}

/// `HestiaFrontendService.GetNumberOfAgents` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNumberOfAgentsRequest {}

/// `HestiaFrontendService.GetNumberOfAgents` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNumberOfAgentsResponse {
    pub number: i32,
}

/// `OracleBackendService.CheckServiceExists` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckServiceExistsRequest {
    pub service_name: String,
}

/// `OracleBackendService.CheckServiceExists` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckServiceExistsResponse {
    pub exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = RpcRequest {
            id: "r-1".to_string(),
            method: CHECK_SERVICE_EXISTS.to_string(),
            deadline_ms: 10_000,
            params: json!({ "service_name": "alpha" }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["method"], "OracleBackendService.CheckServiceExists");
        assert_eq!(value["params"]["service_name"], "alpha");
    }

    #[test]
    fn test_request_defaults() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"id":"x","method":"A.B"}"#).unwrap();
        assert_eq!(request.deadline_ms, 0);
        assert!(request.params.is_null());
    }

    #[test]
    fn test_response_status_shapes() {
        let ok = RpcResponse::from_result("1".to_string(), Ok(json!({ "number": 3 })));
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["status"]["ok"]["result"]["number"], 3);

        let err = RpcResponse::from_result(
            "2".to_string(),
            Err(RpcError::MethodNotFound("A.B".to_string())),
        );
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["status"]["error"]["code"], 404);
    }

    #[test]
    fn test_error_kind_survives_the_wire() {
        let response = RpcResponse::from_result(
            "3".to_string(),
            Err(RpcError::DeadlineExceeded("A.B".to_string())),
        );
        let text = serde_json::to_string(&response).unwrap();
        let back: RpcResponse = serde_json::from_str(&text).unwrap();
        assert!(matches!(
            back.into_result(),
            Err(RpcError::DeadlineExceeded(m)) if m == "A.B"
        ));
    }
}
