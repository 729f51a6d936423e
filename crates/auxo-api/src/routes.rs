//! `/v1` routes.

use crate::control_plane::ControlPlane;
use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the façade router over `control`.
pub fn build_router(control: Arc<ControlPlane>) -> Router {
    Router::new()
        .route("/v1", get(ping))
        .route("/v1/", get(ping))
        .route("/v1/olympus/agents/num", get(number_of_agents))
        .route("/v1/oracle/services/{name}", get(service_exists))
        .layer(TraceLayer::new_for_http())
        .with_state(control)
}

/// GET /v1/
pub async fn ping() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "pong" }))
}

/// GET /v1/olympus/agents/num
pub async fn number_of_agents(
    State(control): State<Arc<ControlPlane>>,
) -> Result<Json<i32>, ApiError> {
    let number = control.number_of_agents().await.map_err(ApiError::fleet)?;
    Ok(Json(number))
}

/// GET /v1/oracle/services/{name}
pub async fn service_exists(
    State(control): State<Arc<ControlPlane>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let exists = control
        .service_exists(&name)
        .await
        .map_err(ApiError::oracle)?;
    Ok(Json(serde_json::json!({ "exists": exists })))
}
