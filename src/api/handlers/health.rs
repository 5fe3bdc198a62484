use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub toolchain: String,
    pub version: String,
    pub max_file_size: u64,
    pub max_request_size: u64,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let toolchain_status = if state.extractor.health_check().await {
        "available"
    } else {
        "missing"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        toolchain: toolchain_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        max_file_size: state.config.budget.max_file_size,
        max_request_size: state.config.budget.max_request_size,
    })
}
