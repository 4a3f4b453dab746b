use axum::Json;
use serde::{Deserialize, Serialize};

/// Health check response body
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Health check handler
///
/// `GET /` returns `{"status":"OK"}`.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
