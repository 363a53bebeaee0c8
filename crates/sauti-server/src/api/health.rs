use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub device: String,
    pub model_id: String,
    pub model_loaded: bool,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        device: state.engine.device().to_string(),
        model_id: state.engine.model_id().to_string(),
        model_loaded: state.engine.is_loaded(),
    })
}
