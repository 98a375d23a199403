use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub fib_environment: String,
    pub fib_configured: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = &state.config;

    let fib_configured = !config.fib.client_id.is_empty()
        && !config.fib.client_secret.is_empty()
        && !config.fib.callback_url.is_empty();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: config.server.environment.clone(),
        fib_environment: config.fib.environment.to_string(),
        fib_configured,
    })
}
