//! Common routes: health, version, API document.

use crate::response::{message, Message};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use utoipa::openapi::OpenApi;

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Message>) {
    if state.engine.health_check().await {
        message(StatusCode::OK, "Database is connected")
    } else {
        message(StatusCode::BAD_REQUEST, "Database is not connected")
    }
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn doc(State(state): State<AppState>) -> Json<OpenApi> {
    Json(state.docs.as_ref().clone())
}

/// GET /health (database round trip) and GET /version.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .with_state(state)
}

/// GET /doc/swagger: the OpenAPI document as JSON.
pub fn doc_routes(state: AppState) -> Router {
    Router::new().route("/doc/swagger", get(doc)).with_state(state)
}
