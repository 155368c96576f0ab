//! Model CRUD routes. Handlers resolve the Model from the path segment.

use crate::handlers::entity::{create, list, read};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:table", get(list).post(create))
        .route("/:table/:id", get(read))
        .with_state(state)
}
