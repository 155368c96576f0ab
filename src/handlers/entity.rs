//! Model CRUD handlers: create, list, read. The path segment is the table name.

use crate::error::AppError;
use crate::model::Record;
use crate::response::{created, success_many, success_one};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::Value;

pub async fn create(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let model = state.engine.model(&table)?;
    let record = Record::load(model, &body)?;
    let stored = state.engine.create(&record).await?;
    Ok(created(stored.dump()))
}

pub async fn list(State(state): State<AppState>, Path(table): Path<String>) -> Result<impl IntoResponse, AppError> {
    let model = state.engine.model(&table)?;
    let rows: Vec<Value> = state.engine.fetch_all(&model).await.iter().map(Record::dump).collect();
    Ok(success_many(rows))
}

/// The id is passed as text; the codec converts it for the primary-key column.
pub async fn read(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let model = state.engine.model(&table)?;
    let record = state.engine.fetch_one(&model, &Value::String(id)).await?;
    Ok(success_one(record.dump()))
}
