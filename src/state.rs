//! Shared application state for all routes.

use crate::service::CrudEngine;
use std::sync::Arc;
use utoipa::openapi::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CrudEngine>,
    /// Built once from the registry at startup.
    pub docs: Arc<OpenApi>,
}

impl AppState {
    pub fn new(engine: CrudEngine, docs: OpenApi) -> Self {
        AppState {
            engine: Arc::new(engine),
            docs: Arc::new(docs),
        }
    }
}
