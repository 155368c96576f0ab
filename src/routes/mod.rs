mod common;
mod entity;

pub use common::{common_routes, doc_routes};
pub use entity::entity_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Every route: health, version, API document and Model CRUD.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(doc_routes(state.clone()))
        .merge(entity_routes(state))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbConfig, IsolationLevel};
    use crate::connection::Database;
    use crate::model::{ColumnOptions, FieldDescriptor, ModelDef, ModelRegistry};
    use crate::service::CrudEngine;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn offline_state() -> AppState {
        let cfg = DbConfig {
            host: "127.0.0.1".into(),
            port: 1,
            user: "nobody".into(),
            password: "nothing".into(),
            database: "none".into(),
            schema: "public".into(),
            max_connections: 1,
            acquire_timeout: Duration::from_millis(200),
            statement_timeout: Duration::from_secs(1),
            isolation: IsolationLevel::ReadCommitted,
        };
        let mut registry = ModelRegistry::new();
        registry
            .register_def(
                ModelDef::new(
                    "TestModel",
                    vec![
                        ("id_test", FieldDescriptor::uuid(ColumnOptions::new().primary_key())),
                        ("name", FieldDescriptor::string(255, ColumnOptions::new())),
                    ],
                )
                .unwrap(),
            )
            .unwrap();
        let docs = crate::docs::openapi(&registry, "tablekit", "0.1.0");
        let engine = CrudEngine::new(Database::connect_lazy(&cfg).unwrap(), Arc::new(registry));
        AppState::new(engine, docs)
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_disconnected_database() {
        let resp = app(offline_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["msg"], "Database is not connected");
    }

    #[tokio::test]
    async fn unknown_model_is_not_found() {
        let resp = app(offline_state())
            .oneshot(Request::get("/nothing_here").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn unknown_field_in_body_is_rejected() {
        let req = Request::post("/test")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"nickname":"t1"}"#))
            .unwrap();
        let resp = app(offline_state()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_degrades_to_empty_when_database_is_down() {
        let resp = app(offline_state())
            .oneshot(Request::get("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"], serde_json::json!([]));
        assert_eq!(body["meta"]["count"], 0);
    }

    #[tokio::test]
    async fn doc_lists_model_schemas() {
        let resp = app(offline_state())
            .oneshot(Request::get("/doc/swagger").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["components"]["schemas"]["test"]["properties"]["id_test"]["format"], "uuid");
    }
}
