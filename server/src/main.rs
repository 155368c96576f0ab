//! Demo server: registers the sample Models, rebuilds the schema and serves the REST API.
//!
//! Run from repo root: `cargo run -p tablekit-server`

mod models;

use models::{TestModel, UserModel};
use std::sync::Arc;
use tablekit::{app, AppConfig, AppState, CrudEngine, Database, ModelRegistry, Record, SchemaBuilder};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let default_filter = if config.debug {
        "tablekit=debug,tablekit_server=debug"
    } else {
        "tablekit=info,tablekit_server=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
    tracing::info!(env = config.env.as_str(), database = %config.database.database, "starting");

    let db = Database::connect(&config.database).await?;

    let mut registry = ModelRegistry::new();
    let test_model = registry.register::<TestModel>()?;
    registry.register::<UserModel>()?;
    let registry = Arc::new(registry);

    SchemaBuilder::new(db.clone()).build_all(&registry).await?;

    let docs = tablekit::docs::openapi(&registry, "Quick Start API", env!("CARGO_PKG_VERSION"));
    let engine = CrudEngine::new(db, Arc::clone(&registry));

    let seed = Record::load(test_model, &serde_json::json!({ "name": "test" }))?;
    let seeded = engine.create(&seed).await?;
    tracing::info!(row = %seeded.dump(), "seeded test row");

    let router = app(AppState::new(engine, docs));
    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
