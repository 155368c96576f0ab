//! tablekit: declarative Models over PostgreSQL with generated DDL, parameterized CRUD
//! and foreign-key relationship resolution, plus a small REST surface.

pub mod case;
pub mod config;
pub mod connection;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use config::{AppConfig, DbConfig, Environment, IsolationLevel};
pub use connection::{Database, TxFuture};
pub use error::{AppError, ConfigError};
pub use migration::{SchemaBuilder, SchemaPlan};
pub use model::{ColumnOptions, FieldDescriptor, FieldKind, Model, ModelDef, ModelRegistry, Record};
pub use routes::{app, common_routes, doc_routes, entity_routes};
pub use service::CrudEngine;
pub use state::AppState;
