//! CRUD engine: parameterized INSERT / SELECT over registered Models,
//! with recursive relationship resolution.

use crate::connection::Database;
use crate::error::{AppError, ConfigError};
use crate::model::{ModelDef, ModelRegistry, Record};
use crate::sql::{codec, insert, select_all, select_by_column, QueryBuf, PRIMARY_KEY_QUERY};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgConnection, Postgres};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>;

#[derive(Clone)]
pub struct CrudEngine {
    db: Database,
    registry: Arc<ModelRegistry>,
}

impl CrudEngine {
    pub fn new(db: Database, registry: Arc<ModelRegistry>) -> Self {
        CrudEngine { db, registry }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Registered Model for `table`, or NotFound.
    pub fn model(&self, table: &str) -> Result<Arc<ModelDef>, AppError> {
        self.registry
            .get(table)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("model '{}'", table)))
    }

    pub async fn health_check(&self) -> bool {
        self.db.health_check().await
    }

    /// Insert one row and return it as stored. Identifiers and values are checked before the
    /// transaction opens; any failure after that rolls the row back.
    pub async fn create(&self, record: &Record) -> Result<Record, AppError> {
        let model = Arc::clone(record.model());
        let table = model.table().to_string();
        let q = insert(self.db.schema(), record).map_err(|e| {
            tracing::warn!(table = %table, error = %e, "rejected before insert");
            e
        })?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let result = self
            .db
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let row = prepared(&q).fetch_one(&mut *conn).await?;
                    decode_row(&model, &row)
                })
            })
            .await;
        match &result {
            Ok(_) => tracing::info!(table = %table, "row created"),
            Err(e) => tracing::error!(table = %table, error = %e, "create failed, rolled back"),
        }
        result
    }

    /// Primary-key column of `model`, read from the catalog.
    pub async fn fetch_primary_key(&self, model: &ModelDef) -> Result<String, AppError> {
        let schema = self.db.schema().to_string();
        let table = model.table().to_string();
        self.db
            .with_transaction(move |conn| Box::pin(async move { primary_key(conn, &schema, &table).await }))
            .await
    }

    /// One row by primary key with relationships resolved. NotFound when no row matches.
    pub async fn fetch_one(&self, model: &Arc<ModelDef>, key: &Value) -> Result<Record, AppError> {
        let registry = Arc::clone(&self.registry);
        let schema = self.db.schema().to_string();
        let model = Arc::clone(model);
        let key = key.clone();
        self.db
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let pk = primary_key(&mut *conn, &schema, model.table()).await?;
                    let mut path = Vec::new();
                    fetch_by(conn, &registry, &schema, model, pk, key, &mut path).await
                })
            })
            .await
    }

    /// Every row, ordered by primary key, relationships resolved. A failed read logs and yields
    /// an empty list.
    pub async fn fetch_all(&self, model: &Arc<ModelDef>) -> Vec<Record> {
        match self.try_fetch_all(model).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(table = %model.table(), error = %e, "fetch_all failed, returning no rows");
                Vec::new()
            }
        }
    }

    async fn try_fetch_all(&self, model: &Arc<ModelDef>) -> Result<Vec<Record>, AppError> {
        let registry = Arc::clone(&self.registry);
        let schema = self.db.schema().to_string();
        let model = Arc::clone(model);
        self.db
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let order_by = match primary_key(&mut *conn, &schema, model.table()).await {
                        Ok(pk) => Some(pk),
                        Err(AppError::NotFound(_)) => None,
                        Err(e) => return Err(e),
                    };
                    let q = select_all(&schema, &model, order_by.as_deref())?;
                    tracing::debug!(sql = %q.sql, "query");
                    let rows = prepared(&q).fetch_all(&mut *conn).await?;
                    let mut records = Vec::with_capacity(rows.len());
                    for row in &rows {
                        let mut record = decode_row(&model, row)?;
                        let mut path = Vec::new();
                        resolve_relationships(&mut *conn, &registry, &schema, &mut record, &mut path).await?;
                        records.push(record);
                    }
                    Ok::<_, AppError>(records)
                })
            })
            .await
    }
}

fn prepared(q: &QueryBuf) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

/// Stored fields are decoded positionally, in declaration order.
fn decode_row(model: &Arc<ModelDef>, row: &PgRow) -> Result<Record, AppError> {
    let mut record = Record::new(Arc::clone(model));
    for (i, (name, d)) in model.stored_fields().enumerate() {
        record.set(name, codec::decode(d.kind(), row, i)?)?;
    }
    Ok(record)
}

async fn primary_key(conn: &mut PgConnection, schema: &str, table: &str) -> Result<String, AppError> {
    sqlx::query_scalar::<_, String>(PRIMARY_KEY_QUERY)
        .bind(table)
        .bind(schema)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("primary key of '{}'", table)))
}

fn fetch_by<'a>(
    conn: &'a mut PgConnection,
    registry: &'a ModelRegistry,
    schema: &'a str,
    model: Arc<ModelDef>,
    column: String,
    key: Value,
    path: &'a mut Vec<String>,
) -> BoxFuture<'a, Record> {
    Box::pin(async move {
        let q = select_by_column(schema, &model, &column, &key)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = prepared(&q)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} with {} = {}", model.table(), column, key)))?;
        let mut record = decode_row(&model, &row)?;
        resolve_relationships(conn, registry, schema, &mut record, path).await?;
        Ok(record)
    })
}

/// Replaces each relationship field with the related row, following the local foreign key.
/// `path` holds the tables being resolved; meeting one again is a cycle.
fn resolve_relationships<'a>(
    conn: &'a mut PgConnection,
    registry: &'a ModelRegistry,
    schema: &'a str,
    record: &'a mut Record,
    path: &'a mut Vec<String>,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let model = Arc::clone(record.model());
        if model.relationship_fields().next().is_none() {
            return Ok(());
        }
        if path.iter().any(|t| t == model.table()) {
            let mut cycle = path.clone();
            cycle.push(model.table().to_string());
            return Err(ConfigError::RelationshipCycle(cycle.join(" -> ")).into());
        }
        path.push(model.table().to_string());
        for (name, rel) in model.relationship_fields() {
            let related = Arc::clone(registry.related_model(&model, rel)?);
            let join_field = rel.join_field().unwrap_or_default();
            let join_value = record.get(join_field).cloned().unwrap_or(Value::Null);
            let resolved = if join_value.is_null() {
                Value::Null
            } else {
                let target_column = model
                    .field(join_field)
                    .and_then(|d| d.references())
                    .map(|r| r.column.clone())
                    .unwrap_or_default();
                fetch_by(&mut *conn, registry, schema, related, target_column, join_value, &mut *path)
                    .await?
                    .dump()
            };
            record.set(name, resolved)?;
        }
        path.pop();
        Ok(())
    })
}
