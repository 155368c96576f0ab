//! Schema builder: DDL for every registered Model.
//! Tables first, then foreign-key constraints, so declaration order never matters.

use crate::connection::Database;
use crate::error::AppError;
use crate::model::ModelRegistry;
use crate::sql::{create_table, foreign_key_constraints, quoted, ForeignKeyStatement, CONSTRAINT_EXISTS_QUERY};

/// Statements for one build, in execution order.
#[derive(Debug)]
pub struct SchemaPlan {
    pub tables: Vec<(String, String)>,
    pub foreign_keys: Vec<ForeignKeyStatement>,
}

impl SchemaPlan {
    pub fn for_registry(schema: &str, registry: &ModelRegistry) -> Result<Self, AppError> {
        let mut tables = Vec::new();
        let mut foreign_keys = Vec::new();
        for model in registry.all_models() {
            tables.push((model.table().to_string(), create_table(schema, model)?));
            foreign_keys.extend(foreign_key_constraints(schema, model)?);
        }
        Ok(SchemaPlan { tables, foreign_keys })
    }
}

pub struct SchemaBuilder {
    db: Database,
}

impl SchemaBuilder {
    pub fn new(db: Database) -> Self {
        SchemaBuilder { db }
    }

    /// Validate the registry, wipe the schema, then create every table and constraint.
    pub async fn build_all(&self, registry: &ModelRegistry) -> Result<(), AppError> {
        registry.validate()?;
        self.db.reset_schema().await?;
        self.apply(registry).await
    }

    /// Create whatever is missing without dropping anything. Safe to run repeatedly:
    /// tables use `IF NOT EXISTS` and constraints are skipped when their name is taken.
    pub async fn apply(&self, registry: &ModelRegistry) -> Result<(), AppError> {
        registry.validate()?;
        let schema = self.db.schema().to_string();
        let plan = SchemaPlan::for_registry(&schema, registry)?;
        let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(&schema)?);

        self.db
            .with_transaction(move |conn| {
                Box::pin(async move {
                    sqlx::query(&create_schema).execute(&mut *conn).await?;
                    for (table, sql) in &plan.tables {
                        tracing::debug!(sql = %sql, "ddl");
                        sqlx::query(sql).execute(&mut *conn).await?;
                        tracing::info!(table = %table, "table created");
                    }
                    for fk in &plan.foreign_keys {
                        let exists: bool = sqlx::query_scalar(CONSTRAINT_EXISTS_QUERY)
                            .bind(&fk.name)
                            .bind(&schema)
                            .fetch_one(&mut *conn)
                            .await?;
                        if exists {
                            tracing::debug!(constraint = %fk.name, "constraint already present");
                            continue;
                        }
                        tracing::debug!(sql = %fk.sql, "ddl");
                        sqlx::query(&fk.sql).execute(&mut *conn).await?;
                        tracing::info!(constraint = %fk.name, "foreign key added");
                    }
                    Ok::<_, AppError>(())
                })
            })
            .await
    }
}
