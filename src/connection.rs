//! Connection manager: bounded pool, health check and scoped transactions.

use crate::config::{DbConfig, IsolationLevel};
use crate::error::AppError;
use crate::sql::quoted;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgConnection, PgPool};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Future returned by a transaction body. Borrows the connection for `'c`.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'c>>;

#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
    schema: String,
    statement_timeout: Duration,
    isolation: IsolationLevel,
}

fn connect_options(cfg: &DbConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.database)
}

fn pool_options(cfg: &DbConfig) -> PgPoolOptions {
    // test_before_acquire drops dead connections, so a restarted server is picked up again.
    PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout)
        .test_before_acquire(true)
}

impl Database {
    /// Opens the pool and verifies it with `SELECT 1`. Failure is fatal to the caller.
    pub async fn connect(cfg: &DbConfig) -> Result<Self, AppError> {
        quoted(&cfg.schema)?;
        let pool = pool_options(cfg)
            .connect_with(connect_options(cfg))
            .await
            .map_err(|e| {
                tracing::error!(database = %cfg.database, error = %e, "could not connect to database");
                AppError::Connection(e)
            })?;
        sqlx::query("SELECT 1").execute(&pool).await.map_err(AppError::Connection)?;
        tracing::info!(database = %cfg.database, host = %cfg.host, "connected to database");
        Ok(Self::from_pool(pool, cfg))
    }

    /// Pool that connects on first use. Nothing is checked until then.
    pub fn connect_lazy(cfg: &DbConfig) -> Result<Self, AppError> {
        quoted(&cfg.schema)?;
        let pool = pool_options(cfg).connect_lazy_with(connect_options(cfg));
        Ok(Self::from_pool(pool, cfg))
    }

    fn from_pool(pool: PgPool, cfg: &DbConfig) -> Self {
        Database {
            pool,
            schema: cfg.schema.clone(),
            statement_timeout: cfg.statement_timeout,
            isolation: cfg.isolation,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Schema every table lives in.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// `SELECT 1` round trip. Never fails; the outcome is logged.
    pub async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => {
                tracing::info!("database is connected");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "database is not connected");
                false
            }
        }
    }

    /// Runs `f` inside one transaction with the default deadline.
    pub async fn with_transaction<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> TxFuture<'c, T> + Send,
    {
        self.with_transaction_timeout(self.statement_timeout, f).await
    }

    /// Commits when `f` succeeds, rolls back when it fails. Exceeding `timeout` drops the
    /// transaction, which rolls it back, and yields [`AppError::Timeout`].
    pub async fn with_transaction_timeout<T, F>(&self, timeout: Duration, f: F) -> Result<T, AppError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> TxFuture<'c, T> + Send,
    {
        let work = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(&format!("SET TRANSACTION ISOLATION LEVEL {}", self.isolation.as_sql()))
                .execute(&mut *tx)
                .await?;
            match f(&mut *tx).await {
                Ok(v) => {
                    tx.commit().await?;
                    Ok(v)
                }
                Err(e) => {
                    if let Err(rb) = tx.rollback().await {
                        tracing::warn!(error = %rb, "rollback failed");
                    }
                    Err(e)
                }
            }
        };
        match tokio::time::timeout(timeout, work).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "transaction deadline exceeded");
                Err(AppError::Timeout(timeout))
            }
        }
    }

    /// Drops and recreates the schema, removing every table in it.
    pub async fn reset_schema(&self) -> Result<(), AppError> {
        let schema = quoted(&self.schema)?;
        self.with_transaction(move |conn| {
            Box::pin(async move {
                sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
                    .execute(&mut *conn)
                    .await?;
                sqlx::query(&format!("CREATE SCHEMA {}", schema)).execute(&mut *conn).await?;
                Ok::<_, AppError>(())
            })
        })
        .await?;
        tracing::info!(schema = %self.schema, "schema reset");
        Ok(())
    }
}
