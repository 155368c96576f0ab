//! Process configuration from environment variables (and `.env` when present).

use crate::error::ConfigError;
use crate::sql::codec::parse_bool;
use crate::sql::validate_identifier;
use std::time::Duration;

const REQUIRED: &[(&str, &str)] = &[
    ("DB_IP", "Address of the database"),
    ("DB_PORT", "Port of the database"),
    ("DB_USER", "Name of the database user"),
    ("DB_PASS", "Password of the database user"),
    ("DB_NAME", "Name of the database"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Test,
    Dev,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Test => "test",
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

/// Isolation level set at the start of every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub schema: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub statement_timeout: Duration,
    pub isolation: IsolationLevel,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub debug: bool,
    pub database: DbConfig,
    pub bind_addr: String,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads every variable through `get`. All missing required variables are reported at once.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| get(name).filter(|v| !v.trim().is_empty());

        let missing: Vec<_> = REQUIRED.iter().copied().filter(|(name, _)| get(*name).is_none()).collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables(missing));
        }
        let required = |name: &'static str| get(name).unwrap_or_default();

        let env = match get("ENV").as_deref() {
            None | Some("dev") => Environment::Dev,
            Some("test") => Environment::Test,
            Some("prod") => Environment::Prod,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "ENV",
                    value: format!("{} (expected test, dev or prod)", other),
                })
            }
        };
        if let Some(v) = get("DEBUG") {
            parse_bool(&v).ok_or(ConfigError::InvalidValue { name: "DEBUG", value: v })?;
        }
        // DEBUG must parse, but the environment decides: on for dev and test, off for prod.
        let debug = env != Environment::Prod;

        let port = parse_num::<u16>("DB_PORT", required("DB_PORT"))?;
        let schema = get("DB_SCHEMA").unwrap_or_else(|| "public".into());
        validate_identifier(&schema).map_err(|_| ConfigError::InvalidValue {
            name: "DB_SCHEMA",
            value: schema.clone(),
        })?;
        let max_connections = positive("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 5u32)?;
        let acquire_secs = positive("DB_ACQUIRE_TIMEOUT_SECS", get("DB_ACQUIRE_TIMEOUT_SECS"), 5u64)?;
        let statement_secs = positive("DB_STATEMENT_TIMEOUT_SECS", get("DB_STATEMENT_TIMEOUT_SECS"), 30u64)?;
        let isolation = match get("DB_ISOLATION").map(|v| v.to_lowercase()).as_deref() {
            None | Some("read_committed") => IsolationLevel::ReadCommitted,
            Some("serializable") => IsolationLevel::Serializable,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "DB_ISOLATION",
                    value: other.to_string(),
                })
            }
        };

        Ok(AppConfig {
            env,
            debug,
            database: DbConfig {
                host: required("DB_IP"),
                port,
                user: required("DB_USER"),
                password: required("DB_PASS"),
                database: required("DB_NAME"),
                schema,
                max_connections,
                acquire_timeout: Duration::from_secs(acquire_secs),
                statement_timeout: Duration::from_secs(statement_secs),
                isolation,
            },
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
        })
    }
}

fn parse_num<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value })
}

/// Optional count or duration. Zero is rejected.
fn positive<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let Some(raw) = value else { return Ok(default) };
    let n: T = parse_num(name, raw.clone())?;
    if n == T::default() {
        return Err(ConfigError::InvalidValue {
            name,
            value: format!("{} (must be greater than 0)", raw),
        });
    }
    Ok(n)
}
