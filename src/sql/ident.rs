//! Identifier validation. Table and column names cannot be bound as parameters,
//! so every name that reaches SQL text must pass [`validate_identifier`] first.

use crate::error::AppError;
use regex::Regex;
use std::sync::OnceLock;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";
const SQL_TYPE_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_ (),]*$";

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).expect("identifier pattern is valid"))
}

fn sql_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SQL_TYPE_PATTERN).expect("type pattern is valid"))
}

/// Column types are spliced into DDL and `$n::<type>` casts, so they are limited to
/// names, spaces, commas and parentheses (`UUID`, `VARCHAR(64)`, `NUMERIC(10, 2)`).
pub fn is_valid_sql_type(sql_type: &str) -> bool {
    sql_type_re().is_match(sql_type)
}

/// Returns the identifier unchanged when it matches `^[A-Za-z_][A-Za-z0-9_]*$`.
pub fn validate_identifier(identifier: &str) -> Result<&str, AppError> {
    if identifier_re().is_match(identifier) {
        Ok(identifier)
    } else {
        Err(AppError::InvalidIdentifier(identifier.to_string()))
    }
}

/// Validate, then quote for PostgreSQL. Quoting keeps reserved words such as `user` usable as table names.
pub fn quoted(identifier: &str) -> Result<String, AppError> {
    Ok(format!("\"{}\"", validate_identifier(identifier)?))
}

/// Schema-qualified, quoted table name.
pub fn qualified_table(schema: &str, table: &str) -> Result<String, AppError> {
    Ok(format!("{}.{}", quoted(schema)?, quoted(table)?))
}
