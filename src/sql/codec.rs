//! Value codec: wire values (JSON) to bound parameters, and column values back to JSON.

use crate::error::AppError;
use crate::model::FieldKind;
use crate::sql::PgBindValue;
use serde_json::{Number, Value};
use sqlx::postgres::PgRow;
use sqlx::Row;

const TRUTHY: &[&str] = &["1", "true", "t", "y", "yes"];
const FALSY: &[&str] = &["0", "false", "f", "n", "no"];

/// Case-insensitive boolean words. `None` when the text is neither truthy nor falsy.
pub fn parse_bool(s: &str) -> Option<bool> {
    let lower = s.trim().to_lowercase();
    if TRUTHY.contains(&lower.as_str()) {
        Some(true)
    } else if FALSY.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn invalid(field: &str, kind: FieldKind, v: &Value) -> AppError {
    AppError::InvalidValue {
        field: field.to_string(),
        message: format!("cannot convert {} to {}", v, kind),
    }
}

/// Convert the wire value of `field` into a bound parameter for a column of `kind`.
pub fn encode(kind: FieldKind, field: &str, v: &Value) -> Result<PgBindValue, AppError> {
    if kind == FieldKind::Relationship {
        return Err(AppError::UnsupportedType(kind.to_string()));
    }
    if v.is_null() {
        return Ok(PgBindValue::Null);
    }
    let out = match kind {
        FieldKind::String => match v {
            Value::String(s) => PgBindValue::Text(s.clone()),
            Value::Number(n) => PgBindValue::Text(n.to_string()),
            Value::Bool(b) => PgBindValue::Text(b.to_string()),
            _ => return Err(invalid(field, kind, v)),
        },
        FieldKind::Integer => match v {
            Value::Number(n) => n.as_i64().map(PgBindValue::I64).ok_or_else(|| invalid(field, kind, v))?,
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(PgBindValue::I64)
                .map_err(|_| invalid(field, kind, v))?,
            _ => return Err(invalid(field, kind, v)),
        },
        FieldKind::Float => match v {
            Value::Number(n) => n.as_f64().map(PgBindValue::F64).ok_or_else(|| invalid(field, kind, v))?,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(PgBindValue::F64)
                .map_err(|_| invalid(field, kind, v))?,
            _ => return Err(invalid(field, kind, v)),
        },
        FieldKind::Boolean => match v {
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::String(s) => parse_bool(s).map(PgBindValue::Bool).ok_or_else(|| invalid(field, kind, v))?,
            Value::Number(n) => match n.as_i64() {
                Some(0) => PgBindValue::Bool(false),
                Some(1) => PgBindValue::Bool(true),
                _ => return Err(invalid(field, kind, v)),
            },
            _ => return Err(invalid(field, kind, v)),
        },
        // Text passthrough; the placeholder cast lets the server parse it.
        FieldKind::Date => match v {
            Value::String(s) => PgBindValue::Text(s.clone()),
            _ => return Err(invalid(field, kind, v)),
        },
        FieldKind::Uuid => match v {
            Value::String(s) => uuid::Uuid::parse_str(s.trim())
                .map(|u| PgBindValue::Text(u.to_string()))
                .map_err(|_| invalid(field, kind, v))?,
            _ => return Err(invalid(field, kind, v)),
        },
        FieldKind::ForeignKey => match v {
            Value::String(s) => PgBindValue::Text(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgBindValue::I64(i),
                None => PgBindValue::F64(n.as_f64().unwrap_or_default()),
            },
            Value::Bool(b) => PgBindValue::Bool(*b),
            _ => return Err(invalid(field, kind, v)),
        },
        FieldKind::Relationship => return Err(AppError::UnsupportedType(kind.to_string())),
    };
    Ok(out)
}

fn float_value(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Decode column `idx` of `row` as `kind`. SQL NULL decodes to JSON null.
pub fn decode(kind: FieldKind, row: &PgRow, idx: usize) -> Result<Value, AppError> {
    let v = match kind {
        FieldKind::String => row.try_get::<Option<String>, _>(idx)?.map(Value::String),
        FieldKind::Integer => match row.try_get::<Option<i32>, _>(idx) {
            Ok(v) => v.map(|n| Value::Number(n.into())),
            Err(_) => row.try_get::<Option<i64>, _>(idx)?.map(|n| Value::Number(n.into())),
        },
        FieldKind::Float => match row.try_get::<Option<f64>, _>(idx) {
            Ok(v) => v.map(float_value),
            Err(_) => row.try_get::<Option<f32>, _>(idx)?.map(|n| float_value(n as f64)),
        },
        FieldKind::Boolean => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        FieldKind::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        FieldKind::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(idx)?
            .map(|u| Value::String(u.to_string())),
        FieldKind::ForeignKey => return Ok(decode_any(row, idx)),
        FieldKind::Relationship => return Err(AppError::UnsupportedType(kind.to_string())),
    };
    Ok(v.unwrap_or(Value::Null))
}

/// Foreign-key columns carry whatever type the declaration chose; try the usual key types in turn.
fn decode_any(row: &PgRow, idx: usize) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(idx) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(idx) {
        return Value::String(s);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(idx) {
        return float_value(n);
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(idx) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    Value::Null
}
