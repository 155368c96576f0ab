//! Builds DDL and parameterized INSERT / SELECT text from registered Models.
//! Identifiers are validated and quoted; values only ever travel as `$n` parameters.

use crate::error::AppError;
use crate::model::{ModelDef, Record};
use crate::sql::codec;
use crate::sql::ident::{qualified_table, quoted};
use crate::sql::PgBindValue;
use serde_json::Value;

/// Name of the primary-key column of `$2.$1`, read from the catalog.
pub const PRIMARY_KEY_QUERY: &str = "SELECT a.attname::text FROM pg_index i \
     JOIN pg_class c ON c.oid = i.indrelid \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = ANY(i.indkey) \
     WHERE i.indisprimary AND c.relname = $1 AND n.nspname = $2 \
     ORDER BY a.attnum LIMIT 1";

/// Whether constraint `$1` already exists in schema `$2`.
pub const CONSTRAINT_EXISTS_QUERY: &str = "SELECT EXISTS(SELECT 1 FROM pg_constraint con \
     JOIN pg_namespace n ON n.oid = con.connamespace \
     WHERE con.conname = $1 AND n.nspname = $2)";

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// Second-pass DDL: one named constraint per foreign-key field.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyStatement {
    pub name: String,
    pub sql: String,
}

fn column_list(model: &ModelDef) -> Result<String, AppError> {
    let cols = model
        .stored_fields()
        .map(|(name, _)| quoted(name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cols.join(", "))
}

/// `CREATE TABLE IF NOT EXISTS` with every stored column; foreign keys are added later.
pub fn create_table(schema: &str, model: &ModelDef) -> Result<String, AppError> {
    let table = qualified_table(schema, model.table())?;
    let cols = model
        .stored_fields()
        .map(|(name, d)| Ok(format!("{} {}", quoted(name)?, d.sql_fragment())))
        .collect::<Result<Vec<_>, AppError>>()?;
    Ok(format!("CREATE TABLE IF NOT EXISTS {} ({})", table, cols.join(", ")))
}

/// Longest identifier PostgreSQL keeps (NAMEDATALEN - 1); longer names are truncated by the server.
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Constraint name for a foreign-key column: `fk_<table>_<column>`, cut to the length the
/// server stores so catalog lookups see the same name.
pub fn foreign_key_name(table: &str, column: &str) -> String {
    let mut name = format!("fk_{}_{}", table, column);
    if name.len() > MAX_IDENTIFIER_BYTES {
        let mut end = MAX_IDENTIFIER_BYTES;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}

pub fn foreign_key_constraints(schema: &str, model: &ModelDef) -> Result<Vec<ForeignKeyStatement>, AppError> {
    let table = qualified_table(schema, model.table())?;
    let mut out = Vec::new();
    for (name, d) in model.stored_fields() {
        let Some(target) = d.references() else { continue };
        let constraint = foreign_key_name(model.table(), name);
        let sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            table,
            quoted(&constraint)?,
            quoted(name)?,
            qualified_table(schema, &target.table)?,
            quoted(&target.column)?
        );
        out.push(ForeignKeyStatement { name: constraint, sql });
    }
    Ok(out)
}

/// INSERT … RETURNING every stored column. Absent fields with a column default are left to the
/// database; other absent fields are bound as NULL.
pub fn insert(schema: &str, record: &Record) -> Result<QueryBuf, AppError> {
    let model = record.model();
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, model.table())?;
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (name, d) in model.stored_fields() {
        let val = match record.get(name) {
            Some(v) => v,
            None if d.has_default() => continue,
            None => &Value::Null,
        };
        let n = q.push_param(codec::encode(d.kind(), name, val)?);
        cols.push(quoted(name)?);
        placeholders.push(format!("${}::{}", n, d.sql_type()));
    }
    let returning = column_list(model)?;
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    Ok(q)
}

/// SELECT stored columns WHERE `column` = value, value encoded for that column.
pub fn select_by_column(schema: &str, model: &ModelDef, column: &str, value: &Value) -> Result<QueryBuf, AppError> {
    let d = model
        .field(column)
        .filter(|d| d.is_stored())
        .ok_or_else(|| AppError::BadRequest(format!("'{}' is not a column of {}", column, model.table())))?;
    let mut q = QueryBuf::new();
    let n = q.push_param(codec::encode(d.kind(), column, value)?);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}::{}",
        column_list(model)?,
        qualified_table(schema, model.table())?,
        quoted(column)?,
        n,
        d.sql_type()
    );
    Ok(q)
}

/// SELECT every row; ordered when a column is given.
pub fn select_all(schema: &str, model: &ModelDef, order_by: Option<&str>) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let order = match order_by {
        Some(col) => format!(" ORDER BY {}", quoted(col)?),
        None => String::new(),
    };
    q.sql = format!(
        "SELECT {} FROM {}{}",
        column_list(model)?,
        qualified_table(schema, model.table())?,
        order
    );
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnOptions, FieldDescriptor};
    use serde_json::json;
    use std::sync::Arc;

    fn test_model() -> Arc<ModelDef> {
        Arc::new(
            ModelDef::new(
                "TestModel",
                vec![
                    (
                        "id_test",
                        FieldDescriptor::uuid(ColumnOptions::new().primary_key().default_expr("gen_random_uuid()")),
                    ),
                    ("name", FieldDescriptor::string(255, ColumnOptions::new())),
                ],
            )
            .unwrap(),
        )
    }

    fn user_model() -> Arc<ModelDef> {
        Arc::new(
            ModelDef::new(
                "UserModel",
                vec![
                    ("id_user", FieldDescriptor::integer(ColumnOptions::new().primary_key().auto_increment())),
                    ("active", FieldDescriptor::boolean(ColumnOptions::new().default_expr("true"))),
                    ("test_id", FieldDescriptor::foreign_key("TestModel", "id_test", "UUID")),
                    ("test", FieldDescriptor::relationship("test_id")),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn create_table_skips_relationships() {
        let sql = create_table("public", &user_model()).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"user\" ("));
        assert!(sql.contains("\"test_id\" UUID"));
        assert!(sql.contains("\"active\" BOOLEAN"));
        assert!(sql.contains("DEFAULT TRUE"));
        assert!(!sql.contains("\"test\" "));
        assert!(!sql.contains("REFERENCES"));
    }

    #[test]
    fn foreign_keys_are_named_per_column() {
        let fks = foreign_key_constraints("app", &user_model()).unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].name, "fk_user_test_id");
        assert_eq!(
            fks[0].sql,
            "ALTER TABLE \"app\".\"user\" ADD CONSTRAINT \"fk_user_test_id\" FOREIGN KEY (\"test_id\") \
             REFERENCES \"app\".\"test\" (\"id_test\")"
        );
        assert!(foreign_key_constraints("app", &test_model()).unwrap().is_empty());
    }

    #[test]
    fn long_constraint_names_are_cut_like_the_server_does() {
        let table = "a".repeat(40);
        let column = "b".repeat(30);
        let name = foreign_key_name(&table, &column);
        assert_eq!(name.len(), MAX_IDENTIFIER_BYTES);
        assert_eq!(name, format!("fk_{}_{}", table, "b".repeat(19)));
        assert_eq!(foreign_key_name("user", "test_id"), "fk_user_test_id");
    }

    #[test]
    fn insert_leaves_defaults_to_the_database() {
        let record = Record::load(test_model(), &json!({ "name": "t1" })).unwrap();
        let q = insert("public", &record).unwrap();
        assert_eq!(
            q.sql,
            "INSERT INTO \"public\".\"test\" (\"name\") VALUES ($1::VARCHAR(255)) RETURNING \"id_test\", \"name\""
        );
        assert_eq!(q.params, vec![PgBindValue::Text("t1".into())]);
    }

    #[test]
    fn insert_binds_absent_fields_without_default_as_null() {
        let record = Record::load(user_model(), &json!({ "active": "no" })).unwrap();
        let q = insert("public", &record).unwrap();
        assert!(q.sql.contains("(\"active\", \"test_id\") VALUES ($1::BOOLEAN, $2::UUID)"));
        assert_eq!(q.params, vec![PgBindValue::Bool(false), PgBindValue::Null]);
    }

    #[test]
    fn insert_with_nothing_to_bind_uses_default_values() {
        let record = Record::new(test_model());
        let mut q = insert("public", &record).unwrap();
        // name has no default, so it is bound as NULL
        assert_eq!(q.params, vec![PgBindValue::Null]);

        let only_defaults = Arc::new(
            ModelDef::new(
                "CounterModel",
                vec![("id", FieldDescriptor::integer(ColumnOptions::new().primary_key().auto_increment()))],
            )
            .unwrap(),
        );
        q = insert("public", &Record::new(only_defaults)).unwrap();
        assert_eq!(q.sql, "INSERT INTO \"public\".\"counter\" DEFAULT VALUES RETURNING \"id\"");
    }

    #[test]
    fn select_by_column_casts_the_parameter() {
        let q = select_by_column(
            "public",
            &test_model(),
            "id_test",
            &json!("67e55044-10b1-426f-9247-bb680e5fe0c8"),
        )
        .unwrap();
        assert_eq!(
            q.sql,
            "SELECT \"id_test\", \"name\" FROM \"public\".\"test\" WHERE \"id_test\" = $1::UUID"
        );
        assert_eq!(q.params.len(), 1);
        assert!(select_by_column("public", &user_model(), "test", &json!("x")).is_err());
        assert!(matches!(
            select_by_column("public", &test_model(), "id_test", &json!("t1")),
            Err(AppError::InvalidValue { .. })
        ));
    }

    #[test]
    fn select_all_orders_when_asked() {
        let q = select_all("public", &test_model(), Some("id_test")).unwrap();
        assert!(q.sql.ends_with("FROM \"public\".\"test\" ORDER BY \"id_test\""));
        assert!(q.params.is_empty());
        let q = select_all("public", &test_model(), None).unwrap();
        assert!(!q.sql.contains("ORDER BY"));
    }

    #[test]
    fn bad_schema_never_reaches_sql() {
        assert!(matches!(
            create_table("public; DROP", &test_model()),
            Err(AppError::InvalidIdentifier(_))
        ));
    }
}
