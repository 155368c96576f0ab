//! Field descriptors: per-column metadata and the builders that render DDL fragments.

use crate::case::table_name_for;
use crate::error::AppError;
use std::fmt;
use std::str::FromStr;

/// Column kind. Drives DDL rendering, the value codec and the API schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Uuid,
    ForeignKey,
    Relationship,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Uuid => "uuid",
            FieldKind::ForeignKey => "foreign_key",
            FieldKind::Relationship => "relationship",
        }
    }

    /// Whether the kind is stored as a column. Relationships are resolved at read time only.
    pub fn is_stored(&self) -> bool {
        !matches!(self, FieldKind::Relationship)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "string" => FieldKind::String,
            "integer" => FieldKind::Integer,
            "float" => FieldKind::Float,
            "boolean" => FieldKind::Boolean,
            "date" => FieldKind::Date,
            "uuid" => FieldKind::Uuid,
            "foreign_key" => FieldKind::ForeignKey,
            "relationship" => FieldKind::Relationship,
            other => return Err(AppError::UnsupportedType(other.to_string())),
        })
    }
}

/// Constraint options shared by the scalar builders. Columns are NOT NULL unless `nullable()` is called.
#[derive(Clone, Debug, Default)]
pub struct ColumnOptions {
    pub nullable: bool,
    pub primary_key: bool,
    /// SQL expression rendered after DEFAULT (e.g. `gen_random_uuid()`, `'n/a'`).
    pub default: Option<String>,
    pub unique: bool,
    /// Integers only; rendered as an identity column.
    pub auto_increment: bool,
}

impl ColumnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Target of a foreign key: referenced table and column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// Immutable metadata for one Model field.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    kind: FieldKind,
    /// Base SQL type, also used to cast bound parameters (`$1::UUID`). Empty for relationships.
    sql_type: String,
    /// Full column definition after the column name. Empty for relationships.
    sql_fragment: String,
    nullable: bool,
    primary_key_hint: bool,
    has_default: bool,
    max_length: Option<u32>,
    references: Option<ForeignKeyRef>,
    join_field: Option<String>,
}

fn render(sql_type: &str, opts: &ColumnOptions, default: Option<String>) -> String {
    let mut out = sql_type.to_string();
    if !opts.nullable {
        out.push_str(" NOT NULL");
    }
    if opts.primary_key {
        out.push_str(" PRIMARY KEY");
    }
    if let Some(d) = default {
        out.push_str(" DEFAULT ");
        out.push_str(&d);
    }
    if opts.unique {
        out.push_str(" UNIQUE");
    }
    out
}

impl FieldDescriptor {
    fn scalar(kind: FieldKind, sql_type: String, opts: ColumnOptions, max_length: Option<u32>) -> Self {
        let sql_fragment = render(&sql_type, &opts, opts.default.clone());
        FieldDescriptor {
            kind,
            sql_type,
            sql_fragment,
            nullable: opts.nullable,
            primary_key_hint: opts.primary_key,
            has_default: opts.default.is_some(),
            max_length,
            references: None,
            join_field: None,
        }
    }

    pub fn string(length: u32, opts: ColumnOptions) -> Self {
        Self::scalar(FieldKind::String, format!("VARCHAR({})", length), opts, Some(length))
    }

    pub fn integer(opts: ColumnOptions) -> Self {
        let identity = opts.auto_increment;
        let mut field = Self::scalar(FieldKind::Integer, "INTEGER".into(), opts, None);
        if identity {
            field.sql_fragment.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            field.has_default = true;
        }
        field
    }

    pub fn float(opts: ColumnOptions) -> Self {
        Self::scalar(FieldKind::Float, "FLOAT".into(), opts, None)
    }

    /// Boolean defaults are normalised to `TRUE`/`FALSE`.
    pub fn boolean(opts: ColumnOptions) -> Self {
        let default = opts.default.as_deref().map(str::to_uppercase);
        let sql_fragment = render("BOOLEAN", &opts, default);
        FieldDescriptor {
            sql_fragment,
            ..Self::scalar(FieldKind::Boolean, "BOOLEAN".into(), opts, None)
        }
    }

    pub fn date(opts: ColumnOptions) -> Self {
        Self::scalar(FieldKind::Date, "DATE".into(), opts, None)
    }

    pub fn uuid(opts: ColumnOptions) -> Self {
        Self::scalar(FieldKind::Uuid, "UUID".into(), opts, None)
    }

    /// Foreign-key column of type `column_sql_type` referencing `target.target_column`.
    /// `target` may be a Model name (`TestModel`) or a table name (`test`).
    /// The constraint itself is added after every table exists.
    pub fn foreign_key(target: &str, target_column: &str, column_sql_type: &str) -> Self {
        FieldDescriptor {
            kind: FieldKind::ForeignKey,
            sql_type: column_sql_type.to_string(),
            sql_fragment: column_sql_type.to_string(),
            nullable: true,
            primary_key_hint: false,
            has_default: false,
            max_length: None,
            references: Some(ForeignKeyRef {
                table: table_name_for(target),
                column: target_column.to_string(),
            }),
            join_field: None,
        }
    }

    /// Read-time link that follows the local foreign-key column `join_field`. Never stored.
    pub fn relationship(join_field: &str) -> Self {
        FieldDescriptor {
            kind: FieldKind::Relationship,
            sql_type: String::new(),
            sql_fragment: String::new(),
            nullable: true,
            primary_key_hint: false,
            has_default: false,
            max_length: None,
            references: None,
            join_field: Some(join_field.to_string()),
        }
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    pub fn sql_fragment(&self) -> &str {
        &self.sql_fragment
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Declared as PRIMARY KEY. Lookups still go through the catalog; this only shapes DDL.
    pub fn primary_key_hint(&self) -> bool {
        self.primary_key_hint
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }

    pub fn max_length(&self) -> Option<u32> {
        self.max_length
    }

    pub fn references(&self) -> Option<&ForeignKeyRef> {
        self.references.as_ref()
    }

    pub fn join_field(&self) -> Option<&str> {
        self.join_field.as_deref()
    }

    pub fn is_stored(&self) -> bool {
        self.kind.is_stored()
    }
}
