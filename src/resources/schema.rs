use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use sqlx::{query::Query, sqlite::SqliteArguments, Sqlite};

use super::collection::CollectionError;

/// Primitive column types a resource field can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Real,
    Boolean,
}

impl FieldType {
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Integer | FieldType::Boolean => "INTEGER",
            FieldType::Real => "REAL",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            FieldType::Text => "a string",
            FieldType::Integer => "an integer",
            FieldType::Real => "a number",
            FieldType::Boolean => "a boolean",
        }
    }

    /// Converts a JSON value into a bindable column value, if the types agree.
    pub fn coerce(self, value: &Value) -> Option<SqlValue> {
        match (self, value) {
            (FieldType::Text, Value::String(s)) => Some(SqlValue::Text(s.clone())),
            (FieldType::Integer, Value::Number(n)) => n.as_i64().map(SqlValue::Integer),
            (FieldType::Real, Value::Number(n)) => n.as_f64().map(SqlValue::Real),
            (FieldType::Boolean, Value::Bool(b)) => Some(SqlValue::Boolean(*b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
}

impl SqlValue {
    pub fn bind_to<'q>(
        self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            SqlValue::Text(s) => query.bind(s),
            SqlValue::Integer(i) => query.bind(i),
            SqlValue::Real(r) => query.bind(r),
            SqlValue::Boolean(b) => query.bind(b),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
}

/// Describes one resource collection: its name (also the table name) and
/// its required fields. The `id` column is implicit.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

pub static FOOD: Schema = Schema {
    name: "food",
    fields: &[
        Field { name: "name", ty: FieldType::Text },
        Field { name: "calories", ty: FieldType::Integer },
        Field { name: "type", ty: FieldType::Text },
    ],
};

pub static CLOTHES: Schema = Schema {
    name: "clothes",
    fields: &[
        Field { name: "name", ty: FieldType::Text },
        Field { name: "color", ty: FieldType::Text },
        Field { name: "size", ty: FieldType::Text },
    ],
};

fn is_identifier(name: &str) -> bool {
    lazy_static! {
        static ref IDENT_RE: Regex = Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap();
    }
    IDENT_RE.is_match(name)
}

impl Schema {
    /// Names end up inside SQL text, so only plain lowercase identifiers are allowed.
    pub fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(is_identifier(self.name), "invalid resource name `{}`", self.name);
        anyhow::ensure!(!self.fields.is_empty(), "resource `{}` has no fields", self.name);
        for (i, field) in self.fields.iter().enumerate() {
            anyhow::ensure!(
                is_identifier(field.name) && field.name != "id",
                "invalid field name `{}` on `{}`",
                field.name,
                self.name
            );
            anyhow::ensure!(
                !self.fields[..i].iter().any(|f| f.name == field.name),
                "duplicate field `{}` on `{}`",
                field.name,
                self.name
            );
        }
        Ok(())
    }

    /// Validates a request body against the schema.
    ///
    /// With `partial = false` every field must be present. With `partial = true`
    /// absent fields are skipped. Keys that are not schema fields are ignored.
    pub fn parse(
        &self,
        body: &Value,
        partial: bool,
    ) -> Result<Vec<(&'static Field, SqlValue)>, CollectionError> {
        let Value::Object(map) = body else {
            return Err(CollectionError::Validation(format!(
                "{} body must be a JSON object",
                self.name
            )));
        };

        let mut values = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            match map.get(field.name) {
                None if partial => continue,
                None => {
                    return Err(CollectionError::Validation(format!(
                        "missing required field `{}`",
                        field.name
                    )))
                }
                Some(raw) => {
                    let value = field.ty.coerce(raw).ok_or_else(|| {
                        CollectionError::Validation(format!(
                            "field `{}` must be {}",
                            field.name,
                            field.ty.describe()
                        ))
                    })?;
                    values.push((field, value));
                }
            }
        }
        Ok(values)
    }
}
