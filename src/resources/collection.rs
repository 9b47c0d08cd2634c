use anyhow::Context;
use serde_json::{Map, Number, Value};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

use super::schema::{FieldType, Schema};

/// A stored resource row rendered as JSON: `id` plus every schema field.
pub type Item = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("{0}")]
    Validation(String),
    #[error("{resource} item {id} not found")]
    NotFound { resource: &'static str, id: i64 },
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

/// Uniform CRUD over one resource table, driven entirely by its [`Schema`].
#[derive(Debug, Clone)]
pub struct Collection {
    schema: &'static Schema,
    table: String,
    columns: String,
}

impl Collection {
    pub fn new(schema: &'static Schema) -> Self {
        let columns = std::iter::once("id".to_string())
            .chain(schema.fields.iter().map(|f| quote(f.name)))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            schema,
            table: quote(schema.name),
            columns,
        }
    }

    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    pub async fn ensure_table(&self, db: &SqlitePool) -> anyhow::Result<()> {
        let fields = self
            .schema
            .fields
            .iter()
            .map(|f| format!("{} {} NOT NULL", quote(f.name), f.ty.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {fields})",
            self.table
        );
        sqlx::query(&sql)
            .execute(db)
            .await
            .with_context(|| format!("create table {}", self.schema.name))?;
        Ok(())
    }

    pub async fn list(&self, db: &SqlitePool) -> Result<Vec<Item>, CollectionError> {
        let sql = format!("SELECT {} FROM {} ORDER BY id ASC", self.columns, self.table);
        let rows = sqlx::query(&sql).fetch_all(db).await?;
        rows.iter().map(|row| self.decode(row)).collect()
    }

    pub async fn get(&self, db: &SqlitePool, id: i64) -> Result<Item, CollectionError> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?", self.columns, self.table);
        let row = sqlx::query(&sql).bind(id).fetch_optional(db).await?;
        match row {
            Some(row) => self.decode(&row),
            None => Err(self.not_found(id)),
        }
    }

    pub async fn create(&self, db: &SqlitePool, body: &Value) -> Result<Item, CollectionError> {
        let values = self.schema.parse(body, false)?;
        let names = values
            .iter()
            .map(|(f, _)| quote(f.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({names}) VALUES ({placeholders}) RETURNING {}",
            self.table, self.columns
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in values {
            query = value.bind_to(query);
        }
        let row = query.fetch_one(db).await?;
        let item = self.decode(&row)?;
        debug!(resource = self.name(), id = ?item.get("id"), "item created");
        Ok(item)
    }

    /// Applies the supplied fields; the others keep their stored values.
    pub async fn update(
        &self,
        db: &SqlitePool,
        id: i64,
        body: &Value,
    ) -> Result<Item, CollectionError> {
        let values = self.schema.parse(body, true)?;
        if values.is_empty() {
            return self.get(db, id).await;
        }

        let assignments = values
            .iter()
            .map(|(f, _)| format!("{} = ?", quote(f.name)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE id = ? RETURNING {}",
            self.table, self.columns
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in values {
            query = value.bind_to(query);
        }
        match query.bind(id).fetch_optional(db).await? {
            Some(row) => {
                debug!(resource = self.name(), id, "item updated");
                self.decode(&row)
            }
            None => Err(self.not_found(id)),
        }
    }

    pub async fn delete(&self, db: &SqlitePool, id: i64) -> Result<(), CollectionError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.table);
        let done = sqlx::query(&sql).bind(id).execute(db).await?;
        if done.rows_affected() == 0 {
            return Err(self.not_found(id));
        }
        debug!(resource = self.name(), id, "item deleted");
        Ok(())
    }

    fn not_found(&self, id: i64) -> CollectionError {
        CollectionError::NotFound {
            resource: self.schema.name,
            id,
        }
    }

    fn decode(&self, row: &SqliteRow) -> Result<Item, CollectionError> {
        let mut item = Map::new();
        item.insert("id".into(), Value::from(row.try_get::<i64, _>("id")?));
        for field in self.schema.fields {
            let value = match field.ty {
                FieldType::Text => Value::from(row.try_get::<String, _>(field.name)?),
                FieldType::Integer => Value::from(row.try_get::<i64, _>(field.name)?),
                FieldType::Real => Number::from_f64(row.try_get::<f64, _>(field.name)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                FieldType::Boolean => Value::from(row.try_get::<bool, _>(field.name)?),
            };
            item.insert(field.name.to_string(), value);
        }
        Ok(item)
    }
}
