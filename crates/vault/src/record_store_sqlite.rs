//! SQLite-backed record store using sqlx.

use {
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    serde_json::Value,
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
};

use crate::{
    attribute::{Columns, Record},
    fields::{RecordKind, encrypted_column_name_for},
    record_store::RecordStore,
};

/// Reads and writes the sensitive columns of the record tables.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Create a store with its own connection pool and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to SQLite")?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Plaintext and `_enc` columns of `kind`, in field order.
fn storage_columns(kind: RecordKind) -> Vec<String> {
    kind.sensitive_fields()
        .iter()
        .flat_map(|field| [(*field).to_string(), encrypted_column_name_for(field)])
        .collect()
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn select(&self, kind: RecordKind, tenant_id: &str) -> Result<Vec<Record>> {
        let columns = storage_columns(kind);
        let sql = format!(
            "SELECT id, {} FROM {} WHERE tenant_id = ? ORDER BY id",
            columns.join(", "),
            kind.table()
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to select {kind} for tenant {tenant_id}"))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Columns::new();
            for column in &columns {
                let value: Option<String> = row.try_get(column.as_str())?;
                values.insert(column.clone(), value.map_or(Value::Null, Value::String));
            }
            records.push(Record::new(row.try_get::<String, _>("id")?, values));
        }
        Ok(records)
    }

    async fn update(&self, kind: RecordKind, record_id: &str, columns: &Columns) -> Result<()> {
        if columns.is_empty() {
            return Ok(());
        }

        let mut assignments = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (column, value) in columns {
            if !kind.is_storage_column(column) {
                bail!("column {column} is not a sensitive column of {kind}");
            }
            let value = match value {
                Value::Null => None,
                Value::String(text) => Some(text.as_str()),
                other => bail!("column {column} must be a string or null, got {other}"),
            };
            assignments.push(format!("{column} = ?"));
            values.push(value);
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            kind.table(),
            assignments.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for value in values {
            query = query.bind(value);
        }
        let result = query.bind(record_id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            bail!("record not found: {kind}/{record_id}");
        }
        Ok(())
    }
}
