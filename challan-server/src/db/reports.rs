//! PostgreSQL implementation of the report sink.
//!
//! The pipeline's schema-degradation logic hands this sink a flat column
//! map, so the insert is built dynamically from whatever columns the chosen
//! schema variant contains. Rejections are classified so the store layer can
//! tell "this column does not exist" apart from "the database is down".

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use challan_core::{ReportSink, StoreError};

/// Postgres error code for `undefined_column`.
const UNDEFINED_COLUMN: &str = "42703";
/// Postgres error code for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// Postgres-backed report sink.
#[derive(Clone)]
pub struct PostgresReportSink {
    pool: PgPool,
}

impl PostgresReportSink {
    /// Connect and run migrations.
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Other(format!("Migration error: {e}")))?;

        tracing::info!("Report store connected and migrations applied");

        Ok(Self { pool })
    }

    /// Create a sink from an existing pool (for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportSink for PostgresReportSink {
    async fn insert(
        &self,
        table: &str,
        record: &Map<String, Value>,
    ) -> Result<i64, StoreError> {
        // Column names come from the schema variants, never from user input.
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO ");
        builder.push(table).push(" (");

        {
            let mut columns = builder.separated(", ");
            for key in record.keys() {
                columns.push(key.as_str());
            }
        }

        builder.push(") VALUES (");

        {
            let mut values = builder.separated(", ");
            for value in record.values() {
                match value {
                    Value::Null => {
                        values.push("NULL");
                    }
                    Value::Bool(b) => {
                        values.push_bind(*b);
                    }
                    Value::Number(n) if n.is_i64() => {
                        values.push_bind(n.as_i64().unwrap_or_default());
                    }
                    Value::Number(n) => {
                        values.push_bind(n.as_f64().unwrap_or_default());
                    }
                    Value::String(s) => {
                        values.push_bind(s.clone());
                    }
                    // Arrays and objects land in jsonb columns.
                    other => {
                        values.push_bind(other.clone());
                    }
                }
            }
        }

        builder.push(") RETURNING id");

        let id: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;

        tracing::debug!(report_id = id, table, "Report row inserted");
        Ok(id)
    }
}

/// Map a sqlx failure onto the store error taxonomy.
fn classify_sqlx_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string());
            match code.as_deref() {
                Some(UNDEFINED_COLUMN) | Some(UNDEFINED_TABLE) => {
                    StoreError::Schema(db.message().to_string())
                }
                _ => StoreError::Other(db.message().to_string()),
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(e.to_string())
        }
        _ => StoreError::Other(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_classified_as_connection() {
        let err = classify_sqlx_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[test]
    fn test_row_not_found_classified_as_other() {
        let err = classify_sqlx_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Other(_)));
    }
}
