//! Extraction of orphan resource rows from the inventory database.

use async_trait::async_trait;
use sqlx_core::error::Error as SqlxError;
use sqlx_core::query::query;
use sqlx_postgres::PgPool;
use tracing::{debug, instrument};

use crate::models::InventoryRow;

/// PostgreSQL error code for undefined table.
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// PostgreSQL error code for undefined column.
pub const PG_UNDEFINED_COLUMN: &str = "42703";

/// PostgreSQL error code for a syntax error.
pub const PG_SYNTAX_ERROR: &str = "42601";

const PERMANENT_PG_CODES: &[&str] = &[PG_UNDEFINED_TABLE, PG_UNDEFINED_COLUMN, PG_SYNTAX_ERROR];

/// Errors raised while extracting rows.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The database rejected the query or could not be reached.
    #[error("query failed: {0}")]
    Query(#[source] SqlxError),

    /// A row did not match the expected shape.
    #[error("failed to decode row {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: SqlxError,
    },
}

impl ExtractError {
    /// Returns `true` when running the same query again cannot succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Query(err) | Self::Decode { source: err, .. } => is_permanent_sqlx_error(err),
        }
    }
}

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

fn is_permanent_sqlx_error(err: &SqlxError) -> bool {
    match err {
        SqlxError::ColumnNotFound(_)
        | SqlxError::ColumnDecode { .. }
        | SqlxError::ColumnIndexOutOfBounds { .. }
        | SqlxError::Decode(_)
        | SqlxError::TypeNotFound { .. } => true,
        SqlxError::Database(_) => PERMANENT_PG_CODES
            .iter()
            .any(|code| has_pg_error_code(err, code)),
        _ => false,
    }
}

/// Source of rows of type `R`.
#[async_trait]
pub trait ResourceExtractor<R>: Send + Sync {
    /// Runs `query` and returns the decoded rows in store order.
    async fn extract(&self, query: &str) -> Result<Vec<R>, ExtractError>;
}

/// Extractor running raw SQL against the inventory database.
#[derive(Debug, Clone)]
pub struct PgExtractor {
    pool: PgPool,
}

impl PgExtractor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl<R: InventoryRow> ResourceExtractor<R> for PgExtractor {
    #[instrument(skip_all, fields(row_type = std::any::type_name::<R>()))]
    async fn extract(&self, sql: &str) -> Result<Vec<R>, ExtractError> {
        let rows = query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(ExtractError::Query)?;

        debug!(count = rows.len(), "fetched inventory rows");

        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                R::from_row(row).map_err(|source| ExtractError::Decode { index, source })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_is_permanent() {
        let err = ExtractError::Decode {
            index: 0,
            source: SqlxError::ColumnNotFound("instance_id".into()),
        };
        assert!(err.is_permanent());
        assert!(err.to_string().contains("row 0"));

        let err = ExtractError::Query(SqlxError::ColumnIndexOutOfBounds { index: 3, len: 2 });
        assert!(err.is_permanent());
    }

    #[test]
    fn test_transient_failures_are_not_permanent() {
        assert!(!ExtractError::Query(SqlxError::PoolTimedOut).is_permanent());
        assert!(!ExtractError::Query(SqlxError::PoolClosed).is_permanent());
        let reset = ExtractError::Query(SqlxError::Protocol("connection reset".into()));
        assert!(!reset.is_permanent());
    }

    #[test]
    fn test_non_database_error_has_no_pg_code() {
        assert!(!has_pg_error_code(&SqlxError::RowNotFound, PG_UNDEFINED_TABLE));
    }
}
