//! Query execution boundary.
//!
//! The engine hands each generated statement to a [`QueryExecutor`] as a
//! single operation. No retries or timeouts happen at this layer.

use async_trait::async_trait;
use common::Catalog;
use sqlx::AnyPool;

#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Executes one SQL statement and reports the number of affected rows.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<u64, ExecutorError>;
}

/// Executor backed by an sqlx pool, usually the catalog's own.
#[derive(Clone, Debug)]
pub struct SqlExecutor {
    pool: AnyPool,
}

impl SqlExecutor {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self::new(catalog.pool().clone())
    }
}

#[async_trait]
impl QueryExecutor for SqlExecutor {
    async fn execute(&self, statement: &str) -> Result<u64, ExecutorError> {
        let result = sqlx::query(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sql_executor_reports_rows_affected() {
        let catalog = Catalog::new("sqlite::memory:").await.unwrap();
        let executor = SqlExecutor::from_catalog(&catalog);

        executor
            .execute("CREATE TABLE people (name TEXT, age INTEGER)")
            .await
            .unwrap();
        executor
            .execute("INSERT INTO people VALUES ('a', 10), ('b', 40), ('c', 50)")
            .await
            .unwrap();

        let rows = executor
            .execute("UPDATE people SET name = '' WHERE (age > 30);")
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn test_sql_executor_surfaces_database_errors() {
        let catalog = Catalog::new("sqlite::memory:").await.unwrap();
        let executor = SqlExecutor::from_catalog(&catalog);

        let err = executor
            .execute("UPDATE missing_table SET x = '' WHERE (1 = 1);")
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Database(_)));
    }
}
