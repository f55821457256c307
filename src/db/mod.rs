pub mod models;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::ApiLogRow;

/// Append-only sink for request log rows.
#[async_trait]
pub trait ApiLogStore: Send + Sync + 'static {
    /// Creates the backing table if it does not exist yet.
    async fn init_schema(&self) -> Result<(), DbError>;
    async fn insert_log(&self, row: &ApiLogRow) -> Result<(), DbError>;
    async fn health_check(&self) -> Result<(), DbError>;
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
