//! Connection pool owner.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::backend::{d1::D1Database, sqlite::SqliteDatabase, Database};
use crate::config::{BackendConfig, DbConfig};
use crate::DbError;

/// Shared handle to whichever backend was configured.
pub type DbPool = Arc<dyn Database>;

/// Open the configured backend and verify it answers.
pub async fn connect(config: &DbConfig) -> Result<DbPool, DbError> {
    let pool: DbPool = match &config.backend {
        BackendConfig::Sqlite { path } => {
            info!(
                "Opening sqlite database at {} (max_open={})",
                path.display(),
                config.pool.max_open
            );
            Arc::new(SqliteDatabase::open(path, &config.pool).await?)
        }
        BackendConfig::D1 {
            account_id,
            api_token,
            database_id,
            endpoint,
        } => {
            info!(
                "Connecting to remote d1 database {database_id} (max_open={})",
                config.pool.max_open
            );
            Arc::new(D1Database::new(
                endpoint,
                account_id,
                database_id,
                api_token,
                &config.pool,
            )?)
        }
    };

    with_deadline(config.pool.connect_timeout, pool.ping()).await?;
    info!("Database connection established ({})", pool.kind());
    Ok(pool)
}

/// Run `fut`, failing with [`DbError::Timeout`] once `limit` elapses.
pub(crate) async fn with_deadline<T, F>(limit: Duration, fut: F) -> Result<T, DbError>
where
    F: Future<Output = Result<T, DbError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DbError::Timeout(limit))?
}
