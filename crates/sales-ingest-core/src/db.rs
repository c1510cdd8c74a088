use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::info;

use crate::config::Connection;
use crate::error::{IngestError, Result};

pub type DbPool = Pool<Postgres>;

/// Opens a small pool for one run. The job is sequential, but the advisory lock holds a
/// connection of its own for the whole run.
pub async fn connect(connection: &Connection) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&connection.url)
        .await
        .map_err(|source| IngestError::Connect { source })?;

    info!(connection = %connection.id, "Database connection pool established");
    Ok(pool)
}
