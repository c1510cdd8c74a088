use tracing::info;

use crate::db::DbPool;
use crate::destination::{quote_identifier, Destination};
use crate::error::{IngestError, Result};
use crate::model::INDEXED_COLUMNS;

/// `CREATE INDEX IF NOT EXISTS` statements for the lookup columns of the sales table.
pub fn index_statements(destination: &Destination) -> Vec<String> {
    INDEXED_COLUMNS
        .iter()
        .map(|(column, label)| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_identifier(&destination.index_name(label)),
                destination.qualified(),
                quote_identifier(column)
            )
        })
        .collect()
}

/// Creates the secondary indexes that downstream models filter on. Safe to rerun.
pub async fn create_indexes(pool: &DbPool, destination: &Destination) -> Result<usize> {
    let statements = index_statements(destination);
    let mut tx = pool
        .begin()
        .await
        .map_err(|source| IngestError::IndexFailed { source })?;

    for sql in &statements {
        sqlx::query(sql)
            .execute(&mut *tx)
            .await
            .map_err(|source| IngestError::IndexFailed { source })?;
    }

    tx.commit()
        .await
        .map_err(|source| IngestError::IndexFailed { source })?;

    info!(table = %destination, count = statements.len(), "Indexes ensured");
    Ok(statements.len())
}
