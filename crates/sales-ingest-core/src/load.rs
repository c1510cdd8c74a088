// crates/sales-ingest-core/src/load.rs

use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use crate::db::DbPool;
use crate::destination::{quote_identifier, Destination};
use crate::error::{IngestError, Result};
use crate::model::{SaleRecord, SALES_COLUMNS};

/// Postgres accepts at most this many bind parameters per statement.
const BIND_PARAMETER_LIMIT: usize = 65_535;
const ROWS_PER_STATEMENT: usize = BIND_PARAMETER_LIMIT / SALES_COLUMNS.len();

/// Appends cleaned sales to the destination table and returns the number of rows written.
///
/// This is a plain append; the caller is expected to have truncated the table first. All
/// statements share one transaction, so a failed load leaves no partial batch behind.
pub async fn insert_records(
    pool: &DbPool,
    destination: &Destination,
    records: &[SaleRecord],
) -> Result<u64> {
    append(pool, destination, records)
        .await
        .map_err(|source| IngestError::InsertFailed { source })
}

async fn append(
    pool: &DbPool,
    destination: &Destination,
    records: &[SaleRecord],
) -> std::result::Result<u64, sqlx::Error> {
    if records.is_empty() {
        return Ok(0);
    }

    let prefix = insert_prefix(destination);
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for chunk in records.chunks(ROWS_PER_STATEMENT) {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(prefix.as_str());
        builder.push_values(chunk, |mut row, record| {
            row.push_bind(record.sale_id)
                .push_bind(record.product_id)
                .push_bind(record.product_name.as_deref())
                .push_bind(record.brand.as_deref())
                .push_bind(record.category.as_deref())
                .push_bind(record.retailer_id)
                .push_bind(record.retailer_name.as_deref())
                .push_bind(record.channel.as_deref())
                .push_bind(record.location.as_str())
                .push_bind(record.quantity)
                .push_bind(record.price)
                .push_bind(record.date);
        });

        let result = builder.build().execute(&mut *tx).await?;
        inserted += result.rows_affected();
        debug!(rows = chunk.len(), "Inserted chunk");
    }

    tx.commit().await?;
    Ok(inserted)
}

/// `INSERT INTO "schema"."table" ("SaleID", ...) ` with columns in table order.
pub fn insert_prefix(destination: &Destination) -> String {
    let columns = SALES_COLUMNS
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) ", destination.qualified(), columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lists_columns_in_table_order() {
        let dest = Destination::new("raw", "sales").unwrap();
        let prefix = insert_prefix(&dest);
        assert!(prefix.starts_with("INSERT INTO \"raw\".\"sales\" (\"SaleID\", \"ProductID\""));
        assert!(prefix.ends_with("\"Price\", \"Date\") "));
    }

    #[test]
    fn chunks_stay_under_bind_limit() {
        assert!(ROWS_PER_STATEMENT * SALES_COLUMNS.len() <= BIND_PARAMETER_LIMIT);
    }
}
