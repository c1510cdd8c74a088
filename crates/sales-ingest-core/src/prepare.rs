// crates/sales-ingest-core/src/prepare.rs

use serde::Serialize;
use tracing::info;

use crate::db::DbPool;
use crate::destination::{quote_identifier, Destination};
use crate::error::{IngestError, PrepStep, Result};
use crate::model::{
    BRAND, CATEGORY, CHANNEL, DATE, LOCATION, PRICE, PRODUCT_ID, PRODUCT_NAME, QUANTITY,
    RETAILER_ID, RETAILER_NAME, SALE_ID,
};

/// Destination columns and their Postgres types, in table order.
pub const TABLE_COLUMNS: [(&str, &str); 12] = [
    (SALE_ID, "integer primary key"),
    (PRODUCT_ID, "integer"),
    (PRODUCT_NAME, "text"),
    (BRAND, "text"),
    (CATEGORY, "text"),
    (RETAILER_ID, "integer"),
    (RETAILER_NAME, "text"),
    (CHANNEL, "text"),
    (LOCATION, "text"),
    (QUANTITY, "integer"),
    (PRICE, "decimal(18,2)"),
    (DATE, "date"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrepareOutcome {
    pub schema_created: bool,
    pub table_created: bool,
}

/// Makes sure the destination schema and table exist, then empties the table.
///
/// Each step commits on its own, so a rerun after a failure picks up where the catalog
/// actually is. The truncate runs on every call, including right after creation.
pub async fn prepare_destination(pool: &DbPool, destination: &Destination) -> Result<PrepareOutcome> {
    let schema_created = ensure_schema(pool, destination)
        .await
        .map_err(prep_failed(PrepStep::CreateSchema))?;
    if schema_created {
        info!(schema = destination.schema(), "Created schema");
    }

    let table_created = ensure_table(pool, destination)
        .await
        .map_err(prep_failed(PrepStep::CreateTable))?;
    if table_created {
        info!(table = %destination, "Created table");
    }

    truncate(pool, destination)
        .await
        .map_err(prep_failed(PrepStep::Truncate))?;
    info!(table = %destination, "Truncated table");

    Ok(PrepareOutcome {
        schema_created,
        table_created,
    })
}

fn prep_failed(step: PrepStep) -> impl FnOnce(sqlx::Error) -> IngestError {
    move |source| IngestError::DbPrepFailed { step, source }
}

async fn ensure_schema(pool: &DbPool, destination: &Destination) -> std::result::Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let exists: bool = sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)"#,
    )
    .bind(destination.schema())
    .fetch_one(&mut *tx)
    .await?;

    if !exists {
        let sql = format!("CREATE SCHEMA {}", quote_identifier(destination.schema()));
        sqlx::query(&sql).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(!exists)
}

async fn ensure_table(pool: &DbPool, destination: &Destination) -> std::result::Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let exists: bool = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = $1
              AND table_name = $2
        )
        "#,
    )
    .bind(destination.schema())
    .bind(destination.table())
    .fetch_one(&mut *tx)
    .await?;

    if !exists {
        sqlx::query(&create_table_sql(destination))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(!exists)
}

async fn truncate(pool: &DbPool, destination: &Destination) -> std::result::Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let sql = format!("TRUNCATE TABLE {}", destination.qualified());
    sqlx::query(&sql).execute(&mut *tx).await?;
    tx.commit().await
}

pub fn create_table_sql(destination: &Destination) -> String {
    let columns = TABLE_COLUMNS
        .iter()
        .map(|(name, sql_type)| format!("    {} {}", quote_identifier(name), sql_type))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE {} (\n{}\n)", destination.qualified(), columns)
}
