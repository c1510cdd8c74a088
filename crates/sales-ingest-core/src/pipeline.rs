use serde::Serialize;
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ResolvedConfig;
use crate::db::{self, DbPool};
use crate::destination::Destination;
use crate::error::{IngestError, Result};
use crate::indexes::create_indexes;
use crate::job::{IngestionReport, RunContext, SalesIngestionJob};
use crate::transform::run_transform;

/// Steps of the daily sales pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    IngestSalesData,
    CreateIndex,
    BuildTransform,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::IngestSalesData => "ingest_sales_data",
            Step::CreateIndex => "create_index",
            Step::BuildTransform => "build_transform",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub skip_transform: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub ingestion: IngestionReport,
    pub indexes_ensured: usize,
    pub completed: Vec<Step>,
    pub transform_skipped: bool,
}

/// Runs ingest, index and transform in order under the configured deadline.
///
/// Only one run per destination table may be active; a second concurrent run fails with
/// `AlreadyRunning` instead of waiting. The first failing step stops the pipeline.
pub async fn run_pipeline(
    config: &ResolvedConfig,
    options: PipelineOptions,
    ctx: &RunContext,
) -> Result<PipelineReport> {
    match tokio::time::timeout(config.timeout, run_exclusive(config, options, ctx)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(run_id = %ctx.run_id, timeout = ?config.timeout, "Pipeline run timed out");
            Err(IngestError::Timeout(config.timeout))
        }
    }
}

async fn run_exclusive(
    config: &ResolvedConfig,
    options: PipelineOptions,
    ctx: &RunContext,
) -> Result<PipelineReport> {
    let destination = &config.job.destination;
    let pool = db::connect(&config.job.connection).await?;

    let lock = match AdvisoryLock::try_acquire(&pool, lock_key(destination)).await? {
        Some(lock) => lock,
        None => {
            pool.close().await;
            return Err(IngestError::AlreadyRunning(destination.to_string()));
        }
    };

    let result = run_steps(&pool, config, options, ctx).await;
    if let Err(err) = lock.release().await {
        warn!(run_id = %ctx.run_id, error = %err, "Failed to release pipeline lock");
    }
    pool.close().await;
    result
}

async fn run_steps(
    pool: &DbPool,
    config: &ResolvedConfig,
    options: PipelineOptions,
    ctx: &RunContext,
) -> Result<PipelineReport> {
    let mut completed = Vec::with_capacity(3);

    let job = SalesIngestionJob::new(config.job.clone());
    let ingestion = job
        .execute_with_pool(pool, ctx)
        .await
        .inspect_err(|_| halted(ctx, Step::IngestSalesData))?;
    completed.push(Step::IngestSalesData);

    let indexes_ensured = create_indexes(pool, &config.job.destination)
        .await
        .inspect_err(|_| halted(ctx, Step::CreateIndex))?;
    completed.push(Step::CreateIndex);

    if options.skip_transform {
        info!(run_id = %ctx.run_id, "Skipping transformation step");
    } else {
        run_transform(&config.transform)
            .await
            .inspect_err(|_| halted(ctx, Step::BuildTransform))?;
        completed.push(Step::BuildTransform);
    }

    info!(
        run_id = %ctx.run_id,
        steps = completed.len(),
        "Pipeline run finished"
    );

    Ok(PipelineReport {
        run_id: ctx.run_id,
        ingestion,
        indexes_ensured,
        completed,
        transform_skipped: options.skip_transform,
    })
}

fn halted(ctx: &RunContext, step: Step) {
    warn!(run_id = %ctx.run_id, step = step.as_str(), "Step failed; downstream steps will not run");
}

/// Advisory lock key for a destination, stable across processes.
pub fn lock_key(destination: &Destination) -> i64 {
    let hash = blake3::hash(destination.to_string().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    i64::from_be_bytes(bytes)
}

/// Session-level Postgres advisory lock held on a dedicated pooled connection.
struct AdvisoryLock {
    conn: Option<sqlx::pool::PoolConnection<sqlx::Postgres>>,
    key: i64,
}

impl AdvisoryLock {
    async fn try_acquire(pool: &DbPool, key: i64) -> Result<Option<Self>> {
        let mut conn = pool
            .acquire()
            .await
            .map_err(|source| IngestError::Connect { source })?;
        let acquired: bool = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(conn.as_mut())
            .await
            .map_err(|source| IngestError::Connect { source })?;

        if !acquired {
            return Ok(None);
        }
        Ok(Some(Self {
            conn: Some(conn),
            key,
        }))
    }

    async fn release(mut self) -> std::result::Result<(), sqlx::Error> {
        if let Some(mut conn) = self.conn.take() {
            sqlx::query::<sqlx::Postgres>("SELECT pg_advisory_unlock($1)")
                .bind(self.key)
                .execute(conn.as_mut())
                .await?;
        }
        Ok(())
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let key = self.key;
            task::spawn(async move {
                if let Err(err) = sqlx::query::<sqlx::Postgres>("SELECT pg_advisory_unlock($1)")
                    .bind(key)
                    .execute(conn.as_mut())
                    .await
                {
                    tracing::warn!("failed to release advisory lock in drop: {err}");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_stable_per_destination() {
        let sales = Destination::new("raw", "sales").unwrap();
        let returns = Destination::new("raw", "returns").unwrap();
        assert_eq!(lock_key(&sales), lock_key(&sales.clone()));
        assert_ne!(lock_key(&sales), lock_key(&returns));
    }
}
