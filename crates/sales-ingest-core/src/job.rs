// crates/sales-ingest-core/src/job.rs

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cleaning::{clean_frame, CleanBatch, CleaningReport};
use crate::config::JobConfig;
use crate::db::{self, DbPool};
use crate::error::Result;
use crate::extract::{read_sales_file, ExtractedFile};
use crate::load::insert_records;
use crate::prepare::{prepare_destination, PrepareOutcome};

/// Phases of one ingestion run. Runs move strictly forward; any error ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Start,
    Extracted,
    Cleaned,
    Prepared,
    Loaded,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Start => "start",
            JobState::Extracted => "extracted",
            JobState::Cleaned => "cleaned",
            JobState::Prepared => "prepared",
            JobState::Loaded => "loaded",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

/// Identity of the run a job executes under, supplied by whoever schedules it.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub run_id: Uuid,
    pub file: PathBuf,
    pub file_hash: String,
    pub file_size_bytes: usize,
    pub destination: String,
    pub cleaning: CleaningReport,
    pub prepare: PrepareOutcome,
    pub rows_inserted: u64,
    pub state: JobState,
    pub elapsed_ms: u64,
}

/// Loads one sales file into its destination table as a full-replace snapshot.
#[derive(Debug, Clone)]
pub struct SalesIngestionJob {
    config: JobConfig,
}

impl SalesIngestionJob {
    pub fn new(config: JobConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Extracts and cleans the file, then connects using the configured connection and
    /// stores the batch. A bad file fails the run before any connection is opened.
    pub async fn execute(&self, ctx: &RunContext) -> Result<IngestionReport> {
        let mut state = JobState::Start;
        let started = Instant::now();

        let outcome = self.connect_and_run(ctx, &mut state, started).await;
        finish(outcome, state, ctx)
    }

    /// Runs extract, clean, prepare and load in order against an existing pool.
    pub async fn execute_with_pool(&self, pool: &DbPool, ctx: &RunContext) -> Result<IngestionReport> {
        let mut state = JobState::Start;
        let started = Instant::now();

        let outcome = self.run_phases(pool, ctx, &mut state, started).await;
        finish(outcome, state, ctx)
    }

    async fn connect_and_run(
        &self,
        ctx: &RunContext,
        state: &mut JobState,
        started: Instant,
    ) -> Result<IngestionReport> {
        let staged = self.stage(ctx, state)?;
        let pool = db::connect(&self.config.connection).await?;
        let result = self.store(&pool, ctx, state, staged, started).await;
        pool.close().await;
        result
    }

    async fn run_phases(
        &self,
        pool: &DbPool,
        ctx: &RunContext,
        state: &mut JobState,
        started: Instant,
    ) -> Result<IngestionReport> {
        let staged = self.stage(ctx, state)?;
        self.store(pool, ctx, state, staged, started).await
    }

    fn stage(&self, ctx: &RunContext, state: &mut JobState) -> Result<Staged> {
        let JobConfig {
            data_file_path,
            destination,
            ..
        } = &self.config;

        info!(
            run_id = %ctx.run_id,
            file = %data_file_path.display(),
            destination = %destination,
            "Starting sales ingestion"
        );

        let extracted = read_sales_file(data_file_path)?;
        advance(state, JobState::Extracted, ctx);
        info!(
            run_id = %ctx.run_id,
            rows = extracted.frame.height(),
            hash = %extracted.content_hash,
            "Extracted sales file"
        );

        let batch = clean_frame(&extracted.frame)?;
        advance(state, JobState::Cleaned, ctx);
        info!(
            run_id = %ctx.run_id,
            rows_read = batch.report.rows_read,
            rows_kept = batch.report.rows_kept,
            duplicates_dropped = batch.report.duplicates_dropped,
            "Cleaned sales records"
        );
        if batch.report.repairs() > 0 {
            warn!(
                run_id = %ctx.run_id,
                numbers_defaulted = batch.report.numbers_defaulted,
                signs_flipped = batch.report.signs_flipped,
                dates_missing = batch.report.dates_missing,
                locations_defaulted = batch.report.locations_defaulted,
                "Repaired invalid values"
            );
        }

        Ok(Staged { extracted, batch })
    }

    async fn store(
        &self,
        pool: &DbPool,
        ctx: &RunContext,
        state: &mut JobState,
        staged: Staged,
        started: Instant,
    ) -> Result<IngestionReport> {
        let Staged { extracted, batch } = staged;
        let destination = &self.config.destination;

        let prepare = prepare_destination(pool, destination).await?;
        advance(state, JobState::Prepared, ctx);

        let rows_inserted = insert_records(pool, destination, &batch.records).await?;
        advance(state, JobState::Loaded, ctx);
        info!(run_id = %ctx.run_id, rows_inserted, "Loaded sales records");

        advance(state, JobState::Done, ctx);

        Ok(IngestionReport {
            run_id: ctx.run_id,
            file: self.config.data_file_path.clone(),
            file_hash: extracted.content_hash,
            file_size_bytes: extracted.size_bytes,
            destination: destination.to_string(),
            cleaning: batch.report,
            prepare,
            rows_inserted,
            state: *state,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// A file that has been extracted and cleaned but not yet written anywhere.
struct Staged {
    extracted: ExtractedFile,
    batch: CleanBatch,
}

fn finish(outcome: Result<IngestionReport>, mut state: JobState, ctx: &RunContext) -> Result<IngestionReport> {
    match outcome {
        Ok(report) => Ok(report),
        Err(err) => {
            let last = state;
            advance(&mut state, JobState::Failed, ctx);
            error!(
                run_id = %ctx.run_id,
                failed_after = last.as_str(),
                error = %err,
                "Sales ingestion failed"
            );
            Err(err)
        }
    }
}

fn advance(state: &mut JobState, next: JobState, ctx: &RunContext) {
    tracing::debug!(run_id = %ctx.run_id, from = state.as_str(), to = next.as_str(), "Job state change");
    *state = next;
}
