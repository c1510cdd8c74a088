use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use sales_ingest_core::{
    cleaning::{clean_frame, CleaningReport},
    config::{self, ResolvedConfig},
    db,
    extract::read_sales_file,
    indexes,
    job::{RunContext, SalesIngestionJob},
    pipeline::{self, PipelineOptions},
    transform,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Daily sales ingestion pipeline", long_about = None)]
struct Cli {
    /// Path to the pipeline configuration file
    #[arg(long, global = true, default_value = "sales-ingest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run ingest, index creation and transformation in order
    Run(RunArgs),
    /// Load the sales file into the destination table
    Ingest,
    /// Create the destination table's secondary indexes
    CreateIndexes,
    /// Invoke the downstream transformation tool
    Transform,
    /// Extract and clean a sales file without touching the database
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Stop after the index step
    #[arg(long)]
    skip_transform: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Sales file to inspect (defaults to the configured data file)
    file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(&cli.config, args).await,
        Command::Ingest => handle_ingest(&cli.config).await,
        Command::CreateIndexes => handle_create_indexes(&cli.config).await,
        Command::Transform => handle_transform(&cli.config).await,
        Command::Inspect(args) => handle_inspect(&cli.config, args),
    }
}

fn resolve_config(path: &Path) -> Result<ResolvedConfig> {
    let config = config::load_config(path)?;
    config
        .resolve()
        .with_context(|| format!("failed to resolve configuration from {}", path.display()))
}

async fn handle_run(config_path: &Path, args: RunArgs) -> Result<()> {
    let config = resolve_config(config_path)?;
    let ctx = RunContext::new();
    let options = PipelineOptions {
        skip_transform: args.skip_transform,
    };

    let report = pipeline::run_pipeline(&config, options, &ctx)
        .await
        .context("sales pipeline run failed")?;
    print_json(&report)
}

async fn handle_ingest(config_path: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;
    let job = SalesIngestionJob::new(config.job);
    let report = job
        .execute(&RunContext::new())
        .await
        .context("ingest_sales_data failed")?;
    print_json(&report)
}

async fn handle_create_indexes(config_path: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;
    let pool = db::connect(&config.job.connection).await?;
    let count = indexes::create_indexes(&pool, &config.job.destination)
        .await
        .context("create_index failed")?;
    pool.close().await;
    info!(count, "Indexes ensured");
    Ok(())
}

async fn handle_transform(config_path: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;
    transform::run_transform(&config.transform)
        .await
        .context("build_transform failed")
}

fn handle_inspect(config_path: &Path, args: InspectArgs) -> Result<()> {
    let path = match args.file {
        Some(path) => path,
        None => resolve_config(config_path)?.job.data_file_path,
    };

    let extracted = read_sales_file(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let batch = clean_frame(&extracted.frame)
        .with_context(|| format!("{} did not pass cleaning", path.display()))?;

    println!("{}", summary_table(&path, &extracted.content_hash, &batch.report));
    Ok(())
}

fn summary_table(path: &Path, hash: &str, report: &CleaningReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["File".to_string(), path.display().to_string()]);
    table.add_row(vec!["BLAKE3".to_string(), hash.to_string()]);
    table.add_row(vec!["Rows read".to_string(), report.rows_read.to_string()]);
    table.add_row(vec!["Rows kept".to_string(), report.rows_kept.to_string()]);
    table.add_row(vec![
        "Duplicates dropped".to_string(),
        report.duplicates_dropped.to_string(),
    ]);
    table.add_row(vec![
        "Numbers defaulted to 0".to_string(),
        report.numbers_defaulted.to_string(),
    ]);
    table.add_row(vec![
        "Negative values flipped".to_string(),
        report.signs_flipped.to_string(),
    ]);
    table.add_row(vec![
        "Missing dates".to_string(),
        report.dates_missing.to_string(),
    ]);
    table.add_row(vec![
        "Locations set to N/A".to_string(),
        report.locations_defaulted.to_string(),
    ]);
    table
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
