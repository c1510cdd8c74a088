// crates/sales-ingest-core/src/error.rs

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The catalog-mutating steps of destination preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepStep {
    CreateSchema,
    CreateTable,
    Truncate,
}

impl fmt::Display for PrepStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PrepStep::CreateSchema => "create schema",
            PrepStep::CreateTable => "create table",
            PrepStep::Truncate => "truncate table",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum CleaningError {
    #[error("row {row}: SaleID is missing")]
    MissingSaleId { row: usize },

    #[error("row {row}: SaleID '{value}' is not a 32-bit integer")]
    InvalidSaleId { row: usize, value: String },

    #[error("column {column} could not be read as text: {source}")]
    Column {
        column: &'static str,
        #[source]
        source: polars::error::PolarsError,
    },
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("sales file could not be parsed: {0}")]
    Extract(#[from] polars::error::PolarsError),

    #[error("CSV file schema is incorrect (missing: {missing:?}, unexpected: {unexpected:?})")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("missing values and type conversion failed")]
    CleaningFailed {
        #[from]
        source: CleaningError,
    },

    #[cfg(feature = "runtime")]
    #[error("database preparation failed during {step}")]
    DbPrepFailed {
        step: PrepStep,
        #[source]
        source: sqlx::Error,
    },

    #[cfg(feature = "runtime")]
    #[error("insert into database failed")]
    InsertFailed {
        #[source]
        source: sqlx::Error,
    },

    #[cfg(feature = "runtime")]
    #[error("index creation failed")]
    IndexFailed {
        #[source]
        source: sqlx::Error,
    },

    #[cfg(feature = "runtime")]
    #[error("could not connect to the database")]
    Connect {
        #[source]
        source: sqlx::Error,
    },

    #[error("could not launch transformation tool '{program}'")]
    TransformSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transformation step failed: {0}")]
    TransformFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("run exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("another pipeline run holds the lock for {0}")]
    AlreadyRunning(String),
}

impl IngestError {
    pub fn config(message: impl Into<String>) -> Self {
        IngestError::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
