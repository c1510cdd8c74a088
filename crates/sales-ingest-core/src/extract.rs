// crates/sales-ingest-core/src/extract.rs

use std::io::Cursor;
use std::path::Path;

use blake3::Hasher;
use polars::prelude::*;
use tracing::debug;

use crate::error::{CleaningError, Result};
use crate::model::{self, RawRecord};

/// A sales file as loaded from disk.
#[derive(Debug)]
pub struct ExtractedFile {
    pub frame: DataFrame,
    pub content_hash: String,
    pub size_bytes: usize,
}

/// Reads a delimited file with a header row into a `DataFrame` of text columns.
///
/// Column names are taken verbatim from the header line. Reading the bytes happens before
/// polars sees them so that a missing or unreadable path surfaces as the plain I/O error.
pub fn read_sales_file(path: &Path) -> Result<ExtractedFile> {
    let contents = std::fs::read(path)?;
    let size_bytes = contents.len();
    let content_hash = compute_hash(&contents);
    let frame = read_sales_bytes(contents)?;

    debug!(
        path = %path.display(),
        rows = frame.height(),
        columns = frame.width(),
        hash = %content_hash,
        "Read sales file"
    );
    Ok(ExtractedFile {
        frame,
        content_hash,
        size_bytes,
    })
}

/// Parses in-memory file contents the same way [`read_sales_file`] does.
pub fn read_sales_bytes(contents: Vec<u8>) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(contents))
        .finish()?;
    Ok(df)
}

fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}

/// Converts a frame that already passed the column check into raw rows.
pub fn raw_records(df: &DataFrame) -> std::result::Result<Vec<RawRecord>, CleaningError> {
    let columns = model::SALES_COLUMNS
        .iter()
        .map(|&name| text_column(df, name))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let text = columns
        .iter()
        .zip(model::SALES_COLUMNS)
        .map(|(column, name)| {
            column
                .str()
                .map_err(|source| CleaningError::Column { column: name, source })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Only empty fields are missing; literal markers such as `NA` or `null` are data.
    let field = |col: usize, idx: usize| -> Option<String> {
        text[col]
            .get(idx)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let records = (0..df.height())
        .map(|idx| RawRecord {
            sale_id: field(0, idx),
            product_id: field(1, idx),
            product_name: field(2, idx),
            brand: field(3, idx),
            category: field(4, idx),
            retailer_id: field(5, idx),
            retailer_name: field(6, idx),
            channel: field(7, idx),
            location: field(8, idx),
            quantity: field(9, idx),
            price: field(10, idx),
            date: field(11, idx),
        })
        .collect();

    Ok(records)
}

fn text_column(df: &DataFrame, name: &'static str) -> std::result::Result<Column, CleaningError> {
    df.column(name)
        .and_then(|column| column.cast(&DataType::String))
        .map_err(|source| CleaningError::Column { column: name, source })
}
