use std::fmt;

use crate::error::{IngestError, Result};

/// Postgres truncates identifiers beyond this many bytes.
const MAX_IDENTIFIER_BYTES: usize = 63;

/// The schema-qualified table a run writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    schema: String,
    table: String,
}

impl Destination {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let table = table.into();
        validate_identifier("schema", &schema)?;
        validate_identifier("table", &table)?;
        Ok(Self { schema, table })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `"schema"."table"`, safe to splice into DDL and DML.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_identifier(&self.schema), quote_identifier(&self.table))
    }

    /// Name of a secondary index, e.g. `raw_sales_product_index` for label `product`.
    pub fn index_name(&self, label: &str) -> String {
        let name = format!("{}_{}_{}_index", self.schema, self.table, label);
        truncate_to_boundary(&name, MAX_IDENTIFIER_BYTES).to_string()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Wraps an identifier in double quotes, doubling any embedded quote.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(IngestError::config(format!("{kind} name must not be empty")));
    }
    if value.len() > MAX_IDENTIFIER_BYTES {
        return Err(IngestError::config(format!(
            "{kind} name '{value}' is longer than {MAX_IDENTIFIER_BYTES} bytes"
        )));
    }
    if value.chars().any(|c| c == '\0' || c.is_control()) {
        return Err(IngestError::config(format!(
            "{kind} name '{}' contains control characters",
            value.escape_debug()
        )));
    }
    Ok(())
}

fn truncate_to_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
