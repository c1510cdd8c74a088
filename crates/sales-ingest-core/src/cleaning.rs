// crates/sales-ingest-core/src/cleaning.rs

use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use polars::prelude::DataFrame;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::dates::parse_flexible_date;
use crate::error::{CleaningError, IngestError, Result};
use crate::extract::raw_records;
use crate::model::{RawRecord, SaleRecord, LOCATION_DEFAULT, SALES_COLUMNS};

const PRICE_SCALE: u32 = 2;

/// Largest magnitude a `decimal(18,2)` column can hold.
fn price_ceiling() -> Decimal {
    Decimal::new(9_999_999_999_999_999_99, PRICE_SCALE)
}

/// Counts of every repair applied while cleaning one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub duplicates_dropped: usize,
    pub numbers_defaulted: usize,
    pub signs_flipped: usize,
    pub dates_missing: usize,
    pub locations_defaulted: usize,
}

impl CleaningReport {
    pub fn repairs(&self) -> usize {
        self.numbers_defaulted + self.signs_flipped + self.dates_missing + self.locations_defaulted
    }
}

#[derive(Debug)]
pub struct CleanBatch {
    pub records: Vec<SaleRecord>,
    pub report: CleaningReport,
}

/// Fails with `SchemaMismatch` unless the header names form exactly the twelve sales columns.
pub fn check_columns<'a, I>(names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: BTreeSet<&str> = names.into_iter().collect();
    let expected: BTreeSet<&str> = SALES_COLUMNS.into_iter().collect();

    if present == expected {
        return Ok(());
    }

    Err(IngestError::SchemaMismatch {
        missing: expected.difference(&present).map(|s| s.to_string()).collect(),
        unexpected: present.difference(&expected).map(|s| s.to_string()).collect(),
    })
}

/// Validates the column set of an extracted frame and cleans every row.
pub fn clean_frame(df: &DataFrame) -> Result<CleanBatch> {
    check_columns(df.get_column_names().into_iter().map(|name| name.as_str()))?;
    let raw = raw_records(df)?;
    Ok(clean_records(raw)?)
}

/// Coerces, repairs and de-duplicates raw rows. The first row seen for a SaleID wins.
pub fn clean_records(raw: Vec<RawRecord>) -> std::result::Result<CleanBatch, CleaningError> {
    let mut report = CleaningReport {
        rows_read: raw.len(),
        ..CleaningReport::default()
    };
    let mut seen = HashSet::with_capacity(raw.len());
    let mut records = Vec::with_capacity(raw.len());

    for (row, record) in raw.into_iter().enumerate() {
        let sale_id = parse_sale_id(row + 1, record.sale_id.as_deref())?;
        if !seen.insert(sale_id) {
            report.duplicates_dropped += 1;
            continue;
        }

        let product_id = coerce_whole(record.product_id.as_deref()).tally(&mut report);
        let retailer_id = coerce_whole(record.retailer_id.as_deref()).tally(&mut report);
        let quantity = coerce_whole(record.quantity.as_deref()).tally(&mut report);
        let price = coerce_price(record.price.as_deref()).tally(&mut report);

        let date = record.date.as_deref().and_then(parse_flexible_date);
        if date.is_none() {
            report.dates_missing += 1;
        }

        let location = match record.location {
            Some(location) => location,
            None => {
                report.locations_defaulted += 1;
                LOCATION_DEFAULT.to_string()
            }
        };

        records.push(SaleRecord {
            sale_id,
            product_id,
            product_name: record.product_name,
            brand: record.brand,
            category: record.category,
            retailer_id,
            retailer_name: record.retailer_name,
            channel: record.channel,
            location,
            quantity,
            price,
            date,
        });
    }

    report.rows_kept = records.len();
    Ok(CleanBatch { records, report })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coerced<T> {
    pub value: T,
    pub defaulted: bool,
    pub sign_flipped: bool,
}

impl<T: Default> Coerced<T> {
    fn missing() -> Self {
        Self {
            value: T::default(),
            defaulted: true,
            sign_flipped: false,
        }
    }
}

impl<T> Coerced<T> {
    fn tally(self, report: &mut CleaningReport) -> T {
        if self.defaulted {
            report.numbers_defaulted += 1;
        }
        if self.sign_flipped {
            report.signs_flipped += 1;
        }
        self.value
    }
}

/// Parses a whole number, truncating any fraction. Unparseable, missing or out-of-range
/// values become 0; negative values become their magnitude.
pub fn coerce_whole(value: Option<&str>) -> Coerced<i32> {
    let Some(number) = value.and_then(parse_number) else {
        return Coerced::missing();
    };

    let whole = number.trunc();
    match whole.abs().to_i32() {
        Some(magnitude) => Coerced {
            value: magnitude,
            defaulted: false,
            sign_flipped: whole.is_sign_negative() && !whole.is_zero(),
        },
        None => Coerced::missing(),
    }
}

/// Parses a price, keeping two fractional digits (half away from zero). Unparseable,
/// missing or out-of-range values become 0.00; negative values become their magnitude.
pub fn coerce_price(value: Option<&str>) -> Coerced<Decimal> {
    let Some(number) = value.and_then(parse_number) else {
        return zero_price();
    };

    let mut price = number
        .abs()
        .round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    if price > price_ceiling() {
        return zero_price();
    }
    price.rescale(PRICE_SCALE);

    Coerced {
        value: price,
        defaulted: false,
        sign_flipped: number.is_sign_negative() && !number.is_zero(),
    }
}

fn zero_price() -> Coerced<Decimal> {
    let mut zero = Decimal::ZERO;
    zero.rescale(PRICE_SCALE);
    Coerced {
        value: zero,
        ..Coerced::missing()
    }
}

fn parse_number(value: &str) -> Option<Decimal> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

fn parse_sale_id(row: usize, value: Option<&str>) -> std::result::Result<i32, CleaningError> {
    let value = value.map(str::trim).filter(|v| !v.is_empty());
    let Some(value) = value else {
        return Err(CleaningError::MissingSaleId { row });
    };

    if let Ok(id) = value.parse::<i32>() {
        return Ok(id);
    }

    parse_number(value)
        .filter(|number| number.fract().is_zero())
        .and_then(|number| number.to_i32())
        .ok_or_else(|| CleaningError::InvalidSaleId {
            row,
            value: value.to_string(),
        })
}
