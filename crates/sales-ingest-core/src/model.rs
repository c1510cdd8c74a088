use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

pub const SALE_ID: &str = "SaleID";
pub const PRODUCT_ID: &str = "ProductID";
pub const PRODUCT_NAME: &str = "ProductName";
pub const BRAND: &str = "Brand";
pub const CATEGORY: &str = "Category";
pub const RETAILER_ID: &str = "RetailerID";
pub const RETAILER_NAME: &str = "RetailerName";
pub const CHANNEL: &str = "Channel";
pub const LOCATION: &str = "Location";
pub const QUANTITY: &str = "Quantity";
pub const PRICE: &str = "Price";
pub const DATE: &str = "Date";

/// The twelve columns every sales file must carry, in destination table order.
pub const SALES_COLUMNS: [&str; 12] = [
    SALE_ID,
    PRODUCT_ID,
    PRODUCT_NAME,
    BRAND,
    CATEGORY,
    RETAILER_ID,
    RETAILER_NAME,
    CHANNEL,
    LOCATION,
    QUANTITY,
    PRICE,
    DATE,
];

/// Columns the orchestrator indexes after a successful load, with the label used in
/// each index name.
pub const INDEXED_COLUMNS: [(&str, &str); 4] = [
    (PRODUCT_ID, "product"),
    (RETAILER_ID, "retailer"),
    (LOCATION, "location"),
    (DATE, "date"),
];

pub const LOCATION_DEFAULT: &str = "N/A";

/// One row exactly as it was read from the source file. `None` means the field was empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub sale_id: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub retailer_id: Option<String>,
    pub retailer_name: Option<String>,
    pub channel: Option<String>,
    pub location: Option<String>,
    pub quantity: Option<String>,
    pub price: Option<String>,
    pub date: Option<String>,
}

/// A sale after coercion, defaulting and sign normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaleRecord {
    #[serde(rename = "SaleID")]
    pub sale_id: i32,
    #[serde(rename = "ProductID")]
    pub product_id: i32,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "RetailerID")]
    pub retailer_id: i32,
    pub retailer_name: Option<String>,
    pub channel: Option<String>,
    pub location: String,
    pub quantity: i32,
    pub price: Decimal,
    pub date: Option<NaiveDate>,
}
