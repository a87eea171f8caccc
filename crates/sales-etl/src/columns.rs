//! Column names of the sales transaction dataset.

pub const ORDER_ID: &str = "Order_ID";
pub const ORDER_DATE: &str = "Order_Date";
pub const REGION: &str = "Region";
pub const PRODUCT_LINE: &str = "Product_Line";
pub const GENDER_CATEGORY: &str = "Gender_Category";
pub const SIZE: &str = "Size";
pub const UNITS_SOLD: &str = "Units_Sold";
pub const MRP: &str = "MRP";
pub const DISCOUNT_APPLIED: &str = "Discount_Applied";
pub const PROFIT: &str = "Profit";
pub const REVENUE: &str = "Revenue";

// derived by the transformer
pub const LOSS_FLAG: &str = "Loss_Flag";
pub const ETL_TIMESTAMP: &str = "etl_timestamp";
pub const ETL_VERSION: &str = "etl_version";

/// Columns every input file must carry. `Revenue` is optional because it is
/// always recomputed.
pub const REQUIRED_INPUT_COLUMNS: [&str; 10] = [
    ORDER_ID,
    ORDER_DATE,
    REGION,
    PRODUCT_LINE,
    GENDER_CATEGORY,
    SIZE,
    UNITS_SOLD,
    MRP,
    DISCOUNT_APPLIED,
    PROFIT,
];

/// Columns that must never be null in a cleaned dataset.
pub const CRITICAL_COLUMNS: [&str; 4] = [ORDER_ID, ORDER_DATE, REGION, PRODUCT_LINE];

/// Columns forced to `Float64` by the numeric coercion step.
pub const NUMERIC_COLUMNS: [&str; 5] = [UNITS_SOLD, MRP, DISCOUNT_APPLIED, REVENUE, PROFIT];
