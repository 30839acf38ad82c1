//! CSV export of sales history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::FromRow;

/// One exported document: a receipt or invoice reduced to its totals.
#[derive(Debug, Clone, FromRow)]
pub struct SalesRow {
    pub seller: String,
    pub country: String,
    pub transaction_time: DateTime<Utc>,
    pub currency: String,
    pub net_price: Decimal,
    pub total_tax: Decimal,
    pub gross_price: Decimal,
}

const HEADER: [&str; 7] = [
    "seller",
    "country",
    "transaction_time",
    "currency",
    "net_price",
    "total_tax",
    "gross_price",
];

/// Render the rows as CSV: header row first, one row per document.
pub fn write_csv(rows: &[SalesRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(HEADER)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to write CSV header: {}", e)))?;

    for row in rows {
        writer
            .write_record(&[
                row.seller.clone(),
                row.country.clone(),
                row.transaction_time.to_rfc3339(),
                row.currency.clone(),
                row.net_price.to_string(),
                row.total_tax.to_string(),
                row.gross_price.to_string(),
            ])
            .map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to write CSV row: {}", e))
            })?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to flush CSV: {}", e)))
}
