//! Document numbering for sales-service.
//!
//! Pure decision logic: the database layer reads the most recent document
//! for the company inside the creation transaction and feeds it through
//! these functions, so two concurrent creations serialize on the storage
//! layer's transaction isolation.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use service_core::error::AppError;

/// Numbering-relevant fields of the company's most recent receipt.
#[derive(Debug, Clone)]
pub struct LastReceipt {
    pub created_utc: DateTime<Utc>,
    pub print_number: i32,
}

/// Numbering-relevant fields of the company's most recent invoice.
#[derive(Debug, Clone)]
pub struct LastInvoice {
    pub created_utc: DateTime<Utc>,
    pub invoice_number: String,
}

/// Next print number for a receipt created today: continues the sequence
/// while the last receipt is from the same calendar day, otherwise 1.
pub fn next_print_number(last: Option<&LastReceipt>, today: NaiveDate) -> i32 {
    match last {
        Some(last) if last.created_utc.date_naive() == today => last.print_number + 1,
        _ => 1,
    }
}

/// Next invoice number, formatted `FV/<year>/<month>/<sequence>`. The
/// sequence continues within the creation month of the last invoice and
/// restarts at 1 in a new month (or year, or for the first invoice).
pub fn next_invoice_number(
    last: Option<&LastInvoice>,
    today: NaiveDate,
) -> Result<String, AppError> {
    let mut sequence = 1;
    if let Some(last) = last {
        let created = last.created_utc.date_naive();
        if created.year() == today.year() && created.month() == today.month() {
            sequence = parse_sequence(&last.invoice_number)? + 1;
        }
    }
    Ok(format!("FV/{}/{}/{}", today.year(), today.month(), sequence))
}

/// Trailing sequence component of a stored invoice number. Invoice numbers
/// are write-once, so a parse failure means corrupted prior state.
fn parse_sequence(invoice_number: &str) -> Result<i32, AppError> {
    invoice_number
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse::<i32>().ok())
        .ok_or_else(|| {
            AppError::Consistency(anyhow::anyhow!(
                "stored invoice number {:?} does not end in a numeric sequence",
                invoice_number
            ))
        })
}
