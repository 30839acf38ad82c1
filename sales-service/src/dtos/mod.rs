//! Request and response types for sales-service.

mod companies;
mod export;
mod invoices;
mod receipts;

pub use companies::{AddressDto, CompanyResponse, CreateCompanyRequest, UpdateCompanyRequest};
pub use export::{DocumentType, ExportParams};
pub use invoices::{
    CreateInvoiceRequest, InvoiceListParams, InvoicePrepaymentRequest, InvoicePrepaymentResponse,
    InvoiceProductRequest, InvoiceProductResponse, InvoiceResponse,
};
pub use receipts::{
    CreateReceiptRequest, ReceiptListParams, ReceiptProductRequest, ReceiptProductResponse,
    ReceiptResponse,
};

use rust_decimal::Decimal;
use validator::ValidationError;

/// Tax-registration numbers are exactly ten numeric characters.
pub(crate) fn validate_nip(nip: &str) -> Result<(), ValidationError> {
    validate_digits(nip, 10, "nip_number")
}

/// Personal identifiers are exactly eleven numeric characters.
pub(crate) fn validate_pesel(pesel: &str) -> Result<(), ValidationError> {
    validate_digits(pesel, 11, "pesel_number")
}

fn validate_digits(value: &str, digits: usize, code: &'static str) -> Result<(), ValidationError> {
    if value.len() == digits && value.chars().all(|c| c.is_ascii_digit()) {
        return Ok(());
    }
    let mut error = ValidationError::new(code);
    error.message = Some(format!("must be exactly {} numeric characters", digits).into());
    Err(error)
}

pub(crate) fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut error = ValidationError::new("non_negative");
        error.message = Some("must not be negative".into());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nip_requires_exactly_ten_digits() {
        assert!(validate_nip("1234567890").is_ok());
        assert!(validate_nip("123456789").is_err());
        assert!(validate_nip("12345678901").is_err());
        assert!(validate_nip("12345678ab").is_err());
    }

    #[test]
    fn pesel_requires_exactly_eleven_digits() {
        assert!(validate_pesel("12345678901").is_ok());
        assert!(validate_pesel("1234567890").is_err());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(validate_non_negative(&"0".parse().unwrap()).is_ok());
        assert!(validate_non_negative(&"12.34".parse().unwrap()).is_ok());
        assert!(validate_non_negative(&"-0.01".parse().unwrap()).is_err());
    }
}
