//! Invoice request/response types.

use super::companies::{AddressDto, CompanyResponse};
use super::{validate_nip, validate_non_negative, validate_pesel};
use crate::models::{
    CreateInvoice, CreateInvoicePrepayment, CreateInvoiceProduct, InvoicePrepayment,
    InvoiceProduct, InvoiceRecord, ListInvoicesFilter,
};
use crate::services::pricing::{self, TaxData};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InvoiceProductRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    #[validate(custom(function = validate_non_negative))]
    pub quantity: Decimal,
    #[validate(custom(function = validate_non_negative))]
    pub unit_price: Decimal,
    #[serde(default)]
    #[validate(custom(function = validate_non_negative))]
    pub discount_value: Decimal,
    #[validate(custom(function = validate_non_negative))]
    pub vat_tax: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InvoicePrepaymentRequest {
    #[validate(custom(function = validate_non_negative))]
    pub net_price: Decimal,
    #[validate(custom(function = validate_non_negative))]
    pub vat_tax: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_invoice_rules, skip_on_field_errors = false))]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, max = 150))]
    pub company_name: String,
    #[validate(length(min = 1, max = 150))]
    pub buyer_name: String,
    pub buyer_nip: Option<String>,
    pub buyer_pesel: Option<String>,
    #[validate(nested)]
    pub buyer_address: AddressDto,
    pub date_finished: NaiveDate,
    #[validate(length(min = 1, max = 10))]
    pub currency: String,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub is_prepayment: bool,
    pub previous_prepayment: Option<String>,
    #[validate(length(min = 1), nested)]
    pub products: Vec<InvoiceProductRequest>,
    #[serde(default)]
    #[validate(nested)]
    pub prepayments: Vec<InvoicePrepaymentRequest>,
}

/// Cross-field rules: the buyer carries exactly one of NIP/PESEL, and a
/// prepayment invoice carries at least one prepayment line.
fn validate_invoice_rules(request: &CreateInvoiceRequest) -> Result<(), ValidationError> {
    match (&request.buyer_nip, &request.buyer_pesel) {
        (Some(nip), None) => validate_nip(nip)?,
        (None, Some(pesel)) => validate_pesel(pesel)?,
        _ => {
            let mut error = ValidationError::new("buyer_identification");
            error.message = Some("Either nip or pesel must be included, never both".into());
            return Err(error);
        }
    }

    if request.is_prepayment && request.prepayments.is_empty() {
        let mut error = ValidationError::new("prepayments");
        error.message =
            Some("A prepayment invoice requires at least one prepayment line".into());
        return Err(error);
    }

    Ok(())
}

impl CreateInvoiceRequest {
    /// Convert a validated request into the storage input.
    pub fn into_input(self) -> CreateInvoice {
        CreateInvoice {
            company_name: self.company_name,
            buyer_name: self.buyer_name,
            buyer_nip: self.buyer_nip,
            buyer_pesel: self.buyer_pesel,
            buyer_address: self.buyer_address.into(),
            date_finished: self.date_finished,
            currency: self.currency,
            is_paid: self.is_paid,
            is_prepayment: self.is_prepayment,
            previous_prepayment: self.previous_prepayment,
            products: self
                .products
                .into_iter()
                .map(|product| CreateInvoiceProduct {
                    name: product.name,
                    unit: product.unit,
                    quantity: product.quantity,
                    unit_price: product.unit_price,
                    discount_value: product.discount_value,
                    vat_rate: product.vat_tax,
                })
                .collect(),
            prepayments: self
                .prepayments
                .into_iter()
                .map(|prepayment| CreateInvoicePrepayment {
                    net_price: prepayment.net_price,
                    vat_rate: prepayment.vat_tax,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InvoiceListParams {
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub finished_from: Option<NaiveDate>,
    pub finished_to: Option<NaiveDate>,
    pub is_prepayment: Option<bool>,
}

impl From<InvoiceListParams> for ListInvoicesFilter {
    fn from(params: InvoiceListParams) -> Self {
        Self {
            created_from: params.created_from,
            created_to: params.created_to,
            finished_from: params.finished_from,
            finished_to: params.finished_to,
            is_prepayment: params.is_prepayment,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceProductResponse {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_value: Decimal,
    pub vat_tax: Decimal,
    pub net_price: Decimal,
    pub tax_value: Decimal,
    pub gross_price: Decimal,
    pub total_discount_value: Decimal,
}

impl From<InvoiceProduct> for InvoiceProductResponse {
    fn from(product: InvoiceProduct) -> Self {
        Self {
            id: product.product_id,
            net_price: product.net_price(),
            tax_value: product.tax_value(),
            gross_price: product.gross_price(),
            total_discount_value: product.total_discount_value(),
            name: product.name,
            unit: product.unit,
            quantity: product.quantity,
            unit_price: product.unit_price,
            discount_value: product.discount_value,
            vat_tax: product.vat_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoicePrepaymentResponse {
    pub id: Uuid,
    pub net_price: Decimal,
    pub vat_tax: Decimal,
    pub tax_value: Decimal,
    pub gross_price: Decimal,
}

impl From<InvoicePrepayment> for InvoicePrepaymentResponse {
    fn from(prepayment: InvoicePrepayment) -> Self {
        Self {
            id: prepayment.prepayment_id,
            tax_value: prepayment.tax_value(),
            gross_price: prepayment.gross_price(),
            net_price: prepayment.net_price,
            vat_tax: prepayment.vat_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub company: CompanyResponse,
    pub buyer_name: String,
    pub buyer_nip: Option<String>,
    pub buyer_pesel: Option<String>,
    pub buyer_address: AddressDto,
    pub date_finished: NaiveDate,
    pub currency: String,
    pub is_paid: bool,
    pub is_prepayment: bool,
    pub previous_prepayment: Option<String>,
    pub date_created: DateTime<Utc>,
    pub products: Vec<InvoiceProductResponse>,
    pub prepayments: Vec<InvoicePrepaymentResponse>,
    pub net_price: Decimal,
    pub total_tax: Decimal,
    pub gross_price: Decimal,
    pub tax_data: TaxData,
    pub prepayments_data: Option<TaxData>,
}

impl From<InvoiceRecord> for InvoiceResponse {
    fn from(record: InvoiceRecord) -> Self {
        let tax_data = pricing::invoice_tax_data(&record.products);
        let prepayments_data = record
            .invoice
            .is_prepayment
            .then(|| pricing::prepayments_data(&record.prepayments));

        Self {
            id: record.invoice.invoice_id,
            invoice_number: record.invoice.invoice_number,
            company: CompanyResponse::from(record.company),
            buyer_name: record.invoice.buyer_name,
            buyer_nip: record.invoice.buyer_nip,
            buyer_pesel: record.invoice.buyer_pesel,
            buyer_address: AddressDto::from(record.buyer_address),
            date_finished: record.invoice.date_finished,
            currency: record.invoice.currency,
            is_paid: record.invoice.is_paid,
            is_prepayment: record.invoice.is_prepayment,
            previous_prepayment: record.invoice.previous_prepayment,
            date_created: record.invoice.created_utc,
            products: record
                .products
                .into_iter()
                .map(InvoiceProductResponse::from)
                .collect(),
            prepayments: record
                .prepayments
                .into_iter()
                .map(InvoicePrepaymentResponse::from)
                .collect(),
            net_price: record.invoice.net_price,
            total_tax: record.invoice.total_tax,
            gross_price: record.invoice.gross_price,
            tax_data,
            prepayments_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> AddressDto {
        AddressDto {
            street: "Teststreet".to_string(),
            building_number: "12".to_string(),
            post_code: "12-345".to_string(),
            city: "TestCity".to_string(),
            country: "Poland".to_string(),
        }
    }

    fn product() -> InvoiceProductRequest {
        InvoiceProductRequest {
            name: "Shelf".to_string(),
            unit: "pcs".to_string(),
            quantity: "10".parse().unwrap(),
            unit_price: "4.99".parse().unwrap(),
            discount_value: Decimal::ZERO,
            vat_tax: "23".parse().unwrap(),
        }
    }

    fn request() -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            company_name: "TestCompany".to_string(),
            buyer_name: "TestBuyer".to_string(),
            buyer_nip: Some("1234567890".to_string()),
            buyer_pesel: None,
            buyer_address: address(),
            date_finished: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            currency: "EUR".to_string(),
            is_paid: true,
            is_prepayment: false,
            previous_prepayment: None,
            products: vec![product()],
            prepayments: vec![],
        }
    }

    #[test]
    fn valid_invoice_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn buyer_with_both_identifiers_is_rejected() {
        let mut payload = request();
        payload.buyer_pesel = Some("12345678901".to_string());
        assert!(payload.validate().is_err());
    }

    #[test]
    fn buyer_with_neither_identifier_is_rejected() {
        let mut payload = request();
        payload.buyer_nip = None;
        assert!(payload.validate().is_err());
    }

    #[test]
    fn nine_digit_nip_is_rejected() {
        let mut payload = request();
        payload.buyer_nip = Some("123456789".to_string());
        assert!(payload.validate().is_err());
    }

    #[test]
    fn pesel_alone_is_accepted() {
        let mut payload = request();
        payload.buyer_nip = None;
        payload.buyer_pesel = Some("12345678901".to_string());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn prepayment_without_lines_is_rejected() {
        let mut payload = request();
        payload.is_prepayment = true;
        assert!(payload.validate().is_err());
    }

    #[test]
    fn prepayment_with_lines_passes() {
        let mut payload = request();
        payload.is_prepayment = true;
        payload.prepayments = vec![InvoicePrepaymentRequest {
            net_price: "200.00".parse().unwrap(),
            vat_tax: "23".parse().unwrap(),
        }];
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn empty_product_list_is_rejected() {
        let mut payload = request();
        payload.products = vec![];
        assert!(payload.validate().is_err());
    }
}
