//! Receipt request/response types.

use super::companies::{AddressDto, CompanyResponse};
use super::{validate_nip, validate_non_negative};
use crate::models::{
    CreateReceipt, CreateReceiptProduct, ListReceiptsFilter, ReceiptProduct, ReceiptRecord,
    VatClass,
};
use crate::services::pricing;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_vat_type(vat_type: &str) -> Result<(), ValidationError> {
    if VatClass::from_string(vat_type).is_some() {
        return Ok(());
    }
    let mut error = ValidationError::new("vat_type");
    error.message = Some("Invalid vat type, must be either A, B, C, D or E".into());
    Err(error)
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ReceiptProductRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(custom(function = validate_non_negative))]
    pub quantity: Decimal,
    #[validate(custom(function = validate_non_negative))]
    pub unit_price: Decimal,
    #[validate(custom(function = validate_vat_type))]
    pub vat_type: String,
    #[serde(default)]
    #[validate(custom(function = validate_non_negative))]
    pub discount_value: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReceiptRequest {
    #[validate(length(min = 1, max = 150))]
    pub company_name: String,
    #[validate(length(max = 50))]
    pub header: Option<String>,
    #[validate(nested)]
    pub sales_point: Option<AddressDto>,
    pub checkout_number: Option<String>,
    #[validate(custom(function = validate_nip))]
    pub buyer_nip: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub currency: String,
    #[validate(length(min = 1), nested)]
    pub products: Vec<ReceiptProductRequest>,
}

impl CreateReceiptRequest {
    /// Convert a validated request into the storage input, normalizing
    /// bracket letters to uppercase.
    pub fn into_input(self) -> Result<CreateReceipt, AppError> {
        let products = self
            .products
            .into_iter()
            .map(|product| {
                let vat_class = VatClass::from_string(&product.vat_type).ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "Invalid vat type, must be either A, B, C, D or E"
                    ))
                })?;
                Ok(CreateReceiptProduct {
                    name: product.name,
                    quantity: product.quantity,
                    unit_price: product.unit_price,
                    vat_class,
                    discount_value: product.discount_value,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(CreateReceipt {
            company_name: self.company_name,
            header: self.header,
            sales_point: self.sales_point.map(Into::into),
            checkout_number: self.checkout_number,
            buyer_nip: self.buyer_nip,
            currency: self.currency,
            products,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReceiptListParams {
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub currency: Option<String>,
    pub print_number_gte: Option<i32>,
    pub print_number_lte: Option<i32>,
    pub buyer_nip: Option<String>,
}

impl From<ReceiptListParams> for ListReceiptsFilter {
    fn from(params: ReceiptListParams) -> Self {
        Self {
            created_from: params.created_from,
            created_to: params.created_to,
            currency: params.currency,
            print_number_gte: params.print_number_gte,
            print_number_lte: params.print_number_lte,
            buyer_nip: params.buyer_nip,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptProductResponse {
    pub id: Uuid,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_type: String,
    pub discount_value: Decimal,
    pub price: Decimal,
    pub total_discount_value: Decimal,
    pub full_price: Decimal,
}

impl From<ReceiptProduct> for ReceiptProductResponse {
    fn from(product: ReceiptProduct) -> Self {
        Self {
            id: product.product_id,
            price: product.price(),
            total_discount_value: product.total_discount_value(),
            full_price: product.full_price(),
            name: product.name,
            quantity: product.quantity,
            unit_price: product.unit_price,
            vat_type: product.vat_class,
            discount_value: product.discount_value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptResponse {
    pub id: Uuid,
    pub print_number: i32,
    pub receipt_number: i32,
    pub header: Option<String>,
    pub company: CompanyResponse,
    pub sales_point: Option<AddressDto>,
    pub checkout_number: Option<String>,
    pub buyer_nip: Option<String>,
    pub currency: String,
    pub date_created: DateTime<Utc>,
    pub products: Vec<ReceiptProductResponse>,
    pub gross_price: Decimal,
    pub tax_values: BTreeMap<String, Decimal>,
    pub total_tax: Decimal,
}

impl From<ReceiptRecord> for ReceiptResponse {
    fn from(record: ReceiptRecord) -> Self {
        let totals = pricing::receipt_totals(&record.products);
        Self {
            id: record.receipt.receipt_id,
            print_number: record.receipt.print_number,
            receipt_number: record.receipt.receipt_number,
            header: record.receipt.header,
            company: CompanyResponse::from(record.company),
            sales_point: record.sales_point.map(AddressDto::from),
            checkout_number: record.receipt.checkout_number,
            buyer_nip: record.receipt.buyer_nip,
            currency: record.receipt.currency,
            date_created: record.receipt.created_utc,
            products: record
                .products
                .into_iter()
                .map(ReceiptProductResponse::from)
                .collect(),
            gross_price: totals.gross_price,
            tax_values: totals.tax_values,
            total_tax: totals.total_tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(vat_type: &str) -> ReceiptProductRequest {
        ReceiptProductRequest {
            name: "Egg".to_string(),
            quantity: "5".parse().unwrap(),
            unit_price: "1".parse().unwrap(),
            vat_type: vat_type.to_string(),
            discount_value: Decimal::ZERO,
        }
    }

    fn request(products: Vec<ReceiptProductRequest>) -> CreateReceiptRequest {
        CreateReceiptRequest {
            company_name: "TestCompany".to_string(),
            header: None,
            sales_point: None,
            checkout_number: None,
            buyer_nip: None,
            currency: "PLN".to_string(),
            products,
        }
    }

    #[test]
    fn unknown_vat_type_fails_validation() {
        assert!(request(vec![product("F")]).validate().is_err());
    }

    #[test]
    fn lowercase_vat_type_is_accepted_and_normalized() {
        let payload = request(vec![product("a")]);
        assert!(payload.validate().is_ok());
        let input = payload.into_input().unwrap();
        assert_eq!(input.products[0].vat_class, VatClass::A);
    }

    #[test]
    fn empty_product_list_fails_validation() {
        assert!(request(vec![]).validate().is_err());
    }

    #[test]
    fn negative_quantity_fails_validation() {
        let mut line = product("A");
        line.quantity = "-1".parse().unwrap();
        assert!(request(vec![line]).validate().is_err());
    }

    #[test]
    fn nine_digit_buyer_nip_fails_validation() {
        let mut payload = request(vec![product("A")]);
        payload.buyer_nip = Some("123456789".to_string());
        assert!(payload.validate().is_err());
    }
}
