//! Invoice model for sales-service.

use super::address::{Address, CreateAddress};
use super::company::CompanyWithAddress;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A VAT invoice. The invoice number is assigned at creation
/// (`FV/<year>/<month>/<sequence>`, sequence restarts monthly per company)
/// and never changes; the price/tax aggregates are accumulated once at
/// creation and are read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub company_id: Uuid,
    pub invoice_number: String,
    pub buyer_name: String,
    pub buyer_nip: Option<String>,
    pub buyer_pesel: Option<String>,
    pub buyer_address_id: Uuid,
    pub date_finished: NaiveDate,
    pub currency: String,
    pub is_paid: bool,
    pub is_prepayment: bool,
    /// Number of the prior prepayment invoice this one settles. Stored as
    /// the display string, not a foreign key.
    pub previous_prepayment: Option<String>,
    pub net_price: Decimal,
    pub total_tax: Decimal,
    pub gross_price: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Line item on an invoice. Prices are net; the VAT rate is an explicit
/// percentage per line. `discount_value` is carried on the line but does
/// not enter `net_price` (unlike receipt lines, where the discount is
/// subtracted before extension).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceProduct {
    pub product_id: Uuid,
    pub invoice_id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_value: Decimal,
    pub vat_rate: Decimal,
    pub sort_order: i32,
}

impl InvoiceProduct {
    /// Extended net price; the discount field is not applied here.
    pub fn net_price(&self) -> Decimal {
        (self.quantity * self.unit_price).round_dp(2)
    }

    /// Discount over the whole line.
    pub fn total_discount_value(&self) -> Decimal {
        (self.quantity * self.discount_value).round_dp(2)
    }

    pub fn tax_value(&self) -> Decimal {
        (self.net_price() * (self.vat_rate / Decimal::ONE_HUNDRED)).round_dp(2)
    }

    /// Sum of the already-rounded net and tax figures; not re-rounded.
    pub fn gross_price(&self) -> Decimal {
        self.net_price() + self.tax_value()
    }
}

/// Advance-payment line on a prepayment invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoicePrepayment {
    pub prepayment_id: Uuid,
    pub invoice_id: Uuid,
    pub net_price: Decimal,
    pub vat_rate: Decimal,
    pub sort_order: i32,
}

impl InvoicePrepayment {
    pub fn tax_value(&self) -> Decimal {
        (self.net_price * (self.vat_rate / Decimal::ONE_HUNDRED)).round_dp(2)
    }

    pub fn gross_price(&self) -> Decimal {
        (self.net_price + self.tax_value()).round_dp(2)
    }
}

/// An invoice with its lines and resolved addresses.
#[derive(Debug, Clone)]
pub struct InvoiceRecord {
    pub invoice: Invoice,
    pub products: Vec<InvoiceProduct>,
    pub prepayments: Vec<InvoicePrepayment>,
    pub company: CompanyWithAddress,
    pub buyer_address: Address,
}

/// Input for creating an invoice line.
#[derive(Debug, Clone)]
pub struct CreateInvoiceProduct {
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_value: Decimal,
    pub vat_rate: Decimal,
}

/// Input for creating a prepayment line.
#[derive(Debug, Clone)]
pub struct CreateInvoicePrepayment {
    pub net_price: Decimal,
    pub vat_rate: Decimal,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub company_name: String,
    pub buyer_name: String,
    pub buyer_nip: Option<String>,
    pub buyer_pesel: Option<String>,
    pub buyer_address: CreateAddress,
    pub date_finished: NaiveDate,
    pub currency: String,
    pub is_paid: bool,
    pub is_prepayment: bool,
    pub previous_prepayment: Option<String>,
    pub products: Vec<CreateInvoiceProduct>,
    pub prepayments: Vec<CreateInvoicePrepayment>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub finished_from: Option<NaiveDate>,
    pub finished_to: Option<NaiveDate>,
    pub is_prepayment: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(quantity: &str, unit_price: &str, vat_rate: &str) -> InvoiceProduct {
        InvoiceProduct {
            product_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            name: "Shelf".to_string(),
            unit: "pcs".to_string(),
            quantity: quantity.parse().unwrap(),
            unit_price: unit_price.parse().unwrap(),
            discount_value: Decimal::ZERO,
            vat_rate: vat_rate.parse().unwrap(),
            sort_order: 0,
        }
    }

    #[test]
    fn net_tax_gross_for_23_percent() {
        let line = product("10", "4.99", "23");
        assert_eq!(line.net_price(), Decimal::new(4990, 2));
        assert_eq!(line.tax_value(), Decimal::new(1148, 2));
        assert_eq!(line.gross_price(), Decimal::new(6138, 2));
    }

    #[test]
    fn discount_does_not_enter_net_price() {
        let mut line = product("10", "4.99", "23");
        line.discount_value = Decimal::new(100, 2);
        assert_eq!(line.net_price(), Decimal::new(4990, 2));
        assert_eq!(line.total_discount_value(), Decimal::new(1000, 2));
    }

    #[test]
    fn prepayment_gross_is_rounded_sum() {
        let prepayment = InvoicePrepayment {
            prepayment_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            net_price: Decimal::new(10000, 2),
            vat_rate: Decimal::new(2300, 2),
            sort_order: 0,
        };
        assert_eq!(prepayment.tax_value(), Decimal::new(2300, 2));
        assert_eq!(prepayment.gross_price(), Decimal::new(12300, 2));
    }
}
