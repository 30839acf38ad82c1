//! Receipt model for sales-service.

use super::address::{Address, CreateAddress};
use super::company::CompanyWithAddress;
use super::vat::VatClass;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A sales receipt. The print number is assigned at creation, restarts at 1
/// each calendar day per company, and is never reassigned or reused;
/// `receipt_number` mirrors it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Receipt {
    pub receipt_id: Uuid,
    pub company_id: Uuid,
    pub print_number: i32,
    pub receipt_number: i32,
    pub header: Option<String>,
    pub sales_point_address_id: Option<Uuid>,
    pub checkout_number: Option<String>,
    pub buyer_nip: Option<String>,
    pub currency: String,
    pub created_utc: DateTime<Utc>,
}

/// Line item on a receipt. Quantities carry up to three decimal places,
/// prices and discounts two.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReceiptProduct {
    pub product_id: Uuid,
    pub receipt_id: Uuid,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_class: String,
    pub discount_value: Decimal,
    pub sort_order: i32,
}

impl ReceiptProduct {
    /// Stored bracket letter as a `VatClass`. Creation-time validation makes
    /// a `None` unreachable for persisted rows.
    pub fn vat_class(&self) -> Option<VatClass> {
        VatClass::from_string(&self.vat_class)
    }

    /// Extended price before discount.
    pub fn price(&self) -> Decimal {
        (self.quantity * self.unit_price).round_dp(2)
    }

    /// Discount over the whole line.
    pub fn total_discount_value(&self) -> Decimal {
        (self.quantity * self.discount_value).round_dp(2)
    }

    /// Extended price after per-unit discount; this is the VAT-inclusive
    /// gross amount tax extraction operates on.
    pub fn full_price(&self) -> Decimal {
        (self.quantity * (self.unit_price - self.discount_value)).round_dp(2)
    }
}

/// A receipt with its lines and resolved addresses.
#[derive(Debug, Clone)]
pub struct ReceiptRecord {
    pub receipt: Receipt,
    pub products: Vec<ReceiptProduct>,
    pub company: CompanyWithAddress,
    pub sales_point: Option<Address>,
}

/// Input for creating a receipt line.
#[derive(Debug, Clone)]
pub struct CreateReceiptProduct {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_class: VatClass,
    pub discount_value: Decimal,
}

/// Input for creating a receipt.
#[derive(Debug, Clone)]
pub struct CreateReceipt {
    pub company_name: String,
    pub header: Option<String>,
    pub sales_point: Option<CreateAddress>,
    pub checkout_number: Option<String>,
    pub buyer_nip: Option<String>,
    pub currency: String,
    pub products: Vec<CreateReceiptProduct>,
}

/// Filter parameters for listing receipts.
#[derive(Debug, Clone, Default)]
pub struct ListReceiptsFilter {
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub currency: Option<String>,
    pub print_number_gte: Option<i32>,
    pub print_number_lte: Option<i32>,
    pub buyer_nip: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(quantity: &str, unit_price: &str, discount: &str) -> ReceiptProduct {
        ReceiptProduct {
            product_id: Uuid::new_v4(),
            receipt_id: Uuid::new_v4(),
            name: "Egg".to_string(),
            quantity: quantity.parse().unwrap(),
            unit_price: unit_price.parse().unwrap(),
            vat_class: "A".to_string(),
            discount_value: discount.parse().unwrap(),
            sort_order: 0,
        }
    }

    #[test]
    fn full_price_subtracts_discount_before_extension() {
        let line = product("3", "10.00", "1.50");
        assert_eq!(line.price(), Decimal::new(3000, 2));
        assert_eq!(line.total_discount_value(), Decimal::new(450, 2));
        assert_eq!(line.full_price(), Decimal::new(2550, 2));
    }

    #[test]
    fn fractional_quantity_rounds_to_cents() {
        let line = product("0.5", "0.99", "0");
        // 0.5 * 0.99 = 0.495, banker's rounding lands on 0.50
        assert_eq!(line.full_price(), Decimal::new(50, 2));
    }
}
