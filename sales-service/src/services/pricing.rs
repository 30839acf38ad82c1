//! Tax and price aggregation for sales-service.
//!
//! Receipts decompose VAT-inclusive gross prices across letter-coded
//! brackets; invoices add percentage VAT on top of net prices. Both are
//! pure folds over the line sequence producing immutable result records.

use crate::models::{InvoicePrepayment, InvoiceProduct, ReceiptProduct};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate figures for a receipt.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptTotals {
    /// Sum of line `full_price` across all lines, taxed or exempt.
    pub gross_price: Decimal,
    /// Bracket letter to summed line tax. Brackets without lines are
    /// absent, and the exempt bracket `E` never appears.
    pub tax_values: BTreeMap<String, Decimal>,
    pub total_tax: Decimal,
}

/// Per-rate slice of an invoice's tax breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct RateBreakdown {
    pub total_net_price: Decimal,
    pub tax_value: Decimal,
    pub total_gross_price: Decimal,
}

/// Aggregate figures for an invoice (or its prepayment lines), with a
/// secondary breakdown keyed by the numeric VAT rate.
#[derive(Debug, Clone, Serialize)]
pub struct TaxData {
    pub total_net_price: Decimal,
    pub total_tax_value: Decimal,
    pub rates: BTreeMap<String, RateBreakdown>,
}

/// Receipt aggregation. Tax extraction treats each line's `full_price` as
/// VAT-inclusive gross: `tax = round(full - full / (1 + rate), 2)`.
/// Exempt lines (and any line whose stored letter no longer parses) count
/// toward the gross total only.
pub fn receipt_totals(products: &[ReceiptProduct]) -> ReceiptTotals {
    let mut gross_price = Decimal::ZERO;
    let mut tax_values: BTreeMap<String, Decimal> = BTreeMap::new();

    for product in products {
        let full_price = product.full_price();
        gross_price += full_price;

        let Some(class) = product.vat_class() else {
            continue;
        };
        let Some(rate) = class.gross_rate() else {
            continue;
        };
        let tax = (full_price - full_price / (Decimal::ONE + rate)).round_dp(2);
        *tax_values
            .entry(class.as_str().to_string())
            .or_insert(Decimal::ZERO) += tax;
    }

    let total_tax = tax_values
        .values()
        .copied()
        .sum::<Decimal>()
        .round_dp(2);

    ReceiptTotals {
        gross_price,
        tax_values,
        total_tax,
    }
}

/// Invoice aggregation over product lines.
pub fn invoice_tax_data(products: &[InvoiceProduct]) -> TaxData {
    fold_rate_lines(
        products
            .iter()
            .map(|p| (p.vat_rate, p.net_price(), p.tax_value(), p.gross_price())),
    )
}

/// Prepayment aggregation; same shape as [`invoice_tax_data`], sourced from
/// the advance-payment lines.
pub fn prepayments_data(prepayments: &[InvoicePrepayment]) -> TaxData {
    fold_rate_lines(
        prepayments
            .iter()
            .map(|p| (p.vat_rate, p.net_price, p.tax_value(), p.gross_price())),
    )
}

/// Bucket key for a numeric VAT rate; normalization keeps `23` and `23.00`
/// in one bucket.
fn rate_key(rate: Decimal) -> String {
    rate.normalize().to_string()
}

fn fold_rate_lines(lines: impl Iterator<Item = (Decimal, Decimal, Decimal, Decimal)>) -> TaxData {
    let mut total_net_price = Decimal::ZERO;
    let mut total_tax_value = Decimal::ZERO;
    let mut rates: BTreeMap<String, RateBreakdown> = BTreeMap::new();

    for (rate, net, tax, gross) in lines {
        total_net_price += net;
        total_tax_value += tax;

        let slot = rates.entry(rate_key(rate)).or_insert(RateBreakdown {
            total_net_price: Decimal::ZERO,
            tax_value: Decimal::ZERO,
            total_gross_price: Decimal::ZERO,
        });
        slot.total_net_price += net;
        slot.tax_value += tax;
        slot.total_gross_price += gross;
    }

    TaxData {
        total_net_price,
        total_tax_value,
        rates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn receipt_product(
        name: &str,
        quantity: &str,
        unit_price: &str,
        vat_class: &str,
    ) -> ReceiptProduct {
        ReceiptProduct {
            product_id: Uuid::new_v4(),
            receipt_id: Uuid::new_v4(),
            name: name.to_string(),
            quantity: quantity.parse().unwrap(),
            unit_price: unit_price.parse().unwrap(),
            vat_class: vat_class.to_string(),
            discount_value: Decimal::ZERO,
            sort_order: 0,
        }
    }

    fn invoice_product(quantity: &str, unit_price: &str, vat_rate: &str) -> InvoiceProduct {
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

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn tax_extraction_is_vat_inclusive() {
        // full_price 100.00 in bracket A: 100 - 100/1.23 = 18.70
        let lines = vec![receipt_product("Item", "1", "100.00", "A")];
        let totals = receipt_totals(&lines);
        assert_eq!(totals.gross_price, dec("100.00"));
        assert_eq!(totals.tax_values["A"], dec("18.70"));
        assert_eq!(totals.total_tax, dec("18.70"));
    }

    #[test]
    fn example_receipt_totals() {
        let lines = vec![
            receipt_product("Egg", "5", "1", "A"),
            receipt_product("Apple", "100", "0.95", "B"),
        ];
        let totals = receipt_totals(&lines);
        assert_eq!(totals.gross_price, dec("100.00"));
        assert_eq!(totals.tax_values["B"], dec("7.04"));
        assert_eq!(totals.tax_values["A"], dec("0.93"));
        assert_eq!(totals.total_tax, dec("7.97"));
    }

    #[test]
    fn exempt_lines_count_toward_gross_only() {
        let lines = vec![
            receipt_product("Book", "1", "50.00", "E"),
            receipt_product("Pen", "1", "10.00", "A"),
        ];
        let totals = receipt_totals(&lines);
        assert_eq!(totals.gross_price, dec("60.00"));
        assert!(!totals.tax_values.contains_key("E"));
        assert_eq!(totals.total_tax, totals.tax_values["A"]);
    }

    #[test]
    fn zero_rate_bracket_appears_with_zero_tax() {
        let lines = vec![receipt_product("Bread", "2", "4.00", "D")];
        let totals = receipt_totals(&lines);
        assert_eq!(totals.tax_values["D"], Decimal::ZERO);
        assert_eq!(totals.total_tax, Decimal::ZERO);
    }

    #[test]
    fn brackets_without_lines_are_absent() {
        let lines = vec![receipt_product("Pen", "1", "10.00", "A")];
        let totals = receipt_totals(&lines);
        assert_eq!(totals.tax_values.len(), 1);
        assert!(totals.tax_values.contains_key("A"));
    }

    #[test]
    fn lowercase_bracket_letters_still_aggregate() {
        // Submission normalizes to uppercase; the aggregator is equally
        // forgiving about stored case.
        let lines = vec![receipt_product("Pen", "1", "12.30", "a")];
        let totals = receipt_totals(&lines);
        assert!(totals.tax_values.contains_key("A"));
    }

    #[test]
    fn invoice_tax_is_net_exclusive() {
        let lines = vec![invoice_product("10", "4.99", "23")];
        let data = invoice_tax_data(&lines);
        assert_eq!(data.total_net_price, dec("49.90"));
        assert_eq!(data.total_tax_value, dec("11.48"));
        let slice = &data.rates["23"];
        assert_eq!(slice.total_net_price, dec("49.90"));
        assert_eq!(slice.tax_value, dec("11.48"));
        assert_eq!(slice.total_gross_price, dec("61.38"));
    }

    #[test]
    fn invoice_rates_bucket_by_numeric_rate() {
        let lines = vec![
            invoice_product("10", "4.99", "23"),
            invoice_product("2", "10.99", "23.00"),
            invoice_product("1", "100.00", "8"),
        ];
        let data = invoice_tax_data(&lines);
        // 23 and 23.00 share a bucket
        assert_eq!(data.rates.len(), 2);
        let slice = &data.rates["23"];
        assert_eq!(slice.total_net_price, dec("71.88"));
        assert_eq!(data.rates["8"].tax_value, dec("8.00"));
    }

    #[test]
    fn prepayments_share_the_tax_data_shape() {
        let prepayments = vec![InvoicePrepayment {
            prepayment_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            net_price: dec("200.00"),
            vat_rate: dec("23"),
            sort_order: 0,
        }];
        let data = prepayments_data(&prepayments);
        assert_eq!(data.total_net_price, dec("200.00"));
        assert_eq!(data.total_tax_value, dec("46.00"));
        assert_eq!(data.rates["23"].total_gross_price, dec("246.00"));
    }

    #[test]
    fn empty_line_lists_produce_zero_totals() {
        let totals = receipt_totals(&[]);
        assert_eq!(totals.gross_price, Decimal::ZERO);
        assert!(totals.tax_values.is_empty());

        let data = invoice_tax_data(&[]);
        assert_eq!(data.total_net_price, Decimal::ZERO);
        assert!(data.rates.is_empty());
    }
}
