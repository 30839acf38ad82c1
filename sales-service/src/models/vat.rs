//! VAT bracket letters for receipt lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Letter-coded VAT bracket printed on receipts. Each bracket carries a
/// fixed gross-inclusive rate; `E` marks exempt lines that are never taxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VatClass {
    A,
    B,
    C,
    D,
    E,
}

impl VatClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VatClass::A => "A",
            VatClass::B => "B",
            VatClass::C => "C",
            VatClass::D => "D",
            VatClass::E => "E",
        }
    }

    /// Case-insensitive parse; anything outside A-E is rejected.
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Some(VatClass::A),
            "B" => Some(VatClass::B),
            "C" => Some(VatClass::C),
            "D" => Some(VatClass::D),
            "E" => Some(VatClass::E),
            _ => None,
        }
    }

    /// Gross-inclusive tax rate for the bracket; `None` for the exempt class.
    pub fn gross_rate(&self) -> Option<Decimal> {
        match self {
            VatClass::A => Some(Decimal::new(23, 2)),
            VatClass::B => Some(Decimal::new(8, 2)),
            VatClass::C => Some(Decimal::new(5, 2)),
            VatClass::D => Some(Decimal::ZERO),
            VatClass::E => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(VatClass::from_string("a"), Some(VatClass::A));
        assert_eq!(VatClass::from_string("B"), Some(VatClass::B));
        assert_eq!(VatClass::from_string("e"), Some(VatClass::E));
    }

    #[test]
    fn parse_rejects_unknown_letters() {
        assert_eq!(VatClass::from_string("F"), None);
        assert_eq!(VatClass::from_string(""), None);
        assert_eq!(VatClass::from_string("AB"), None);
    }

    #[test]
    fn rates_match_brackets() {
        assert_eq!(VatClass::A.gross_rate(), Some(Decimal::new(23, 2)));
        assert_eq!(VatClass::B.gross_rate(), Some(Decimal::new(8, 2)));
        assert_eq!(VatClass::C.gross_rate(), Some(Decimal::new(5, 2)));
        assert_eq!(VatClass::D.gross_rate(), Some(Decimal::ZERO));
        assert_eq!(VatClass::E.gross_rate(), None);
    }
}
