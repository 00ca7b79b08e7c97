//! Import a receipt parsed by the OCR service.
//!
//! The OCR service returns amounts in major units as JSON numbers:
//!
//! ```json
//! { "total": 1200.0, "items": [{ "name": "Soda", "price": 200.0, "quantity": 2 }] }
//! ```

use serde::Deserialize;

use crate::error::InputError;
use crate::money::Money;
use crate::types::ParsedItem;

#[derive(Debug, Deserialize)]
struct ReceiptDocument {
    total: f64,
    #[serde(default)]
    items: Vec<ReceiptLine>,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReceiptLine {
    name: String,
    price: f64,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// A receipt converted to minor units, ready to become a bill.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub total: Money,
    pub items: Vec<ParsedItem>,
    pub image_url: Option<String>,
}

pub fn parse_receipt(json: &str) -> Result<Receipt, InputError> {
    let document: ReceiptDocument =
        serde_json::from_str(json).map_err(|e| InputError::InvalidReceipt(e.to_string()))?;

    let total = to_money(document.total, "total")?;
    let items = document
        .items
        .into_iter()
        .map(|line| {
            let price = to_money(line.price, &line.name)?;
            Ok(ParsedItem::new(line.name.trim(), price, line.quantity))
        })
        .collect::<Result<Vec<_>, InputError>>()?;

    Ok(Receipt {
        total,
        items,
        image_url: document.image_url,
    })
}

/// Convert a major-unit amount to minor units, rounding to the nearest unit.
fn to_money(amount: f64, what: &str) -> Result<Money, InputError> {
    let minor_units = (amount * 100.0).round();
    if !minor_units.is_finite() || minor_units < 0.0 || minor_units >= i64::MAX as f64 {
        return Err(InputError::InvalidReceipt(format!(
            "invalid amount {amount} for {what}"
        )));
    }
    Ok(Money::from_minor(minor_units as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_receipt() -> anyhow::Result<()> {
        let json = r#"{
            "total": 1200.0,
            "items": [
                { "name": "Jollof Rice", "price": 500.0, "quantity": 1 },
                { "name": "Soda", "price": 200.0, "quantity": 2 },
                { "name": "Chin chin", "price": 3.1 }
            ],
            "image_url": "receipts/abc.jpg"
        }"#;
        let receipt = parse_receipt(json)?;

        assert_eq!(receipt.total, Money::from_minor(120000));
        assert_eq!(
            receipt.items,
            vec![
                ParsedItem::new("Jollof Rice", Money::from_minor(50000), 1),
                ParsedItem::new("Soda", Money::from_minor(20000), 2),
                ParsedItem::new("Chin chin", Money::from_minor(310), 1),
            ]
        );
        assert_eq!(receipt.image_url.as_deref(), Some("receipts/abc.jpg"));
        Ok(())
    }

    #[test]
    fn test_parse_receipt_without_items() -> anyhow::Result<()> {
        let receipt = parse_receipt(r#"{ "total": 28.5 }"#)?;
        assert_eq!(receipt.total, Money::from_minor(2850));
        assert!(receipt.items.is_empty());
        assert_eq!(receipt.image_url, None);
        Ok(())
    }

    #[test]
    fn test_parse_receipt_errors() {
        assert!(parse_receipt("not json").is_err());
        assert!(parse_receipt(r#"{ "items": [] }"#).is_err());
        assert!(parse_receipt(r#"{ "total": -5 }"#).is_err());
        assert!(parse_receipt(r#"{ "total": 5, "items": [{ "name": "x" }] }"#).is_err());
    }

    #[test]
    fn test_amount_bounds() -> anyhow::Result<()> {
        // Rounds to exactly 2^63 minor units, one past `i64::MAX`.
        assert!(matches!(
            parse_receipt(r#"{ "total": 92233720368547758.08 }"#),
            Err(InputError::InvalidReceipt(_))
        ));
        assert!(parse_receipt(r#"{ "total": 1e300 }"#).is_err());

        let receipt = parse_receipt(r#"{ "total": 10000000000000000 }"#)?;
        assert_eq!(receipt.total, Money::from_minor(1_000_000_000_000_000_000));
        Ok(())
    }
}
