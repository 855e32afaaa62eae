//! Deserializers for storefront and webhook fields that arrive either as JSON
//! numbers or as strings. Unparseable values deserialize to `None` so the
//! caller's validation decides what a missing value means.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

use crate::services::orders::reais_to_cents;

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| Decimal::from_str(&n.to_string()).ok())
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => {
            let trimmed = s.trim();
            Decimal::from_str(trimmed)
                .ok()
                .or_else(|| trimmed.replace(',', ".").parse().ok())
        }
        _ => None,
    }
}

/// A decimal amount such as `25.9`, `"25.90"` or `"25,90"`.
pub fn decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_decimal))
}

/// A whole number of centavos; fractional input is rounded.
pub fn cents<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(as_decimal)
        .map(|amount| reais_to_cents(amount / Decimal::ONE_HUNDRED)))
}

/// A positive item count.
pub fn quantity<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(as_decimal)
        .and_then(|q| q.to_u32()))
}

/// An identifier that may be sent as a number.
pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "cents")]
        valor: Option<i64>,
        #[serde(default, deserialize_with = "decimal")]
        amount: Option<Decimal>,
        #[serde(default, deserialize_with = "quantity")]
        qty: Option<u32>,
        #[serde(default, deserialize_with = "string")]
        id: Option<String>,
    }

    fn probe(value: serde_json::Value) -> Probe {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn cents_accepts_numbers_and_strings() {
        assert_eq!(probe(json!({"valor": 5180})).valor, Some(5180));
        assert_eq!(probe(json!({"valor": "5180"})).valor, Some(5180));
        assert_eq!(probe(json!({"valor": 3234.0000000000005})).valor, Some(3234));
        assert_eq!(probe(json!({"valor": "abc"})).valor, None);
        assert_eq!(probe(json!({})).valor, None);
    }

    #[test]
    fn decimal_accepts_comma_separator() {
        assert_eq!(probe(json!({"amount": "25,90"})).amount, Some(dec!(25.90)));
        assert_eq!(probe(json!({"amount": 25.9})).amount, Some(dec!(25.9)));
        assert_eq!(probe(json!({"amount": null})).amount, None);
    }

    #[test]
    fn quantity_and_ids_tolerate_mixed_types() {
        let p = probe(json!({"qty": "3", "id": 42}));
        assert_eq!(p.qty, Some(3));
        assert_eq!(p.id.as_deref(), Some("42"));
        assert_eq!(probe(json!({"qty": -1})).qty, None);
        assert_eq!(probe(json!({"id": "  "})).id, None);
    }
}
