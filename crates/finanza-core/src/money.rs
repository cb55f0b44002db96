//! Money arithmetic
//!
//! Money is held as integer cents so that sums are exact: a balance is always
//! exactly income minus expenses. On the wire amounts are plain JSON numbers in
//! currency units (`1500`, `12.5`), which is what the browser front-end sends
//! and renders.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Signed amount in cents. 1 unit = 100 cents, so R$ 50,00 = 5000.
pub type Cents = i64;

/// Sum of many amounts. Wide enough that no list of bounded amounts can
/// overflow it.
pub type Total = i128;

/// Largest amount a single transaction may carry: 10 trillion units.
///
/// Amounts travel as f64 currency units on the wire and in the local slot.
/// Below 2^46 units the gap between adjacent f64 values is under one cent, so
/// every amount up to this bound renders and parses back to the same cents.
pub const MAX_AMOUNT_CENTS: Cents = 1_000_000_000_000_000;

/// Convert cents to currency units for serialization
pub fn cents_to_units(cents: impl Into<Total>) -> f64 {
    cents.into() as f64 / 100.0
}

/// Serde helper: serialize a total in cents as a number of currency units
pub fn serialize_units<S>(cents: &Total, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(cents_to_units(*cents))
}

/// Format cents as a human-readable decimal string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: impl Into<Total>) -> String {
    let cents = cents.into();
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a non-negative decimal string into cents.
///
/// Accepts "50", "50.", "12.5", ".50". Digits past the second decimal place are
/// truncated. Signs, exponents, separators and empty input are rejected.
pub fn parse_cents(input: &str) -> Result<Cents> {
    let trimmed = input.trim();
    let invalid = || Error::Validation(format!("Invalid amount: {:?}", input));

    if trimmed.starts_with('-') {
        return Err(Error::Validation(format!(
            "Amount must not be negative: {}",
            trimmed
        )));
    }

    let (units_str, decimal_str) = match trimmed.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (trimmed, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (units_str.is_empty() && decimal_str.is_empty())
        || !all_digits(units_str)
        || !all_digits(decimal_str)
    {
        return Err(invalid());
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| invalid())?
    };

    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        1 => decimal_str.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => decimal_str[..2].parse().map_err(|_| invalid())?,
    };

    units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .filter(|c| *c <= MAX_AMOUNT_CENTS)
        .ok_or_else(|| Error::Validation(format!("Amount out of range: {}", trimmed)))
}

/// A validated, non-negative transaction amount.
///
/// The sign of a transaction lives in its type, never in the amount, so this
/// type cannot hold a negative, non-finite or malformed value. It never exceeds
/// [`MAX_AMOUNT_CENTS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "AmountRepr", into = "f64")]
pub struct Amount(Cents);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const MAX: Amount = Amount(MAX_AMOUNT_CENTS);

    /// Build from cents, rejecting negative and out-of-range values
    pub fn from_cents(cents: Cents) -> Result<Self> {
        if cents < 0 {
            return Err(Error::Validation(format!(
                "Amount must not be negative: {}",
                format_cents(cents)
            )));
        }
        if cents > MAX_AMOUNT_CENTS {
            return Err(Error::Validation(format!(
                "Amount out of range: {}",
                format_cents(cents)
            )));
        }
        Ok(Self(cents))
    }

    /// Build from a decimal string such as "1500.00"
    pub fn parse(input: &str) -> Result<Self> {
        parse_cents(input).map(Self)
    }

    /// Build from a floating-point number of currency units
    pub fn from_units(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::Validation(format!("Invalid amount: {}", value)));
        }
        // f64's Display never uses exponent notation, so this round-trips
        // through the same parser as text input
        Self::parse(&value.to_string())
    }

    pub fn cents(self) -> Cents {
        self.0
    }

    pub fn as_units(self) -> f64 {
        cents_to_units(self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_cents(self.0))
    }
}

impl From<Amount> for f64 {
    fn from(amount: Amount) -> Self {
        amount.as_units()
    }
}

impl std::str::FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Accepted wire representations: a JSON number or a numeric string
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<AmountRepr> for Amount {
    type Error = Error;

    fn try_from(repr: AmountRepr) -> Result<Self> {
        match repr {
            AmountRepr::Number(n) => Amount::from_units(n),
            AmountRepr::Text(s) => Amount::parse(&s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5000), "50.00");
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(1), "0.01");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-5000), "-50.00");
        assert_eq!(format_cents(-1), "-0.01");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("50.00").unwrap(), 5000);
        assert_eq!(parse_cents("50").unwrap(), 5000);
        assert_eq!(parse_cents("12.5").unwrap(), 1250);
        assert_eq!(parse_cents(".50").unwrap(), 50);
        assert_eq!(parse_cents(" 7. ").unwrap(), 700);
        assert_eq!(parse_cents("100.999").unwrap(), 10099); // Truncates
    }

    #[test]
    fn test_parse_cents_invalid() {
        for input in ["", ".", "abc", "12.34.56", "1,50", "1e3", "-5", "+5", "12.-5"] {
            assert!(parse_cents(input).is_err(), "{:?} should be rejected", input);
        }
        assert!(parse_cents("99999999999999999999").is_err());
    }

    #[test]
    fn test_amount_bound() {
        assert_eq!(parse_cents("10000000000000").unwrap(), MAX_AMOUNT_CENTS);
        assert!(parse_cents("10000000000000.01").is_err());
        assert!(parse_cents("92233720368547758").is_err());

        assert_eq!(Amount::from_cents(MAX_AMOUNT_CENTS).unwrap(), Amount::MAX);
        assert!(matches!(
            Amount::from_cents(MAX_AMOUNT_CENTS + 1),
            Err(Error::Validation(_))
        ));
        assert!(Amount::from_cents(i64::MAX).is_err());
        assert!(Amount::from_units(1e13 + 1.0).is_err());
        assert!(serde_json::from_str::<Amount>("1e15").is_err());
    }

    #[test]
    fn test_amounts_near_bound_survive_units() {
        for cents in [
            MAX_AMOUNT_CENTS,
            MAX_AMOUNT_CENTS - 1,
            MAX_AMOUNT_CENTS - 99,
            999_999_999_999_901,
            123_456_789_012_345,
        ] {
            let amount = Amount::from_cents(cents).unwrap();
            assert_eq!(Amount::from_units(amount.as_units()).unwrap(), amount);

            let json = serde_json::to_string(&amount).unwrap();
            let back: Amount = serde_json::from_str(&json).unwrap();
            assert_eq!(back, amount, "{} via {}", cents, json);
        }
    }

    #[test]
    fn test_format_wide_totals() {
        let total: Total = Total::from(MAX_AMOUNT_CENTS) * 10_000;
        assert_eq!(format_cents(total), "100000000000000000.00");
        assert_eq!(format_cents(-total), "-100000000000000000.00");
    }

    #[test]
    fn test_amount_from_units() {
        assert_eq!(Amount::from_units(5000.0).unwrap().cents(), 500_000);
        assert_eq!(Amount::from_units(12.34).unwrap().cents(), 1234);
        assert_eq!(Amount::from_units(0.0).unwrap(), Amount::ZERO);
        assert!(Amount::from_units(-1.0).is_err());
        assert!(Amount::from_units(f64::NAN).is_err());
        assert!(Amount::from_units(f64::INFINITY).is_err());
    }

    #[test]
    fn test_amount_deserialize_number_or_string() {
        let a: Amount = serde_json::from_str("1500").unwrap();
        assert_eq!(a.cents(), 150_000);
        let b: Amount = serde_json::from_str("\"600.50\"").unwrap();
        assert_eq!(b.cents(), 60_050);
        assert!(serde_json::from_str::<Amount>("\"abc\"").is_err());
        assert!(serde_json::from_str::<Amount>("-3").is_err());
        assert!(serde_json::from_str::<Amount>("null").is_err());
    }

    #[test]
    fn test_amount_serializes_as_units() {
        let a = Amount::parse("12.5").unwrap();
        assert_eq!(serde_json::to_value(a).unwrap(), serde_json::json!(12.5));
    }
}
