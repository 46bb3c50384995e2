use crate::error::RoutingError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A positive funding amount.
///
/// Wraps `rust_decimal::Decimal` so that a zero or negative request can never
/// reach candidate matching or a backend call.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, RoutingError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(RoutingError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = RoutingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| RoutingError::Validation(format!("Invalid amount '{}': {}", s, e)))?;
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(RoutingError::Validation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(RoutingError::Validation(_))
        ));
    }

    #[test]
    fn test_amount_parse() {
        assert_eq!("100".parse::<Amount>().unwrap().value(), dec!(100));
        assert!("abc".parse::<Amount>().is_err());
        assert!("-5".parse::<Amount>().is_err());
    }

    #[test]
    fn test_amount_deserialize_rejects_non_positive() {
        let amount: Amount = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(amount.value(), dec!(12.5));
        assert!(serde_json::from_str::<Amount>("\"-3\"").is_err());
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
    }
}
