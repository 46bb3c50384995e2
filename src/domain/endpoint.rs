use crate::domain::method::PaymentMethod;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(pub String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive amount bounds; a missing side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl AmountRange {
    pub fn contains(&self, amount: Decimal) -> bool {
        self.min.is_none_or(|min| amount >= min) && self.max.is_none_or(|max| amount <= max)
    }
}

/// A backend-registered receiving account ("channel").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub method: PaymentMethod,
    pub name: String,
    /// Account identifiers shown to the payer (card number, holder, bank...).
    pub accounts: Vec<String>,
    /// Lower weight is preferred.
    pub sort_weight: i64,
    pub range: AmountRange,
}

impl Endpoint {
    pub fn new(id: impl Into<String>, method: PaymentMethod, sort_weight: i64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id: EndpointId(id),
            method,
            accounts: Vec::new(),
            sort_weight,
            range: AmountRange::default(),
        }
    }

    pub fn with_range(mut self, min: Option<Decimal>, max: Option<Decimal>) -> Self {
        self.range = AmountRange { min, max };
        self
    }

    pub fn accepts(&self, method: PaymentMethod, amount: Decimal) -> bool {
        self.method == method && self.range.contains(amount)
    }
}
