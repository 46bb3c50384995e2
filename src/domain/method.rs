use crate::domain::amount::Amount;
use crate::error::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a successful submission is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The backend hands out an external payment page.
    Redirect,
    /// The payer transfers manually and uploads proof of payment.
    ManualEvidence,
}

/// Per-method behaviour. Adding a method means adding a policy row, not a branch.
#[derive(Debug, Clone, Copy)]
pub struct MethodPolicy {
    /// First match in a session is weight-ordered, later matches are uniformly random.
    pub sticky: bool,
    pub settlement: Settlement,
    /// Manual submissions must carry the last four digits of the paying card.
    pub requires_card_suffix: bool,
    pub validate: fn(&Amount) -> Result<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Alipay,
    Wechat,
    UnionPay,
    BankCard,
}

const WALLET_POLICY: MethodPolicy = MethodPolicy {
    sticky: true,
    settlement: Settlement::Redirect,
    requires_card_suffix: false,
    validate: validate_cents,
};

const UNION_PAY_POLICY: MethodPolicy = MethodPolicy {
    sticky: false,
    settlement: Settlement::Redirect,
    requires_card_suffix: false,
    validate: validate_cents,
};

const BANK_CARD_POLICY: MethodPolicy = MethodPolicy {
    sticky: false,
    settlement: Settlement::ManualEvidence,
    requires_card_suffix: true,
    validate: validate_cents,
};

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Alipay,
        PaymentMethod::Wechat,
        PaymentMethod::UnionPay,
        PaymentMethod::BankCard,
    ];

    pub fn policy(&self) -> &'static MethodPolicy {
        match self {
            PaymentMethod::Alipay | PaymentMethod::Wechat => &WALLET_POLICY,
            PaymentMethod::UnionPay => &UNION_PAY_POLICY,
            PaymentMethod::BankCard => &BANK_CARD_POLICY,
        }
    }

    pub fn is_sticky(&self) -> bool {
        self.policy().sticky
    }

    pub fn is_manual(&self) -> bool {
        self.policy().settlement == Settlement::ManualEvidence
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Alipay => "alipay",
            PaymentMethod::Wechat => "wechat",
            PaymentMethod::UnionPay => "union_pay",
            PaymentMethod::BankCard => "bank_card",
        }
    }

    /// Runs the method's amount rules.
    pub fn validate_amount(&self, amount: &Amount) -> Result<()> {
        (self.policy().validate)(amount)
    }

    /// Checks the card suffix for methods that need one.
    pub fn validate_card_suffix(&self, last_four: Option<&str>) -> Result<()> {
        if !self.policy().requires_card_suffix {
            return Ok(());
        }
        match last_four {
            Some(digits) if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) => {
                Ok(())
            }
            Some(_) => Err(RoutingError::Validation(
                "Card suffix must be exactly 4 digits".to_string(),
            )),
            None => Err(RoutingError::Validation(format!(
                "{} requires the last 4 digits of the paying card",
                self
            ))),
        }
    }
}

fn validate_cents(amount: &Amount) -> Result<()> {
    if amount.value().normalize().scale() > 2 {
        return Err(RoutingError::Validation(
            "Amount must have at most 2 decimal places".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == key)
            .ok_or_else(|| RoutingError::Validation(format!("Unknown payment method: {}", s)))
    }
}
