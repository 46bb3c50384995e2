use crate::domain::amount::Amount;
use crate::domain::endpoint::{Endpoint, EndpointId};
use crate::domain::method::PaymentMethod;
use crate::error::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Idempotency key attached to one accepted submission. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderReference(Uuid);

impl OrderReference {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OrderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    TerminalFailure,
}

/// One submission against one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub endpoint: EndpointId,
    /// 0-based position in the candidate list.
    pub index: usize,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Idle,
    Matching,
    Attempting(usize),
    AwaitingEvidence,
    Redirected,
    Confirmed,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    /// Forward-only moves. Returning to `Idle` goes through [`Order::reset`].
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (*self, next) {
            (Idle, Matching) => true,
            (Matching, Attempting(0) | AwaitingEvidence | Failed) => true,
            (Attempting(i), Attempting(j)) => j > i,
            (Attempting(_), Redirected | AwaitingEvidence | Failed) => true,
            (AwaitingEvidence | Redirected, Confirmed | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Attempting(i) => write!(f, "attempting({})", i),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A single funding request and its reconciliation state.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub amount: Amount,
    pub method: PaymentMethod,
    status: OrderStatus,
    pub endpoint: Option<Endpoint>,
    pub reference: Option<OrderReference>,
    pub attempts: Vec<Attempt>,
    pub evidence: Vec<String>,
}

impl Order {
    pub fn new(amount: Amount, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            status: OrderStatus::Idle,
            endpoint: None,
            reference: None,
            attempts: Vec::new(),
            evidence: Vec::new(),
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn transition(&mut self, next: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(RoutingError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(from = %self.status, to = %next, method = %self.method, "order transition");
        self.status = next;
        Ok(())
    }

    /// Back to `Idle` after a terminal failure, cancellation or confirmation.
    pub fn reset(&mut self) {
        self.status = OrderStatus::Idle;
        self.endpoint = None;
        self.reference = None;
        self.attempts.clear();
        self.evidence.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order::new(Amount::new(dec!(100)).unwrap(), PaymentMethod::Wechat)
    }

    #[test]
    fn test_forward_transitions() {
        let mut o = order();
        o.transition(OrderStatus::Matching).unwrap();
        o.transition(OrderStatus::Attempting(0)).unwrap();
        o.transition(OrderStatus::Attempting(1)).unwrap();
        o.transition(OrderStatus::Redirected).unwrap();
        o.transition(OrderStatus::Confirmed).unwrap();
        assert!(o.status().is_terminal());
    }

    #[test]
    fn test_backward_transitions_rejected() {
        let mut o = order();
        o.transition(OrderStatus::Matching).unwrap();
        o.transition(OrderStatus::Attempting(1)).unwrap_err();
        o.transition(OrderStatus::Attempting(0)).unwrap();
        o.transition(OrderStatus::Attempting(1)).unwrap();
        assert!(matches!(
            o.transition(OrderStatus::Attempting(1)),
            Err(RoutingError::InvalidTransition { .. })
        ));
        assert!(o.transition(OrderStatus::Matching).is_err());
        o.transition(OrderStatus::Failed).unwrap();
        assert!(o.transition(OrderStatus::Attempting(2)).is_err());
    }

    #[test]
    fn test_reset_clears_session_state() {
        let mut o = order();
        o.transition(OrderStatus::Matching).unwrap();
        o.transition(OrderStatus::AwaitingEvidence).unwrap();
        o.reference = Some(OrderReference::generate());
        o.evidence.push("https://cdn.example/proof.png".to_string());
        o.reset();
        assert_eq!(o.status(), OrderStatus::Idle);
        assert!(o.reference.is_none());
        assert!(o.evidence.is_empty());
        o.transition(OrderStatus::Matching).unwrap();
    }

    #[test]
    fn test_references_are_unique() {
        assert_ne!(OrderReference::generate(), OrderReference::generate());
    }
}
