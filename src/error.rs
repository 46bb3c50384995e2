use crate::domain::endpoint::EndpointId;
use crate::domain::method::PaymentMethod;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RoutingError>;

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("No eligible channel for {method} at amount {amount}")]
    NoEligibleChannel {
        method: PaymentMethod,
        amount: Decimal,
    },
    #[error("Channel {endpoint} failed transiently: {message}")]
    RetryableChannel {
        endpoint: EndpointId,
        message: String,
    },
    #[error("Channel {endpoint} failed: {message}")]
    TerminalChannel {
        endpoint: EndpointId,
        message: String,
    },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Backend rejected request: {0}")]
    Rejected(String),
    #[error("All channels exhausted after {attempts} attempt(s): {last_error}")]
    ChannelsExhausted { attempts: usize, last_error: String },
    #[error("Upload of evidence item {item} failed: {message}")]
    Upload { item: u64, message: String },
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Invalid order transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl RoutingError {
    /// Validation failures are detected locally and never reach a backend.
    pub fn is_validation(&self) -> bool {
        matches!(self, RoutingError::Validation(_))
    }
}

/// Failure reported by a backend collaborator (order or upload service).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Connectivity failure; the request may never have reached the backend.
    Network,
    /// The backend answered and refused the request.
    Rejected,
}

impl ServiceError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ServiceErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: ServiceErrorKind::Rejected,
            message: message.into(),
        }
    }
}
