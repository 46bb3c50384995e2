use crate::application::gateway::Submission;
use crate::config::EngineConfig;
use crate::domain::endpoint::Endpoint;
use crate::domain::order::{Attempt, AttemptOutcome, Order, OrderStatus};
use crate::error::{Result, RoutingError};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Decides whether a submission failure may move on to the next candidate.
pub trait FailureClassifier: Send + Sync {
    fn is_retryable(&self, error: &RoutingError) -> bool;
}

/// Treats network failures, and rejections whose message contains one of the
/// configured fragments, as transient. Everything else is terminal.
///
/// The backend reports "no payment link" only as free text, so matching is on
/// message fragments. Changing the fragment list changes which channels get
/// failed over; keep it in sync with the backend owners.
#[derive(Debug, Clone)]
pub struct MessagePatternClassifier {
    patterns: Vec<String>,
}

impl MessagePatternClassifier {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

impl FailureClassifier for MessagePatternClassifier {
    fn is_retryable(&self, error: &RoutingError) -> bool {
        match error {
            RoutingError::Network(_) | RoutingError::RetryableChannel { .. } => true,
            RoutingError::TerminalChannel { message, .. } => {
                let message = message.to_lowercase();
                self.patterns.iter().any(|p| message.contains(p))
            }
            _ => false,
        }
    }
}

/// Cooperative cancellation signal shared between the host and a running match.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`CancelFlag::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Drives one order through a bounded, strictly sequential list of candidates.
///
/// `Idle -> Matching -> Attempting(0) -> ... -> Attempting(i)` and then one of
/// `Redirected`, `AwaitingEvidence` or `Failed`. At most
/// `min(candidates, max_retries)` attempts are made and only one is ever in
/// flight.
pub struct FailoverOrchestrator {
    classifier: Box<dyn FailureClassifier>,
    max_retries: usize,
    retry_delay: Duration,
}

impl FailoverOrchestrator {
    pub fn new(
        classifier: Box<dyn FailureClassifier>,
        max_retries: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            classifier,
            max_retries,
            retry_delay,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Box::new(MessagePatternClassifier::new(&config.retryable_patterns)),
            config.max_retries,
            config.retry_delay(),
        )
    }

    pub async fn run<F, Fut>(
        &self,
        order: &mut Order,
        candidates: Vec<Endpoint>,
        mut submit: F,
        cancel: &CancelFlag,
    ) -> Result<Submission>
    where
        F: FnMut(Endpoint) -> Fut,
        Fut: Future<Output = Result<Submission>>,
    {
        order.method.validate_amount(&order.amount)?;
        if cancel.is_cancelled() {
            order.reset();
            return Err(RoutingError::Cancelled);
        }
        order.transition(OrderStatus::Matching)?;

        let Some(first) = candidates.first() else {
            order.transition(OrderStatus::Failed)?;
            return Err(RoutingError::NoEligibleChannel {
                method: order.method,
                amount: order.amount.value(),
            });
        };

        // Manual settlement has nothing automatable to retry.
        if order.method.is_manual() {
            tracing::info!(endpoint = %first.id, method = %order.method, "awaiting manual evidence");
            order.endpoint = Some(first.clone());
            order.transition(OrderStatus::AwaitingEvidence)?;
            return Ok(Submission::EvidenceRequired);
        }

        let limit = candidates.len().min(self.max_retries);
        let mut last_error = None;

        for (index, endpoint) in candidates.into_iter().take(limit).enumerate() {
            if index > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.retry_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
            if cancel.is_cancelled() {
                tracing::info!(attempt = index, "match cancelled");
                order.reset();
                return Err(RoutingError::Cancelled);
            }

            order.transition(OrderStatus::Attempting(index))?;
            tracing::info!(attempt = index, endpoint = %endpoint.id, "submitting order");

            match submit(endpoint.clone()).await {
                Ok(submission) => {
                    order.attempts.push(Attempt {
                        endpoint: endpoint.id.clone(),
                        index,
                        outcome: AttemptOutcome::Success,
                    });
                    let next = match &submission {
                        Submission::Redirect(redirect) => {
                            order.reference = Some(redirect.reference);
                            OrderStatus::Redirected
                        }
                        Submission::EvidenceRequired => OrderStatus::AwaitingEvidence,
                    };
                    order.endpoint = Some(endpoint);
                    order.transition(next)?;
                    return Ok(submission);
                }
                Err(err) if self.classifier.is_retryable(&err) => {
                    let err = into_retryable(&endpoint, err);
                    tracing::warn!(attempt = index, endpoint = %endpoint.id, error = %err, "retryable channel failure");
                    order.attempts.push(Attempt {
                        endpoint: endpoint.id,
                        index,
                        outcome: AttemptOutcome::RetryableFailure,
                    });
                    last_error = Some(err);
                }
                Err(err) => {
                    tracing::error!(attempt = index, endpoint = %endpoint.id, error = %err, "terminal channel failure");
                    order.attempts.push(Attempt {
                        endpoint: endpoint.id,
                        index,
                        outcome: AttemptOutcome::TerminalFailure,
                    });
                    order.transition(OrderStatus::Failed)?;
                    return Err(err);
                }
            }
        }

        let attempts = order.attempts.len();
        tracing::error!(attempts, "all channels exhausted");
        order.transition(OrderStatus::Failed)?;
        Err(RoutingError::ChannelsExhausted {
            attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

/// Restates a failure the classifier let through as a transient channel failure.
fn into_retryable(endpoint: &Endpoint, err: RoutingError) -> RoutingError {
    match err {
        RoutingError::TerminalChannel { endpoint, message } => {
            RoutingError::RetryableChannel { endpoint, message }
        }
        RoutingError::Network(message) => RoutingError::RetryableChannel {
            endpoint: endpoint.id.clone(),
            message,
        },
        other => other,
    }
}
