use crate::domain::amount::Amount;
use crate::domain::endpoint::{Endpoint, EndpointId};
use crate::domain::method::PaymentMethod;
use crate::domain::order::OrderReference;
use crate::domain::ports::{EvidenceSubmission, OrderServiceBox, SubmitRequest, SubmitResponse};
use crate::error::{Result, RoutingError, ServiceError, ServiceErrorKind};

/// Message used when the upstream accepted an order but sent no payment link.
pub const NO_REDIRECT_URL: &str = "no redirect URL returned by upstream";

#[derive(Debug, Clone, PartialEq)]
pub struct RedirectResult {
    pub reference: OrderReference,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Redirect(RedirectResult),
    EvidenceRequired,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderAccepted {
    pub reference: OrderReference,
}

/// Wraps the backend order API.
///
/// Each successful call mints exactly one fresh [`OrderReference`]; a failed
/// call's reference is dropped with it.
pub struct OrderSubmissionGateway {
    service: OrderServiceBox,
}

impl OrderSubmissionGateway {
    pub fn new(service: OrderServiceBox) -> Self {
        Self { service }
    }

    pub async fn submit(
        &self,
        endpoint: &Endpoint,
        amount: &Amount,
        method: PaymentMethod,
    ) -> Result<Submission> {
        method.validate_amount(amount)?;
        if !endpoint.accepts(method, amount.value()) {
            return Err(RoutingError::Validation(format!(
                "Endpoint {} does not accept {} {}",
                endpoint.id, method, amount
            )));
        }

        let request = SubmitRequest {
            reference: OrderReference::generate(),
            endpoint: endpoint.id.clone(),
            amount: *amount,
            method,
        };

        let response = self
            .service
            .submit(&request)
            .await
            .map_err(|e| channel_error(&endpoint.id, e))?;

        match response {
            SubmitResponse::Redirect { url: Some(url) } if !url.trim().is_empty() => {
                Ok(Submission::Redirect(RedirectResult {
                    reference: request.reference,
                    url,
                }))
            }
            SubmitResponse::Redirect { .. } => Err(RoutingError::TerminalChannel {
                endpoint: endpoint.id.clone(),
                message: NO_REDIRECT_URL.to_string(),
            }),
            SubmitResponse::EvidenceRequired => Ok(Submission::EvidenceRequired),
        }
    }

    pub async fn submit_with_evidence(
        &self,
        endpoint: &Endpoint,
        amount: &Amount,
        method: PaymentMethod,
        last_four: Option<&str>,
        evidence_urls: &[String],
    ) -> Result<OrderAccepted> {
        method.validate_amount(amount)?;
        if evidence_urls.is_empty() {
            return Err(RoutingError::Validation(
                "At least one proof of payment is required".to_string(),
            ));
        }
        method.validate_card_suffix(last_four)?;

        let submission = EvidenceSubmission {
            reference: OrderReference::generate(),
            endpoint: endpoint.id.clone(),
            amount: *amount,
            method,
            last_four: last_four.map(str::to_string),
            evidence_urls: evidence_urls.to_vec(),
        };

        self.service
            .submit_with_evidence(&submission)
            .await
            .map_err(|e| channel_error(&endpoint.id, e))?;

        tracing::info!(
            endpoint = %endpoint.id,
            reference = %submission.reference,
            evidence = evidence_urls.len(),
            "manual order accepted"
        );
        Ok(OrderAccepted {
            reference: submission.reference,
        })
    }

    pub async fn confirm(&self, reference: OrderReference, remark: &str) -> Result<()> {
        self.service
            .confirm(reference, remark)
            .await
            .map_err(service_error)
    }

    pub async fn refresh_redirect(&self, reference: OrderReference) -> Result<String> {
        match self.service.refresh_redirect(reference).await {
            Ok(Some(url)) if !url.trim().is_empty() => Ok(url),
            Ok(_) => Err(RoutingError::Unsupported(format!(
                "redirect refresh for order {}",
                reference
            ))),
            Err(e) => Err(service_error(e)),
        }
    }
}

fn channel_error(endpoint: &EndpointId, err: ServiceError) -> RoutingError {
    match err.kind {
        ServiceErrorKind::Network => RoutingError::Network(err.message),
        ServiceErrorKind::Rejected => RoutingError::TerminalChannel {
            endpoint: endpoint.clone(),
            message: err.message,
        },
    }
}

fn service_error(err: ServiceError) -> RoutingError {
    match err.kind {
        ServiceErrorKind::Network => RoutingError::Network(err.message),
        ServiceErrorKind::Rejected => RoutingError::Rejected(err.message),
    }
}
