use super::amount::Amount;
use super::endpoint::{Endpoint, EndpointId};
use super::evidence::{LocalFile, PreviewHandle};
use super::method::PaymentMethod;
use super::order::OrderReference;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use std::sync::Arc;

/// Read-only list of receiving endpoints, fetched once per screen entry.
#[async_trait]
pub trait EndpointDirectory: Send + Sync {
    async fn list(&self, method: Option<PaymentMethod>) -> Result<Vec<Endpoint>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub reference: OrderReference,
    pub endpoint: EndpointId,
    pub amount: Amount,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResponse {
    /// The backend created a hosted payment page. `url` is `None` when the
    /// upstream answered without a link.
    Redirect { url: Option<String> },
    /// The channel settles manually; the payer must upload evidence.
    EvidenceRequired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceSubmission {
    pub reference: OrderReference,
    pub endpoint: EndpointId,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub last_four: Option<String>,
    pub evidence_urls: Vec<String>,
}

/// Backend order API.
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> std::result::Result<SubmitResponse, ServiceError>;

    async fn submit_with_evidence(
        &self,
        submission: &EvidenceSubmission,
    ) -> std::result::Result<(), ServiceError>;

    /// Attaches a remark to an order after the payer acknowledged payment.
    /// Must be idempotent.
    async fn confirm(
        &self,
        reference: OrderReference,
        remark: &str,
    ) -> std::result::Result<(), ServiceError>;

    /// Renews an expired payment link. `None` means the backend cannot.
    async fn refresh_redirect(
        &self,
        _reference: OrderReference,
    ) -> std::result::Result<Option<String>, ServiceError> {
        Ok(None)
    }
}

#[async_trait]
pub trait UploadService: Send + Sync {
    /// Returns the remote URL of the stored file.
    async fn upload(&self, file: &LocalFile) -> std::result::Result<String, ServiceError>;
}

/// Session-scoped "has this method matched before" markers.
#[async_trait]
pub trait SessionFlags: Send + Sync {
    async fn get(&self, method: PaymentMethod) -> bool;
    async fn set(&self, method: PaymentMethod);
    async fn clear(&self);
}

/// Creates and releases local previews of selected files.
pub trait PreviewRenderer: Send + Sync {
    fn create(&self, file: &LocalFile) -> PreviewHandle;
    fn release(&self, handle: PreviewHandle);
}

pub type EndpointDirectoryBox = Box<dyn EndpointDirectory>;
pub type OrderServiceBox = Box<dyn OrderService>;
pub type SessionFlagsBox = Box<dyn SessionFlags>;
pub type PreviewRendererBox = Box<dyn PreviewRenderer>;
pub type UploadServiceRef = Arc<dyn UploadService>;
