use crate::domain::endpoint::EndpointId;
use crate::domain::evidence::LocalFile;
use crate::domain::order::OrderReference;
use crate::domain::ports::{
    EvidenceSubmission, OrderService, SubmitRequest, SubmitResponse, UploadService,
};
use crate::error::ServiceError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// How the simulated backend answers submissions for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedBehaviour {
    /// Hands out a payment link (manual methods ask for evidence instead).
    Accept,
    /// Accepts but answers without a payment link.
    MissingUrl,
    Reject(String),
    NetworkDown,
}

#[derive(Default)]
struct SimulatedState {
    behaviours: HashMap<EndpointId, SimulatedBehaviour>,
    submissions: Vec<SubmitRequest>,
    evidence: Vec<EvidenceSubmission>,
    confirmations: Vec<(OrderReference, String)>,
    refresh_url: Option<String>,
}

/// In-process stand-in for the order backend. Records every call it receives.
#[derive(Default, Clone)]
pub struct SimulatedOrderService {
    state: Arc<RwLock<SimulatedState>>,
}

impl SimulatedOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_behaviour(&self, endpoint: impl Into<String>, behaviour: SimulatedBehaviour) {
        self.state
            .write()
            .await
            .behaviours
            .insert(EndpointId::new(endpoint), behaviour);
    }

    pub async fn set_refresh_url(&self, url: impl Into<String>) {
        self.state.write().await.refresh_url = Some(url.into());
    }

    pub async fn submissions(&self) -> Vec<SubmitRequest> {
        self.state.read().await.submissions.clone()
    }

    pub async fn evidence_submissions(&self) -> Vec<EvidenceSubmission> {
        self.state.read().await.evidence.clone()
    }

    pub async fn confirmations(&self) -> Vec<(OrderReference, String)> {
        self.state.read().await.confirmations.clone()
    }
}

#[async_trait]
impl OrderService for SimulatedOrderService {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ServiceError> {
        let mut state = self.state.write().await;
        state.submissions.push(request.clone());
        let behaviour = state
            .behaviours
            .get(&request.endpoint)
            .cloned()
            .unwrap_or(SimulatedBehaviour::Accept);

        match behaviour {
            SimulatedBehaviour::Accept if request.method.is_manual() => {
                Ok(SubmitResponse::EvidenceRequired)
            }
            SimulatedBehaviour::Accept => Ok(SubmitResponse::Redirect {
                url: Some(format!(
                    "https://pay.example/{}/{}",
                    request.endpoint, request.reference
                )),
            }),
            SimulatedBehaviour::MissingUrl => Ok(SubmitResponse::Redirect { url: None }),
            SimulatedBehaviour::Reject(message) => Err(ServiceError::rejected(message)),
            SimulatedBehaviour::NetworkDown => Err(ServiceError::network("connection refused")),
        }
    }

    async fn submit_with_evidence(&self, submission: &EvidenceSubmission) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        if let Some(SimulatedBehaviour::Reject(message)) = state.behaviours.get(&submission.endpoint) {
            return Err(ServiceError::rejected(message.clone()));
        }
        state.evidence.push(submission.clone());
        Ok(())
    }

    async fn confirm(&self, reference: OrderReference, remark: &str) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        let already = state.confirmations.iter().any(|(r, _)| *r == reference);
        if !already {
            state.confirmations.push((reference, remark.to_string()));
        }
        Ok(())
    }

    async fn refresh_redirect(&self, _reference: OrderReference) -> Result<Option<String>, ServiceError> {
        Ok(self.state.read().await.refresh_url.clone())
    }
}

/// Upload stand-in that "stores" every file under a fixed base URL.
#[derive(Debug, Clone)]
pub struct SimulatedUploadService {
    base_url: String,
}

impl SimulatedUploadService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl UploadService for SimulatedUploadService {
    async fn upload(&self, file: &LocalFile) -> Result<String, ServiceError> {
        let name = file
            .path
            .file_name()
            .ok_or_else(|| ServiceError::rejected(format!("{} is not a file", file.path.display())))?;
        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            name.to_string_lossy()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::Amount;
    use crate::domain::method::PaymentMethod;
    use rust_decimal_macros::dec;

    fn request(endpoint: &str, method: PaymentMethod) -> SubmitRequest {
        SubmitRequest {
            reference: OrderReference::generate(),
            endpoint: EndpointId::new(endpoint),
            amount: Amount::new(dec!(10)).unwrap(),
            method,
        }
    }

    #[tokio::test]
    async fn test_behaviours() {
        let service = SimulatedOrderService::new();
        service.set_behaviour("dead", SimulatedBehaviour::MissingUrl).await;

        let ok = service.submit(&request("live", PaymentMethod::Wechat)).await.unwrap();
        assert!(matches!(ok, SubmitResponse::Redirect { url: Some(_) }));
        let missing = service.submit(&request("dead", PaymentMethod::Wechat)).await.unwrap();
        assert_eq!(missing, SubmitResponse::Redirect { url: None });
        let manual = service.submit(&request("card", PaymentMethod::BankCard)).await.unwrap();
        assert_eq!(manual, SubmitResponse::EvidenceRequired);
        assert_eq!(service.submissions().await.len(), 3);
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let service = SimulatedOrderService::new();
        let reference = OrderReference::generate();
        service.confirm(reference, "first").await.unwrap();
        service.confirm(reference, "second").await.unwrap();
        assert_eq!(service.confirmations().await, vec![(reference, "first".to_string())]);
    }

    #[tokio::test]
    async fn test_simulated_upload() {
        let uploads = SimulatedUploadService::new("https://uploads.example/");
        let url = uploads.upload(&LocalFile::new("/tmp/proof.png")).await.unwrap();
        assert_eq!(url, "https://uploads.example/proof.png");
        assert!(uploads.upload(&LocalFile::new("/")).await.is_err());
    }
}
