use crate::application::candidate_pool::CandidatePool;
use crate::application::evidence::EvidenceUploadCoordinator;
use crate::application::failover::{CancelFlag, FailoverOrchestrator};
use crate::application::gateway::{OrderAccepted, OrderSubmissionGateway, RedirectResult, Submission};
use crate::application::redirect::{RedirectConfirmationFlow, RedirectEvent, RedirectState};
use crate::config::EngineConfig;
use crate::domain::amount::Amount;
use crate::domain::endpoint::Endpoint;
use crate::domain::method::PaymentMethod;
use crate::domain::order::{Attempt, Order, OrderStatus};
use crate::domain::ports::{
    EndpointDirectoryBox, OrderServiceBox, PreviewRendererBox, SessionFlagsBox, UploadServiceRef,
};
use crate::error::{Result, RoutingError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;

/// Collaborators the router is wired to.
pub struct RouterPorts {
    pub directory: EndpointDirectoryBox,
    pub orders: OrderServiceBox,
    pub uploads: UploadServiceRef,
    pub previews: PreviewRendererBox,
    pub flags: SessionFlagsBox,
}

/// The entry point a host screen drives.
///
/// `ChannelRouter` owns one payer session: the endpoint list fetched on entry,
/// the sticky-selection markers, the current order and its evidence. It is
/// single-owner by construction (`&mut self` everywhere), so no state is shared
/// between concurrent matches.
pub struct ChannelRouter {
    config: EngineConfig,
    directory: EndpointDirectoryBox,
    pool: CandidatePool,
    gateway: OrderSubmissionGateway,
    orchestrator: FailoverOrchestrator,
    evidence: EvidenceUploadCoordinator,
    rng: StdRng,
    endpoints: Vec<Endpoint>,
    order: Option<Order>,
    redirect: Option<RedirectResult>,
    last_attempts: Vec<Attempt>,
}

impl ChannelRouter {
    pub fn new(config: EngineConfig, ports: RouterPorts) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            directory: ports.directory,
            pool: CandidatePool::new(ports.flags),
            gateway: OrderSubmissionGateway::new(ports.orders),
            orchestrator: FailoverOrchestrator::from_config(&config),
            evidence: EvidenceUploadCoordinator::new(ports.uploads, ports.previews, config.max_evidence),
            rng: StdRng::from_entropy(),
            endpoints: Vec::new(),
            order: None,
            redirect: None,
            last_attempts: Vec::new(),
            config,
        })
    }

    /// Replaces the random source, for reproducible candidate ordering.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Attempts made by the most recent match, kept even after a failure reset the order.
    pub fn last_attempts(&self) -> &[Attempt] {
        &self.last_attempts
    }

    pub fn evidence(&mut self) -> &mut EvidenceUploadCoordinator {
        &mut self.evidence
    }

    /// Screen entry: fetches the endpoint directory once.
    pub async fn enter(&mut self, method: Option<PaymentMethod>) -> Result<usize> {
        self.endpoints = self.directory.list(method).await?;
        tracing::info!(endpoints = self.endpoints.len(), "endpoint directory loaded");
        Ok(self.endpoints.len())
    }

    /// Starts a fresh match. Any terminal failure leaves the order `Idle`.
    pub async fn start_match(
        &mut self,
        method: PaymentMethod,
        amount: Amount,
        cancel: &CancelFlag,
    ) -> Result<Submission> {
        method.validate_amount(&amount)?;
        self.order = None;
        self.redirect = None;
        self.last_attempts.clear();

        let candidates = self
            .pool
            .select(&self.endpoints, method, &amount, &mut self.rng)
            .await?;

        let mut order = Order::new(amount, method);
        let gateway = &self.gateway;
        let pool = &self.pool;
        let result = self
            .orchestrator
            .run(
                &mut order,
                candidates,
                move |endpoint| async move {
                    let submitted = gateway.submit(&endpoint, &amount, method).await;
                    pool.record_match(method).await;
                    submitted
                },
                cancel,
            )
            .await;

        self.last_attempts = order.attempts.clone();
        match result {
            Ok(submission) => {
                self.pool.record_match(method).await;
                if let Submission::Redirect(redirect) = &submission {
                    self.redirect = Some(redirect.clone());
                }
                self.order = Some(order);
                Ok(submission)
            }
            Err(err) => {
                order.reset();
                self.order = Some(order);
                Err(err)
            }
        }
    }

    /// Waits for outstanding uploads and submits the manual-evidence order.
    ///
    /// On success the order is confirmed and the evidence items are discarded.
    pub async fn submit_evidence(&mut self, last_four: Option<&str>) -> Result<OrderAccepted> {
        let order = self
            .order
            .as_mut()
            .filter(|o| o.status() == OrderStatus::AwaitingEvidence)
            .ok_or_else(|| RoutingError::Validation("No order is awaiting evidence".to_string()))?;
        order.method.validate_card_suffix(last_four)?;
        let endpoint = order
            .endpoint
            .clone()
            .ok_or_else(|| RoutingError::Validation("Order has no assigned endpoint".to_string()))?;

        self.evidence.wait_all().await;
        let urls = self.evidence.evidence_urls().to_vec();
        order.evidence = urls.clone();

        let accepted = match self
            .gateway
            .submit_with_evidence(&endpoint, &order.amount, order.method, last_four, &urls)
            .await
        {
            Ok(accepted) => accepted,
            Err(err) if err.is_validation() => return Err(err),
            Err(err) => {
                tracing::error!(endpoint = %endpoint.id, error = %err, "manual submission failed");
                order.transition(OrderStatus::Failed)?;
                order.reset();
                return Err(err);
            }
        };

        order.reference = Some(accepted.reference);
        order.transition(OrderStatus::Confirmed)?;
        self.evidence.reset();
        Ok(accepted)
    }

    /// Opens the hosted payment page for the current redirected order.
    pub fn open_redirect(&self) -> Result<RedirectConfirmationFlow> {
        let redirect = self
            .order
            .as_ref()
            .filter(|o| o.status() == OrderStatus::Redirected)
            .and(self.redirect.clone())
            .ok_or_else(|| RoutingError::Validation("No order is awaiting redirect".to_string()))?;
        Ok(RedirectConfirmationFlow::open(
            redirect,
            self.config.redirect_timeout(),
        ))
    }

    /// Drives `flow` to completion against the current order.
    pub async fn run_redirect(
        &mut self,
        flow: &mut RedirectConfirmationFlow,
        events: &mut mpsc::Receiver<RedirectEvent>,
    ) -> Result<RedirectState> {
        let order = self
            .order
            .as_mut()
            .ok_or_else(|| RoutingError::Validation("No active order".to_string()))?;
        let state = flow.run(order, &self.gateway, events).await?;
        if !state.is_open() {
            self.redirect = None;
        }
        Ok(state)
    }

    /// Screen exit: forgets the session and everything hanging off it.
    pub async fn leave(&mut self) {
        self.pool.reset_session().await;
        self.evidence.reset();
        self.endpoints.clear();
        self.order = None;
        self.redirect = None;
        self.last_attempts.clear();
    }
}
