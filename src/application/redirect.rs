use crate::application::gateway::{OrderSubmissionGateway, RedirectResult};
use crate::domain::order::{Order, OrderReference, OrderStatus};
use crate::error::{Result, RoutingError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectState {
    Opened,
    Reloaded,
    UserConfirmedSuccess,
    UserCancelled,
    TimedOut,
}

impl RedirectState {
    pub fn is_open(&self) -> bool {
        matches!(self, RedirectState::Opened | RedirectState::Reloaded)
    }
}

/// What the host should currently display. A new `generation` means the old
/// page must be thrown away and a fresh one opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectSurface {
    pub url: String,
    pub generation: u32,
    pub loading: bool,
}

/// Input from the host while the external payment page is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectEvent {
    Loaded,
    Reload,
    RefreshUrl,
    ConfirmSuccess { remark: String },
    Cancel,
}

/// Lifecycle of the hosted payment page for one redirected order.
pub struct RedirectConfirmationFlow {
    reference: OrderReference,
    surface: RedirectSurface,
    state: RedirectState,
    deadline: Instant,
}

impl RedirectConfirmationFlow {
    /// Opens the page. The timeout covers the whole flow; reloads do not extend it.
    pub fn open(redirect: RedirectResult, timeout: Duration) -> Self {
        tracing::info!(reference = %redirect.reference, url = %redirect.url, "redirect opened");
        Self {
            reference: redirect.reference,
            surface: RedirectSurface {
                url: redirect.url,
                generation: 1,
                loading: true,
            },
            state: RedirectState::Opened,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn state(&self) -> RedirectState {
        self.state
    }

    pub fn surface(&self) -> &RedirectSurface {
        &self.surface
    }

    pub fn reference(&self) -> OrderReference {
        self.reference
    }

    pub fn mark_loaded(&mut self) {
        self.surface.loading = false;
    }

    /// Replaces the page with a fresh instance of the same URL.
    pub fn reload(&mut self) -> Result<()> {
        self.ensure_open("reload")?;
        self.reopen();
        Ok(())
    }

    /// Asks the backend for a renewed link and reopens on it. Matching is not restarted.
    pub async fn refresh_url(&mut self, gateway: &OrderSubmissionGateway) -> Result<()> {
        self.ensure_open("refresh")?;
        let url = gateway.refresh_redirect(self.reference).await?;
        tracing::info!(reference = %self.reference, url = %url, "redirect url refreshed");
        self.surface.url = url;
        self.reopen();
        Ok(())
    }

    /// Records the payer's acknowledgement with the backend, then confirms the order.
    pub async fn user_confirmed_success(
        &mut self,
        order: &mut Order,
        gateway: &OrderSubmissionGateway,
        remark: &str,
    ) -> Result<()> {
        self.ensure_open("confirm")?;
        if order.status() != OrderStatus::Redirected {
            return Err(RoutingError::InvalidTransition {
                from: order.status().to_string(),
                to: OrderStatus::Confirmed.to_string(),
            });
        }
        gateway.confirm(self.reference, remark).await?;
        order.transition(OrderStatus::Confirmed)?;
        self.state = RedirectState::UserConfirmedSuccess;
        tracing::info!(reference = %self.reference, "payment confirmed by user");
        Ok(())
    }

    pub fn user_cancelled(&mut self, order: &mut Order) -> Result<()> {
        self.close(order, RedirectState::UserCancelled)
    }

    pub fn timed_out(&mut self, order: &mut Order) -> Result<()> {
        self.close(order, RedirectState::TimedOut)
    }

    /// Processes host events until the flow ends or the deadline passes.
    ///
    /// A closed event channel counts as cancellation. A failed URL refresh is
    /// logged and the current page stays up.
    pub async fn run(
        &mut self,
        order: &mut Order,
        gateway: &OrderSubmissionGateway,
        events: &mut mpsc::Receiver<RedirectEvent>,
    ) -> Result<RedirectState> {
        while self.state.is_open() {
            if self.is_expired() {
                tracing::warn!(reference = %self.reference, "redirect timed out");
                self.timed_out(order)?;
                break;
            }
            tokio::select! {
                biased;
                _ = tokio::time::sleep_until(self.deadline) => {
                    tracing::warn!(reference = %self.reference, "redirect timed out");
                    self.timed_out(order)?;
                }
                event = events.recv() => match event {
                    Some(RedirectEvent::Loaded) => self.mark_loaded(),
                    Some(RedirectEvent::Reload) => self.reload()?,
                    Some(RedirectEvent::RefreshUrl) => {
                        if let Err(err) = self.refresh_url(gateway).await {
                            tracing::warn!(reference = %self.reference, error = %err, "redirect refresh failed");
                        }
                    }
                    Some(RedirectEvent::ConfirmSuccess { remark }) => {
                        self.user_confirmed_success(order, gateway, &remark).await?;
                    }
                    Some(RedirectEvent::Cancel) | None => self.user_cancelled(order)?,
                },
            }
        }
        Ok(self.state)
    }

    fn reopen(&mut self) {
        self.surface.generation += 1;
        self.surface.loading = true;
        self.state = RedirectState::Reloaded;
    }

    fn close(&mut self, order: &mut Order, state: RedirectState) -> Result<()> {
        if !self.state.is_open() {
            return Err(RoutingError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", state),
            });
        }
        order.reset();
        self.state = state;
        tracing::info!(reference = %self.reference, state = ?state, "redirect closed without confirmation");
        Ok(())
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Page actions are refused once the flow has ended or its deadline passed.
    fn ensure_open(&self, action: &str) -> Result<()> {
        let from = if !self.state.is_open() {
            format!("{:?}", self.state)
        } else if self.is_expired() {
            "Expired".to_string()
        } else {
            return Ok(());
        };
        Err(RoutingError::InvalidTransition {
            from,
            to: action.to_string(),
        })
    }
}
