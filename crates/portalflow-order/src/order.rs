//! Order lifecycle and settle waiting

use crate::error::{OrderError, Result};
use crate::item::{ItemState, ItemTree};
use crate::poll::{PollPolicy, SettleReport, Tolerance};
use crate::service::{ActionRequest, CreateOrderRequest, OrderService, OrderSnapshot};
use crate::status::{ActionStatus, LastAction, OrderStatus};
use std::sync::Arc;
use tokio::time::{Instant, sleep};

/// Local view of one portal order
///
/// Every mutating call takes `&mut self`: an order is owned by one caller at
/// a time and is refreshed in place by [`Order::resync`].
pub struct Order {
    service: Arc<dyn OrderService>,
    id: String,
    status: OrderStatus,
    last_action: Option<LastAction>,
    items: ItemTree,
}

impl std::fmt::Debug for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Order")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("last_action", &self.last_action)
            .field("items", &self.items.len())
            .finish_non_exhaustive()
    }
}

/// Counters for one settle wait
struct PollClock {
    started: Instant,
    polls: u32,
    sleeps: u32,
}

impl PollClock {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            polls: 0,
            sleeps: 0,
        }
    }

    fn report(&self, action_status: Option<ActionStatus>, tolerated: bool) -> SettleReport {
        SettleReport {
            polls: self.polls,
            sleeps: self.sleeps,
            elapsed: self.started.elapsed(),
            action_status,
            tolerated,
        }
    }
}

impl Order {
    /// Build an order from a snapshot already fetched from the portal.
    pub fn from_snapshot(service: Arc<dyn OrderService>, snapshot: OrderSnapshot) -> Result<Self> {
        let items = ItemTree::from_raw(snapshot.items)?;
        Ok(Self {
            service,
            id: snapshot.id,
            status: snapshot.status,
            last_action: snapshot.last_action,
            items,
        })
    }

    /// Fetch an existing order.
    pub async fn load(service: Arc<dyn OrderService>, order_id: &str) -> Result<Self> {
        let snapshot = service.get_order(order_id).await?;
        Self::from_snapshot(service, snapshot)
    }

    /// Submit a new order. The returned order usually has no items yet.
    pub async fn create(
        service: Arc<dyn OrderService>,
        request: &CreateOrderRequest,
    ) -> Result<Self> {
        tracing::info!(
            "Creating order '{}' for product {}",
            request.label,
            request.product_id
        );
        let snapshot = service.create_order(&request.managed()).await?;
        tracing::debug!("Order {} submitted with status {}", snapshot.id, snapshot.status);
        Self::from_snapshot(service, snapshot)
    }

    /// Submit a new order and wait until it is provisioned.
    pub async fn provision(
        service: Arc<dyn OrderService>,
        request: &CreateOrderRequest,
        policy: &PollPolicy,
    ) -> Result<Self> {
        let mut order = Self::create(service, request).await?;
        order.wait_until_settled(policy).await?;

        if !order.is_created() {
            return Err(OrderError::NotFound(format!(
                "items of order {} after provisioning",
                order.id
            )));
        }

        tracing::info!("Order {} provisioned with {} item(s)", order.id, order.items.len());
        Ok(order)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn last_action(&self) -> Option<&LastAction> {
        self.last_action.as_ref()
    }

    pub fn items(&self) -> &ItemTree {
        &self.items
    }

    /// At least one resync has returned items.
    pub fn is_created(&self) -> bool {
        !self.items.is_empty()
    }

    /// Refetch the order and its last action, replacing the local view.
    pub async fn resync(&mut self) -> Result<()> {
        let snapshot = self.service.get_order(&self.id).await?;
        let items = ItemTree::from_raw(snapshot.items)?;

        self.status = snapshot.status;
        self.last_action = snapshot.last_action;
        self.items = items;
        Ok(())
    }

    /// Fail unless the root item is in the given state.
    pub fn require_state(&self, expected: &ItemState) -> Result<()> {
        let root = self.items.root()?;
        match &root.state {
            Some(state) if state == expected => Ok(()),
            other => Err(OrderError::Precondition {
                order_id: self.id.clone(),
                expected: expected.to_string(),
                actual: other
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown".to_string()),
            }),
        }
    }

    /// Send an action without waiting for it.
    pub async fn invoke(&mut self, request: &ActionRequest) -> Result<()> {
        tracing::info!(
            "Running action {} on order {} (item {})",
            request.name,
            self.id,
            request.item_id
        );
        self.service
            .invoke_action(&self.id, &request.name, &request.payload())
            .await
    }

    /// Send an action and wait for the order to settle, honouring the
    /// request's tolerance.
    pub async fn perform(
        &mut self,
        request: &ActionRequest,
        policy: &PollPolicy,
    ) -> Result<SettleReport> {
        self.invoke(request).await?;
        self.settle(policy, request.tolerance).await
    }

    /// Best-effort diagnostic output of an action.
    pub async fn action_output(&self, action_id: &str) -> Result<String> {
        self.service.action_output(&self.id, action_id).await
    }

    /// Wait until the order and its last action have finished, treating a
    /// warning as failure.
    pub async fn wait_until_settled(&mut self, policy: &PollPolicy) -> Result<SettleReport> {
        self.settle(policy, Tolerance::Strict).await
    }

    /// Wait until the order and its last action have finished.
    pub async fn settle(
        &mut self,
        policy: &PollPolicy,
        tolerance: Tolerance,
    ) -> Result<SettleReport> {
        let mut clock = PollClock::start();

        loop {
            self.poll(policy, &mut clock).await?;
            if !self.status.is_settling() {
                break;
            }
            tracing::debug!("Order {} is {}, waiting", self.id, self.status);
            self.pause(policy, &mut clock).await?;
        }

        if !self.status.is_success() {
            return Err(OrderError::OrderFailed {
                order_id: self.id.clone(),
                status: self.status,
            });
        }

        let action = loop {
            self.poll(policy, &mut clock).await?;
            match &self.last_action {
                Some(action) if action.status.is_in_flight() => {
                    tracing::debug!(
                        "Action {} on order {} is {}, waiting",
                        action.id,
                        self.id,
                        action.status
                    );
                }
                Some(action) => break action.clone(),
                None => {
                    tracing::debug!("Order {} settled as {} with no action history", self.id, self.status);
                    return Ok(clock.report(None, false));
                }
            }
            self.pause(policy, &mut clock).await?;
        };

        if action.status.is_success() {
            tracing::debug!(
                "Order {} settled after {} poll(s)",
                self.id,
                clock.polls
            );
            return Ok(clock.report(Some(action.status), false));
        }

        let output = match &action.status {
            ActionStatus::Warning => None,
            _ => Some(self.diagnostics(&action.id).await),
        };

        if tolerance.allows(&action.status) {
            tracing::warn!(
                "Action {} on order {} finished as {}, continuing{}",
                action.id,
                self.id,
                action.status,
                output
                    .as_deref()
                    .filter(|o| !o.is_empty())
                    .map(|o| format!(": {}", o))
                    .unwrap_or_default()
            );
            return Ok(clock.report(Some(action.status), true));
        }

        match output {
            None => Err(OrderError::ActionWarning {
                order_id: self.id.clone(),
                action_id: action.id,
            }),
            Some(output) => Err(OrderError::ActionFailed {
                order_id: self.id.clone(),
                action_id: action.id,
                status: action.status,
                output,
            }),
        }
    }

    async fn poll(&mut self, policy: &PollPolicy, clock: &mut PollClock) -> Result<()> {
        if policy.is_cancelled() {
            return Err(OrderError::Cancelled {
                order_id: self.id.clone(),
            });
        }
        if clock.polls >= policy.max_polls {
            return Err(OrderError::Timeout {
                order_id: self.id.clone(),
                polls: clock.polls,
                elapsed: clock.started.elapsed(),
            });
        }
        clock.polls += 1;
        self.resync().await
    }

    async fn pause(&self, policy: &PollPolicy, clock: &mut PollClock) -> Result<()> {
        let elapsed = clock.started.elapsed();
        let out_of_polls = clock.polls >= policy.max_polls;
        let out_of_time = policy
            .timeout
            .is_some_and(|timeout| elapsed + policy.interval > timeout);

        if out_of_polls || out_of_time {
            return Err(OrderError::Timeout {
                order_id: self.id.clone(),
                polls: clock.polls,
                elapsed,
            });
        }

        match &policy.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {
                        return Err(OrderError::Cancelled {
                            order_id: self.id.clone(),
                        });
                    }
                    _ = sleep(policy.interval) => {}
                }
            }
            None => sleep(policy.interval).await,
        }

        clock.sleeps += 1;
        Ok(())
    }

    async fn diagnostics(&self, action_id: &str) -> String {
        match self.action_output(action_id).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(
                    "Could not fetch output of action {} on order {}: {}",
                    action_id,
                    self.id,
                    e
                );
                String::new()
            }
        }
    }
}
