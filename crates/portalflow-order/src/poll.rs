//! Settle-wait polling policy

use crate::status::ActionStatus;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default number of polls before a settle wait gives up
pub const DEFAULT_MAX_POLLS: u32 = 360;

/// How often and for how long to poll an order
///
/// The interval is constant: it reflects the expected duration class of the
/// operation (a few seconds for ACL edits, tens of seconds for cluster
/// resizes), not a backoff schedule.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Sleep between two polls
    pub interval: Duration,

    /// Maximum number of order refetches per settle wait
    pub max_polls: u32,

    /// Wall-clock bound for one settle wait
    pub timeout: Option<Duration>,

    /// Cancels the wait between polls
    pub cancel: Option<CancellationToken>,
}

impl PollPolicy {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_polls: DEFAULT_MAX_POLLS,
            timeout: None,
            cancel: None,
        }
    }

    /// Short edits such as ACL or user changes
    pub fn quick() -> Self {
        Self::every(Duration::from_secs(5))
    }

    /// Cluster-level operations (resize, topic creation, restarts)
    pub fn slow() -> Self {
        Self::every(Duration::from_secs(30))
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::every(Duration::from_secs(10))
    }
}

/// Whether a non-success last action aborts the caller
///
/// A terminal order failure is never tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tolerance {
    /// Warning and failure are both errors
    #[default]
    Strict,
    /// A warning is logged and treated as done
    AllowWarning,
    /// Warnings and failed actions are logged and treated as done
    AllowActionFailure,
}

impl Tolerance {
    pub fn allows(&self, status: &ActionStatus) -> bool {
        match (self, status) {
            (_, ActionStatus::Success) => true,
            (Tolerance::AllowWarning, ActionStatus::Warning) => true,
            (Tolerance::AllowActionFailure, ActionStatus::Warning) => true,
            (Tolerance::AllowActionFailure, ActionStatus::Failed(_)) => true,
            _ => false,
        }
    }
}

/// What a settle wait observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleReport {
    /// Number of order refetches
    pub polls: u32,

    /// Number of sleeps between refetches
    pub sleeps: u32,

    pub elapsed: Duration,

    /// Final last-action status, if the order has one
    pub action_status: Option<ActionStatus>,

    /// The final action status was not success but the call site allowed it
    pub tolerated: bool,
}
