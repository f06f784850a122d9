//! Order and action status values reported by the portal

use serde::{Deserialize, Serialize};

/// Status of an order as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Pending,
    Changing,
    Removing,
    Success,
    Warning,
    Error,
    Deprovisioned,
}

impl OrderStatus {
    /// The portal is still working on the order.
    pub fn is_settling(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Changing | OrderStatus::Removing
        )
    }

    /// Terminal states the engine accepts as a successful outcome.
    pub fn is_success(&self) -> bool {
        matches!(self, OrderStatus::Success | OrderStatus::Deprovisioned)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "new"),
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Changing => write!(f, "changing"),
            OrderStatus::Removing => write!(f, "removing"),
            OrderStatus::Success => write!(f, "success"),
            OrderStatus::Warning => write!(f, "warning"),
            OrderStatus::Error => write!(f, "error"),
            OrderStatus::Deprovisioned => write!(f, "deprovisioned"),
        }
    }
}

/// Status of the most recent action run against an order
///
/// The portal reports several failure spellings ("error", "failed",
/// "canceled", ...); all of them collapse into `Failed` with the original
/// text preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionStatus {
    New,
    Pending,
    Success,
    Warning,
    Failed(String),
}

impl ActionStatus {
    /// Still queued or running.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ActionStatus::New | ActionStatus::Pending)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionStatus::Success)
    }
}

impl From<String> for ActionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "new" => ActionStatus::New,
            "pending" => ActionStatus::Pending,
            "success" => ActionStatus::Success,
            "warning" => ActionStatus::Warning,
            _ => ActionStatus::Failed(value),
        }
    }
}

impl From<ActionStatus> for String {
    fn from(value: ActionStatus) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::New => write!(f, "new"),
            ActionStatus::Pending => write!(f, "pending"),
            ActionStatus::Success => write!(f, "success"),
            ActionStatus::Warning => write!(f, "warning"),
            ActionStatus::Failed(status) => write!(f, "{}", status),
        }
    }
}

/// The last action recorded on an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastAction {
    pub id: String,
    pub status: ActionStatus,
}
