//! Order engine error types

use crate::plan::ChangeKind;
use crate::status::{ActionStatus, OrderStatus};
use std::time::Duration;
use thiserror::Error;

/// Order engine errors
#[derive(Error, Debug)]
pub enum OrderError {
    /// Network-level failure talking to the portal. Never retried here.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Order {order_id} root item is '{actual}', expected '{expected}'")]
    Precondition {
        order_id: String,
        expected: String,
        actual: String,
    },

    #[error("Order {order_id} settled with status {status}")]
    OrderFailed {
        order_id: String,
        status: OrderStatus,
    },

    #[error("Action {action_id} on order {order_id} finished with a warning")]
    ActionWarning { order_id: String, action_id: String },

    #[error("Action {action_id} on order {order_id} failed ({status}): {output}")]
    ActionFailed {
        order_id: String,
        action_id: String,
        status: ActionStatus,
        output: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(
        "Failed to {change} {collection} '{key}' after {completed} applied change(s): {source}"
    )]
    PartialApply {
        collection: String,
        key: String,
        change: ChangeKind,
        completed: usize,
        #[source]
        source: Box<OrderError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous lookup: {count} items match {what}")]
    Ambiguous { what: String, count: usize },

    #[error("Order {order_id} did not settle after {polls} poll(s) in {elapsed:?}")]
    Timeout {
        order_id: String,
        polls: u32,
        elapsed: Duration,
    },

    #[error("Waiting for order {order_id} was cancelled")]
    Cancelled { order_id: String },
}

impl OrderError {
    /// Network or decode failure, as opposed to a remote verdict or a local check.
    pub fn is_transport(&self) -> bool {
        matches!(self, OrderError::Transport(_) | OrderError::Decode(_))
    }

    /// Whether the error was raised before anything was sent to the portal.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            OrderError::Validation(_) | OrderError::Precondition { .. }
        )
    }

    /// The innermost error, looking through `PartialApply` wrappers.
    pub fn root_cause(&self) -> &OrderError {
        match self {
            OrderError::PartialApply { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;
