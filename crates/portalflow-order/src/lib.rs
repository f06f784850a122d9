//! portalflow order engine
//!
//! Client-side lifecycle handling for orders hosted by the cloud-management
//! portal. An order is provisioned asynchronously and every change to it is a
//! named remote action, so the only way to learn the outcome is to poll.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │          per-product resource modules            │
//! │      (buckets, users, ACLs, topics, quotas)      │
//! └─────────────────┬───────────────────────────────┘
//!                   │ impl Collection
//! ┌─────────────────▼───────────────────────────────┐
//! │               portalflow-order                   │
//! │  ┌──────────────────┐  ┌──────────────────┐      │
//! │  │ ResourceConverger│──│   ReconcileSet   │      │
//! │  └────────┬─────────┘  └──────────────────┘      │
//! │  ┌────────▼─────────┐  ┌──────────────────┐      │
//! │  │      Order       │──│     ItemTree     │      │
//! │  └────────┬─────────┘  └──────────────────┘      │
//! └───────────┼─────────────────────────────────────┘
//!             │ trait OrderService
//! ┌───────────▼───────────┐
//! │    portalflow-http    │
//! └───────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use portalflow_order::{Order, PollPolicy, ActionRequest};
//!
//! let mut order = Order::load(service, "order-id").await?;
//! order.require_state(&ItemState::On)?;
//!
//! let root = order.items().root()?.id.clone();
//! let request = ActionRequest::new("vm_restart", root);
//! order.perform(&request, &PollPolicy::every(Duration::from_secs(10))).await?;
//! ```

pub mod converge;
pub mod error;
pub mod item;
pub mod order;
pub mod plan;
pub mod poll;
pub mod reconcile;
pub mod service;
pub mod status;

// Re-exports
pub use converge::{Collection, ResourceConverger};
pub use error::{OrderError, Result};
pub use item::{AccessAcl, Item, ItemConfig, ItemKind, ItemState, ItemTree};
pub use order::Order;
pub use plan::{AppliedChange, Change, ChangeKind, ConvergeReport, Plan, PlanSummary};
pub use poll::{PollPolicy, SettleReport, Tolerance};
pub use reconcile::{ReconcileSet, diff};
pub use service::{
    ActionPayload, ActionRequest, CreateOrderRequest, OrderService, OrderSnapshot, RawItem,
    PROVENANCE_KEY,
};
pub use status::{ActionStatus, LastAction, OrderStatus};
