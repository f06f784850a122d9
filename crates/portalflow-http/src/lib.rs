//! HTTP transport for portalflow
//!
//! [`PortalClient`] implements [`portalflow_order::OrderService`] against the
//! portal REST API:
//!
//! - `POST /orders`
//! - `GET /orders/{id}?include=last_action`
//! - `PATCH /orders/{id}/actions/{action}`
//! - `GET /orders/{id}/actions/history/{action_id}/output`
//!
//! Non-2xx responses and unreadable bodies surface as transport errors; the
//! client never retries.
//!
//! # Example
//!
//! ```ignore
//! use portalflow_http::{ClientConfig, PortalClient};
//! use portalflow_order::{Order, PollPolicy};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("https://portal.example.net/api/v1", token)
//!     .with_timeout(Duration::from_secs(10));
//! let client = Arc::new(PortalClient::new(config)?);
//! let mut order = Order::load(client, "ord-42").await?;
//! order.wait_until_settled(&PollPolicy::default()).await?;
//! ```

pub mod client;
pub mod error;

pub use client::{ClientConfig, PortalClient};
pub use error::{PortalHttpError, Result};
