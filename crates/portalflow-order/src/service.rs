//! Remote order service boundary and wire types

use crate::error::Result;
use crate::item::{AccessAcl, ItemKind, ItemState};
use crate::poll::Tolerance;
use crate::status::{LastAction, OrderStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Attribute added to every mutating payload to mark the resource as
/// managed by this tool.
pub const PROVENANCE_KEY: &str = "iac_managed";

type Attrs = serde_json::Map<String, serde_json::Value>;

fn tag_managed(attrs: &mut Attrs) {
    attrs.insert(PROVENANCE_KEY.to_string(), serde_json::Value::Bool(true));
}

fn attrs_from(value: serde_json::Value) -> Attrs {
    match value {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => Attrs::new(),
        other => {
            let mut map = Attrs::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// The portal's order API
///
/// Implementations perform exactly one remote call per method and never
/// retry; the order engine decides what happens next.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// `POST /orders`
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderSnapshot>;

    /// `GET /orders/{id}?include=last_action`
    async fn get_order(&self, order_id: &str) -> Result<OrderSnapshot>;

    /// `PATCH /orders/{id}/actions/{action}`. The response body is ignored.
    async fn invoke_action(
        &self,
        order_id: &str,
        action: &str,
        payload: &ActionPayload,
    ) -> Result<()>;

    /// `GET /orders/{id}/actions/history/{action_id}/output`
    async fn action_output(&self, order_id: &str, action_id: &str) -> Result<String>;
}

/// An order as returned by the portal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub last_action: Option<LastAction>,
    #[serde(default, rename = "data")]
    pub items: Vec<RawItem>,
}

/// An order item before config decoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub item_id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Empty or missing for the root item
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub data: RawItemData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItemData {
    #[serde(default)]
    pub state: Option<ItemState>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub acls: Vec<AccessAcl>,
}

/// Body of `POST /orders`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub label: String,
    pub product_id: String,
    pub attrs: Attrs,
    pub financial_project_id: String,
    /// Lifetime in days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<u32>,
}

impl CreateOrderRequest {
    pub fn new(
        label: impl Into<String>,
        product_id: impl Into<String>,
        financial_project_id: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            product_id: product_id.into(),
            attrs: Attrs::new(),
            financial_project_id: financial_project_id.into(),
            lifetime: None,
        }
    }

    pub fn with_attrs(mut self, attrs: serde_json::Value) -> Self {
        self.attrs = attrs_from(attrs);
        self
    }

    pub fn with_lifetime(mut self, days: u32) -> Self {
        self.lifetime = Some(days);
        self
    }

    /// Copy of the request with the provenance tag applied.
    pub fn managed(&self) -> Self {
        let mut request = self.clone();
        tag_managed(&mut request.attrs);
        request
    }
}

/// A named action to run against one item of an order
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub name: String,
    pub item_id: String,
    pub attrs: Attrs,
    /// How a warning or failed last action is treated after settling
    pub tolerance: Tolerance,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_id: item_id.into(),
            attrs: Attrs::new(),
            tolerance: Tolerance::Strict,
        }
    }

    pub fn with_attrs(mut self, attrs: serde_json::Value) -> Self {
        self.attrs = attrs_from(attrs);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn tolerate(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Wire body for the action, provenance tag included.
    pub fn payload(&self) -> ActionPayload {
        let mut attrs = self.attrs.clone();
        tag_managed(&mut attrs);
        ActionPayload {
            item_id: self.item_id.clone(),
            order: ActionOrder { attrs },
        }
    }
}

/// Body of `PATCH /orders/{id}/actions/{action}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    pub item_id: String,
    pub order: ActionOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOrder {
    pub attrs: Attrs,
}
