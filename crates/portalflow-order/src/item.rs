//! Order item tree
//!
//! The portal returns an order's items as a flat list where each entry names
//! its parent. [`ItemTree`] decodes that list once per resync into an arena
//! with id and parent indexes, and decodes each item's `config` payload into
//! a typed [`ItemConfig`] keyed by the item type.

use crate::error::{OrderError, Result};
use crate::service::RawItem;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Item type as reported by the portal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemKind {
    Vm,
    App,
    Cluster,
    Db,
    S3Bucket,
    Gslb,
    Project,
    Other(String),
}

impl From<String> for ItemKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "vm" => ItemKind::Vm,
            "app" => ItemKind::App,
            "cluster" => ItemKind::Cluster,
            "db" => ItemKind::Db,
            "s3_bucket" => ItemKind::S3Bucket,
            "gslb" => ItemKind::Gslb,
            "project" => ItemKind::Project,
            _ => ItemKind::Other(value),
        }
    }
}

impl From<&str> for ItemKind {
    fn from(value: &str) -> Self {
        ItemKind::from(value.to_string())
    }
}

impl From<ItemKind> for String {
    fn from(value: ItemKind) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Vm => write!(f, "vm"),
            ItemKind::App => write!(f, "app"),
            ItemKind::Cluster => write!(f, "cluster"),
            ItemKind::Db => write!(f, "db"),
            ItemKind::S3Bucket => write!(f, "s3_bucket"),
            ItemKind::Gslb => write!(f, "gslb"),
            ItemKind::Project => write!(f, "project"),
            ItemKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

/// Power/lifecycle state of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemState {
    On,
    Off,
    Other(String),
}

impl From<String> for ItemState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "on" => ItemState::On,
            "off" => ItemState::Off,
            _ => ItemState::Other(value),
        }
    }
}

impl From<ItemState> for String {
    fn from(value: ItemState) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemState::On => write!(f, "on"),
            ItemState::Off => write!(f, "off"),
            ItemState::Other(state) => write!(f, "{}", state),
        }
    }
}

/// Access rule attached to an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAcl {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Compute flavor of a VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub cores: u32,
    /// Memory in GB
    pub memory: u32,
    #[serde(default)]
    pub name: Option<String>,
}

pub type Extra = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmConfig {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub flavor: Option<Flavor>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Option<u32>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    #[serde(default)]
    pub name: String,
    /// Quota in GB
    #[serde(default)]
    pub max_size_gb: u64,
    #[serde(default)]
    pub versioning: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GslbConfig {
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Typed item configuration, selected by the item type
#[derive(Debug, Clone, PartialEq)]
pub enum ItemConfig {
    Vm(VmConfig),
    App(AppConfig),
    Cluster(ClusterConfig),
    Db(DatabaseConfig),
    S3Bucket(BucketConfig),
    Gslb(GslbConfig),
    Project(ProjectConfig),
    Other(Extra),
}

impl ItemConfig {
    /// Decode a raw config payload for the given item type.
    pub fn decode(kind: &ItemKind, raw: serde_json::Value) -> Result<Self> {
        let raw = match raw {
            serde_json::Value::Null => serde_json::Value::Object(Extra::new()),
            other => other,
        };

        let config = match kind {
            ItemKind::Vm => ItemConfig::Vm(serde_json::from_value(raw)?),
            ItemKind::App => ItemConfig::App(serde_json::from_value(raw)?),
            ItemKind::Cluster => ItemConfig::Cluster(serde_json::from_value(raw)?),
            ItemKind::Db => ItemConfig::Db(serde_json::from_value(raw)?),
            ItemKind::S3Bucket => ItemConfig::S3Bucket(serde_json::from_value(raw)?),
            ItemKind::Gslb => ItemConfig::Gslb(serde_json::from_value(raw)?),
            ItemKind::Project => ItemConfig::Project(serde_json::from_value(raw)?),
            ItemKind::Other(_) => ItemConfig::Other(serde_json::from_value(raw)?),
        };
        Ok(config)
    }

    /// Roles carried by the item (VMs and apps only).
    pub fn roles(&self) -> &[String] {
        match self {
            ItemConfig::Vm(config) => &config.roles,
            ItemConfig::App(config) => &config.roles,
            _ => &[],
        }
    }

    /// Fields the typed config does not model.
    pub fn extra(&self) -> &Extra {
        match self {
            ItemConfig::Vm(config) => &config.extra,
            ItemConfig::App(config) => &config.extra,
            ItemConfig::Cluster(config) => &config.extra,
            ItemConfig::Db(config) => &config.extra,
            ItemConfig::S3Bucket(config) => &config.extra,
            ItemConfig::Gslb(config) => &config.extra,
            ItemConfig::Project(config) => &config.extra,
            ItemConfig::Other(extra) => extra,
        }
    }

    /// Get an untyped configuration field as a specific type
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extra()
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// A decoded order item
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub kind: ItemKind,
    /// Parent item id; `None` for the root.
    pub parent_id: Option<String>,
    pub state: Option<ItemState>,
    pub config: ItemConfig,
    pub acls: Vec<AccessAcl>,
}

impl Item {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.config.roles().iter().any(|r| r == role)
    }
}

impl TryFrom<RawItem> for Item {
    type Error = OrderError;

    fn try_from(raw: RawItem) -> Result<Self> {
        let config = ItemConfig::decode(&raw.kind, raw.data.config)?;
        Ok(Self {
            id: raw.item_id,
            parent_id: raw.parent.filter(|p| !p.is_empty()),
            kind: raw.kind,
            state: raw.data.state,
            config,
            acls: raw.data.acls,
        })
    }
}

/// Arena of an order's items with id and parent indexes
#[derive(Debug, Clone, Default)]
pub struct ItemTree {
    items: Vec<Item>,
    by_id: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
    roots: Vec<usize>,
}

impl ItemTree {
    /// Index `items` as given. Ids are assumed unique; [`ItemTree::from_raw`]
    /// checks that.
    pub fn new(items: Vec<Item>) -> Self {
        let mut by_id = HashMap::with_capacity(items.len());
        let mut children: HashMap<String, Vec<usize>> = HashMap::new();
        let mut roots = Vec::new();

        for (index, item) in items.iter().enumerate() {
            by_id.insert(item.id.clone(), index);
            match &item.parent_id {
                Some(parent) => children.entry(parent.clone()).or_default().push(index),
                None => roots.push(index),
            }
        }

        Self {
            items,
            by_id,
            children,
            roots,
        }
    }

    /// Decode the raw item list of an order snapshot.
    ///
    /// An id that appears more than once is an `Ambiguous` error.
    pub fn from_raw(raw: Vec<RawItem>) -> Result<Self> {
        let items = raw
            .into_iter()
            .map(Item::try_from)
            .collect::<Result<Vec<_>>>()?;

        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(items.len());
        for item in &items {
            *seen.entry(item.id.as_str()).or_default() += 1;
        }
        if let Some((id, count)) = seen.into_iter().find(|(_, count)| *count > 1) {
            return Err(OrderError::Ambiguous {
                what: format!("id '{}'", id),
                count,
            });
        }

        Ok(Self::new(items))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.by_id.get(id).map(|&index| &self.items[index])
    }

    /// The single item without a parent.
    pub fn root(&self) -> Result<&Item> {
        match self.roots.as_slice() {
            [index] => Ok(&self.items[*index]),
            [] if self.items.is_empty() => Err(OrderError::NotFound(
                "root item (order has no items)".to_string(),
            )),
            [] => Err(OrderError::NotFound(
                "root item (every item has a parent)".to_string(),
            )),
            many => Err(OrderError::Ambiguous {
                what: "root item".to_string(),
                count: many.len(),
            }),
        }
    }

    /// Direct children of an item.
    pub fn children(&self, parent_id: &str) -> Vec<&Item> {
        self.children
            .get(parent_id)
            .map(|indexes| indexes.iter().map(|&i| &self.items[i]).collect())
            .unwrap_or_default()
    }

    /// The single parent of an item, if it has one and the parent is present.
    pub fn parent(&self, item: &Item) -> Option<&Item> {
        item.parent_id.as_deref().and_then(|p| self.get(p))
    }

    /// All items matching a predicate.
    pub fn find_all<P>(&self, predicate: P) -> Vec<&Item>
    where
        P: Fn(&Item) -> bool,
    {
        self.items.iter().filter(|&item| predicate(item)).collect()
    }

    /// Exactly one item matching a predicate.
    pub fn find<P>(&self, what: &str, predicate: P) -> Result<&Item>
    where
        P: Fn(&Item) -> bool,
    {
        let matches = self.find_all(predicate);
        match matches.as_slice() {
            [item] => Ok(*item),
            [] => Err(OrderError::NotFound(what.to_string())),
            many => Err(OrderError::Ambiguous {
                what: what.to_string(),
                count: many.len(),
            }),
        }
    }

    pub fn all_by_type(&self, kind: &ItemKind) -> Vec<&Item> {
        self.find_all(|item| &item.kind == kind)
    }

    pub fn by_type(&self, kind: &ItemKind) -> Result<&Item> {
        self.find(&format!("item of type '{}'", kind), |item| &item.kind == kind)
    }

    pub fn all_by_role(&self, role: &str) -> Vec<&Item> {
        self.find_all(|item| item.has_role(role))
    }

    pub fn by_role(&self, role: &str) -> Result<&Item> {
        self.find(&format!("item with role '{}'", role), |item| {
            item.has_role(role)
        })
    }
}
