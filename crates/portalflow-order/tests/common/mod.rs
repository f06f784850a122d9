#![allow(dead_code)]

use async_trait::async_trait;
use portalflow_order::{
    ActionPayload, ActionRequest, Collection, CreateOrderRequest, ItemConfig, ItemKind, ItemState,
    ItemTree, OrderError, OrderService, OrderSnapshot, PollPolicy, RawItem, Result, Tolerance,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub const ORDER_ID: &str = "ord-1";

pub fn snapshot(status: &str, action: Option<&str>) -> OrderSnapshot {
    let mut value = json!({
        "id": ORDER_ID,
        "status": status,
        "data": [{"item_id": "root", "type": "app", "parent": "", "data": {"state": "on"}}]
    });
    if let Some(action) = action {
        value["last_action"] = json!({"id": "act-1", "status": action});
    }
    serde_json::from_value(value).unwrap()
}

pub fn fast_policy() -> PollPolicy {
    PollPolicy::every(Duration::from_secs(10))
}

/// Plays back a fixed sequence of order snapshots; the last one repeats.
pub struct ScriptedPortal {
    steps: Mutex<VecDeque<std::result::Result<OrderSnapshot, String>>>,
    last: Mutex<Option<OrderSnapshot>>,
    output: Option<String>,
    pub gets: Mutex<u32>,
    pub invoked: Mutex<Vec<(String, ActionPayload)>>,
}

impl ScriptedPortal {
    pub fn new(steps: Vec<OrderSnapshot>) -> Self {
        Self::with_steps(steps.into_iter().map(Ok).collect())
    }

    pub fn with_steps(steps: Vec<std::result::Result<OrderSnapshot, String>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            output: Some("task failed: quota exceeded".to_string()),
            gets: Mutex::new(0),
            invoked: Mutex::new(Vec::new()),
        }
    }

    pub fn without_output(mut self) -> Self {
        self.output = None;
        self
    }

    pub fn gets(&self) -> u32 {
        *self.gets.lock().unwrap()
    }
}

#[async_trait]
impl OrderService for ScriptedPortal {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderSnapshot> {
        Ok(serde_json::from_value(json!({
            "id": ORDER_ID,
            "status": "pending",
            "data": [],
            "label": request.label
        }))?)
    }

    async fn get_order(&self, _order_id: &str) -> Result<OrderSnapshot> {
        *self.gets.lock().unwrap() += 1;

        let next = self.steps.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.last.lock().unwrap() = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(message)) => Err(OrderError::Transport(message)),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| OrderError::Transport("script is empty".to_string())),
        }
    }

    async fn invoke_action(
        &self,
        _order_id: &str,
        action: &str,
        payload: &ActionPayload,
    ) -> Result<()> {
        self.invoked
            .lock()
            .unwrap()
            .push((action.to_string(), payload.clone()));
        Ok(())
    }

    async fn action_output(&self, _order_id: &str, _action_id: &str) -> Result<String> {
        self.output
            .clone()
            .ok_or_else(|| OrderError::Transport("output unavailable".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    pub access_key: String,
    #[serde(default)]
    pub read_only: bool,
}

/// A recorded mutating call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub action: String,
    pub item_id: String,
    pub attrs: serde_json::Value,
}

#[derive(Default)]
struct PortalState {
    root_state: String,
    buckets: BTreeMap<String, (u64, bool)>,
    users: Vec<UserEntry>,
    calls: Vec<Call>,
    gets: u32,
    actions: u32,
    last_status: Option<String>,
    changing_polls: u32,
    changing_left: u32,
    fail_on: Option<(String, String)>,
}

/// In-memory portal holding one storage order with buckets (child items) and
/// users (a list in the root config)
pub struct FakePortal {
    state: Mutex<PortalState>,
}

impl FakePortal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PortalState {
                root_state: "on".to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn with_bucket(self, name: &str, max_size_gb: u64, versioning: bool) -> Self {
        self.state
            .lock()
            .unwrap()
            .buckets
            .insert(name.to_string(), (max_size_gb, versioning));
        self
    }

    pub fn with_user(self, name: &str, access_key: &str) -> Self {
        self.state.lock().unwrap().users.push(UserEntry {
            name: name.to_string(),
            access_key: access_key.to_string(),
            read_only: false,
        });
        self
    }

    pub fn with_root_state(self, state: &str) -> Self {
        self.state.lock().unwrap().root_state = state.to_string();
        self
    }

    /// Each action reports the order as changing for this many polls first.
    pub fn with_changing_polls(self, polls: u32) -> Self {
        self.state.lock().unwrap().changing_polls = polls;
        self
    }

    /// The next call of `action` on an entry named `name` ends with `status`
    /// and changes nothing.
    pub fn fail_on(&self, action: &str, name: &str, status: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_on = Some((format!("{}:{}", action, name), status.to_string()));
    }

    pub fn clear_failure(&self) {
        self.state.lock().unwrap().fail_on = None;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }

    pub fn gets(&self) -> u32 {
        self.state.lock().unwrap().gets
    }

    pub fn buckets(&self) -> BTreeMap<String, (u64, bool)> {
        self.state.lock().unwrap().buckets.clone()
    }

    pub fn users(&self) -> Vec<UserEntry> {
        self.state.lock().unwrap().users.clone()
    }

    fn render(state: &PortalState) -> OrderSnapshot {
        let mut items = vec![json!({
            "item_id": "root",
            "type": "storage",
            "parent": "",
            "data": {"state": state.root_state, "config": {"users": state.users}}
        })];
        for (name, (max_size_gb, versioning)) in &state.buckets {
            items.push(json!({
                "item_id": format!("bucket-{}", name),
                "type": "s3_bucket",
                "parent": "root",
                "data": {
                    "state": "on",
                    "config": {
                        "name": name,
                        "max_size_gb": max_size_gb,
                        "versioning": versioning,
                        "endpoint": format!("https://s3.example.net/{}", name)
                    }
                }
            }));
        }

        let changing = state.changing_left > 0;
        let status = if changing { "changing" } else { "success" };
        let mut value = json!({"id": ORDER_ID, "status": status, "data": items});
        if let Some(action_status) = &state.last_status {
            let action_status = if changing { "pending" } else { action_status.as_str() };
            value["last_action"] = json!({
                "id": format!("act-{}", state.actions),
                "status": action_status
            });
        }
        serde_json::from_value(value).unwrap()
    }

    fn apply(state: &mut PortalState, action: &str, item_id: &str, attrs: &serde_json::Value) {
        let bucket_name = item_id.trim_start_matches("bucket-").to_string();
        let text = |key: &str| attrs[key].as_str().unwrap_or_default().to_string();

        match action {
            "s3_bucket_create" => {
                let size = attrs["max_size_gb"].as_u64().unwrap_or_default();
                let versioning = attrs["versioning"].as_bool().unwrap_or_default();
                state.buckets.insert(text("name"), (size, versioning));
            }
            "s3_bucket_update" => {
                if let Some(bucket) = state.buckets.get_mut(&bucket_name) {
                    bucket.0 = attrs["max_size_gb"].as_u64().unwrap_or(bucket.0);
                    bucket.1 = attrs["versioning"].as_bool().unwrap_or(bucket.1);
                }
            }
            "s3_bucket_delete" => {
                state.buckets.remove(&bucket_name);
            }
            "s3_user_create" => state.users.push(UserEntry {
                name: text("name"),
                access_key: text("access_key"),
                read_only: attrs["read_only"].as_bool().unwrap_or_default(),
            }),
            "s3_user_update" => {
                let name = text("name");
                if let Some(user) = state.users.iter_mut().find(|u| u.name == name) {
                    user.read_only = attrs["read_only"].as_bool().unwrap_or_default();
                }
            }
            "s3_user_delete" => {
                let name = text("name");
                state.users.retain(|u| u.name != name);
            }
            other => panic!("unexpected action {}", other),
        }
    }
}

#[async_trait]
impl OrderService for FakePortal {
    async fn create_order(&self, _request: &CreateOrderRequest) -> Result<OrderSnapshot> {
        Err(OrderError::Transport("not supported".to_string()))
    }

    async fn get_order(&self, _order_id: &str) -> Result<OrderSnapshot> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        let snapshot = Self::render(&state);
        state.changing_left = state.changing_left.saturating_sub(1);
        Ok(snapshot)
    }

    async fn invoke_action(
        &self,
        _order_id: &str,
        action: &str,
        payload: &ActionPayload,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let attrs = serde_json::Value::Object(payload.order.attrs.clone());
        state.calls.push(Call {
            action: action.to_string(),
            item_id: payload.item_id.clone(),
            attrs: attrs.clone(),
        });
        state.actions += 1;
        state.changing_left = state.changing_polls;

        let name = attrs["name"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| payload.item_id.trim_start_matches("bucket-").to_string());
        let target = format!("{}:{}", action, name);

        match state.fail_on.take() {
            Some((failing, status)) if failing == target => {
                state.last_status = Some(status);
            }
            pending => {
                state.fail_on = pending;
                Self::apply(&mut state, action, &payload.item_id, &attrs);
                state.last_status = Some("success".to_string());
            }
        }
        Ok(())
    }

    async fn action_output(&self, _order_id: &str, action_id: &str) -> Result<String> {
        Ok(format!("{}: backend rejected the request", action_id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketSpec {
    pub max_size_gb: u64,
    pub versioning: bool,
}

pub fn bucket(max_size_gb: u64, versioning: bool) -> BucketSpec {
    BucketSpec {
        max_size_gb,
        versioning,
    }
}

/// Buckets are child items of type `s3_bucket`
pub struct Buckets;

impl Buckets {
    fn item_id<'a>(items: &'a ItemTree, name: &str) -> Result<&'a str> {
        let item = items.find(&format!("bucket '{}'", name), |item| {
            matches!(&item.config, ItemConfig::S3Bucket(config) if config.name == name)
        })?;
        Ok(item.id.as_str())
    }
}

impl Collection for Buckets {
    type Key = String;
    type Spec = BucketSpec;

    fn name(&self) -> &str {
        "bucket"
    }

    fn current(&self, items: &ItemTree) -> Result<BTreeMap<String, BucketSpec>> {
        Ok(items
            .all_by_type(&ItemKind::S3Bucket)
            .into_iter()
            .filter_map(|item| match &item.config {
                ItemConfig::S3Bucket(config) => Some((
                    config.name.clone(),
                    bucket(config.max_size_gb, config.versioning),
                )),
                _ => None,
            })
            .collect())
    }

    fn equal(&self, desired: &BucketSpec, current: &BucketSpec) -> bool {
        desired == current
    }

    fn validate(&self, key: &String, spec: &BucketSpec) -> Result<()> {
        let valid_name = (3..=63).contains(&key.len())
            && key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_name {
            return Err(OrderError::Validation(
                "name must be 3-63 lowercase letters, digits or '-'".to_string(),
            ));
        }
        if spec.max_size_gb == 0 {
            return Err(OrderError::Validation("max_size_gb must be positive".to_string()));
        }
        Ok(())
    }

    fn required_state(&self) -> Option<ItemState> {
        Some(ItemState::On)
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::quick().with_max_polls(10)
    }

    fn create(&self, items: &ItemTree, key: &String, desired: &BucketSpec) -> Result<ActionRequest> {
        Ok(ActionRequest::new("s3_bucket_create", items.root()?.id.clone()).with_attrs(json!({
            "name": key,
            "max_size_gb": desired.max_size_gb,
            "versioning": desired.versioning
        })))
    }

    fn update(
        &self,
        items: &ItemTree,
        key: &String,
        desired: &BucketSpec,
        _current: &BucketSpec,
    ) -> Result<ActionRequest> {
        Ok(
            ActionRequest::new("s3_bucket_update", Self::item_id(items, key)?).with_attrs(json!({
                "max_size_gb": desired.max_size_gb,
                "versioning": desired.versioning
            })),
        )
    }

    fn delete(&self, items: &ItemTree, key: &String, _current: &BucketSpec) -> Result<ActionRequest> {
        Ok(ActionRequest::new("s3_bucket_delete", Self::item_id(items, key)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserSpec {
    pub access_key: String,
    pub read_only: bool,
}

pub fn user(access_key: &str, read_only: bool) -> UserSpec {
    UserSpec {
        access_key: access_key.to_string(),
        read_only,
    }
}

/// Users live in the root item config; the access key cannot be changed in
/// place, and a warning on removal is accepted.
pub struct Users;

impl Collection for Users {
    type Key = String;
    type Spec = UserSpec;

    fn name(&self) -> &str {
        "user"
    }

    fn current(&self, items: &ItemTree) -> Result<BTreeMap<String, UserSpec>> {
        let users: Vec<UserEntry> = items.root()?.config.field("users").unwrap_or_default();
        Ok(users
            .into_iter()
            .map(|u| (u.name, user(&u.access_key, u.read_only)))
            .collect())
    }

    fn equal(&self, desired: &UserSpec, current: &UserSpec) -> bool {
        desired == current
    }

    fn identity_changed(&self, desired: &UserSpec, current: &UserSpec) -> bool {
        desired.access_key != current.access_key
    }

    fn create(&self, items: &ItemTree, key: &String, desired: &UserSpec) -> Result<ActionRequest> {
        Ok(ActionRequest::new("s3_user_create", items.root()?.id.clone()).with_attrs(json!({
            "name": key,
            "access_key": desired.access_key,
            "read_only": desired.read_only
        })))
    }

    fn update(
        &self,
        items: &ItemTree,
        key: &String,
        desired: &UserSpec,
        _current: &UserSpec,
    ) -> Result<ActionRequest> {
        Ok(ActionRequest::new("s3_user_update", items.root()?.id.clone())
            .with_attrs(json!({"name": key, "read_only": desired.read_only})))
    }

    fn delete(&self, items: &ItemTree, key: &String, _current: &UserSpec) -> Result<ActionRequest> {
        Ok(ActionRequest::new("s3_user_delete", items.root()?.id.clone())
            .with_attr("name", json!(key))
            .tolerate(Tolerance::AllowWarning))
    }
}

pub fn raw_items(value: serde_json::Value) -> Vec<RawItem> {
    serde_json::from_value(value).unwrap()
}
