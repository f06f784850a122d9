//! Portal order API client
//!
//! Bearer-token JSON client for the four order endpoints the engine uses.

use crate::error::{PortalHttpError, Result};
use async_trait::async_trait;
use portalflow_order::{ActionPayload, CreateOrderRequest, OrderService, OrderSnapshot};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`PortalClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the portal API, e.g. `https://portal.example.net/api/v1`
    pub api_url: String,
    pub token: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Portal API client
pub struct PortalClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl PortalClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config.api_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(PortalHttpError::InvalidConfig(format!(
                "api_url must be an http(s) URL, got '{}'",
                config.api_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("portalflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.token)
    }

    /// Send a request and return the body of a 2xx response.
    async fn execute(&self, builder: RequestBuilder, method: &Method, path: &str) -> Result<String> {
        tracing::debug!("{} {}", method, path);

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PortalHttpError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn order_path(order_id: &str) -> String {
    format!("orders/{}", order_id)
}

fn action_path(order_id: &str, action: &str) -> String {
    format!("orders/{}/actions/{}", order_id, action)
}

fn output_path(order_id: &str, action_id: &str) -> String {
    format!(
        "orders/{}/actions/history/{}/output",
        order_id, action_id
    )
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|source| PortalHttpError::Decode {
        path: path.to_string(),
        source,
    })
}

#[async_trait]
impl OrderService for PortalClient {
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> portalflow_order::Result<OrderSnapshot> {
        let path = "orders";
        let builder = self.request(Method::POST, path).json(request);
        let body = self.execute(builder, &Method::POST, path).await?;
        Ok(decode(path, &body)?)
    }

    async fn get_order(&self, order_id: &str) -> portalflow_order::Result<OrderSnapshot> {
        let path = order_path(order_id);
        let builder = self
            .request(Method::GET, &path)
            .query(&[("include", "last_action")]);
        let body = self.execute(builder, &Method::GET, &path).await?;
        Ok(decode(&path, &body)?)
    }

    async fn invoke_action(
        &self,
        order_id: &str,
        action: &str,
        payload: &ActionPayload,
    ) -> portalflow_order::Result<()> {
        let path = action_path(order_id, action);
        let builder = self.request(Method::PATCH, &path).json(payload);
        self.execute(builder, &Method::PATCH, &path).await?;
        Ok(())
    }

    async fn action_output(
        &self,
        order_id: &str,
        action_id: &str,
    ) -> portalflow_order::Result<String> {
        let path = output_path(order_id, action_id);
        let builder = self.request(Method::GET, &path);
        Ok(self.execute(builder, &Method::GET, &path).await?)
    }
}
