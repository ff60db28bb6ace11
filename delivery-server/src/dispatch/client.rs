//! Shipday HTTP client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::error::{DispatchError, DispatchResult};
use super::types::{
    CarrierView, ProviderOrderView, RemoteOrderCreated, RemoteOrderRequest, parse_carriers,
    parse_created, parse_order_list, parse_single_order,
};
use super::DispatchProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.shipday.com";

/// Max characters of an error body kept in [`DispatchError::Upstream`]
const ERROR_BODY_LIMIT: usize = 512;

/// Client for the Shipday dispatch API
#[derive(Debug, Clone)]
pub struct ShipdayClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ShipdayClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> DispatchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn auth_header(&self) -> String {
        format!("Basic {}", self.api_key)
    }

    async fn get_json(&self, path: &str) -> DispatchResult<Option<Value>> {
        let response = self
            .client
            .get(self.url(path))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Map a response to JSON. `Ok(None)` means 404.
    async fn handle_response(response: reqwest::Response) -> DispatchResult<Option<Value>> {
        let status = response.status();

        if !status.is_success() {
            return match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DispatchError::Auth {
                    status: status.as_u16(),
                }),
                StatusCode::NOT_FOUND => Ok(None),
                _ => {
                    let body: String = response
                        .text()
                        .await
                        .unwrap_or_default()
                        .chars()
                        .take(ERROR_BODY_LIMIT)
                        .collect();
                    Err(DispatchError::Upstream {
                        status: status.as_u16(),
                        body,
                    })
                }
            };
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Some(Value::Null));
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| DispatchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DispatchProvider for ShipdayClient {
    async fn create_remote_order(
        &self,
        request: &RemoteOrderRequest,
    ) -> DispatchResult<RemoteOrderCreated> {
        let response = self
            .client
            .post(self.url("orders"))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(request)
            .send()
            .await?;

        match Self::handle_response(response).await? {
            Some(body) => parse_created(&body),
            None => Err(DispatchError::NotFound),
        }
    }

    async fn fetch_order(&self, provider_order_id: &str) -> DispatchResult<Option<ProviderOrderView>> {
        match self.get_json(&format!("orders/{provider_order_id}")).await? {
            Some(body) => parse_single_order(&body),
            None => Ok(None),
        }
    }

    async fn list_active_orders(&self) -> DispatchResult<Vec<ProviderOrderView>> {
        match self.get_json("orders").await? {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(body) => parse_order_list(&body),
        }
    }

    async fn list_carriers(&self) -> DispatchResult<Vec<CarrierView>> {
        match self.get_json("carriers").await? {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(body) => parse_carriers(&body),
        }
    }
}
