//! Typed platform API operations

use std::sync::Arc;

use chrono::Utc;
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::platform::{
    AcceptOrderRequest, AcknowledgeOrderRequest, ListOrdersQuery, OrdersListResponse, OrdersPage,
    PlatformOrder, PrepStageRequest, RestaurantOrdersQuery, SyncStatusReport,
    UpdateOrderRequest, UpdateOrderStatusRequest, WebhookConfig, WebhookKind,
};
use tokio_util::sync::CancellationToken;

use super::error::PlatformError;
use super::executor::{PlatformRequest, RequestExecutor};
use super::token::{ClientCredentials, TokenManager};
use crate::config::Config;

/// Auth and API hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEndpoints {
    pub auth_base: String,
    pub api_base: String,
}

impl PlatformEndpoints {
    pub fn production() -> Self {
        Self {
            auth_base: "https://auth.developers.deliveroo.com".into(),
            api_base: "https://api.developers.deliveroo.com".into(),
        }
    }

    pub fn sandbox() -> Self {
        Self {
            auth_base: "https://auth-sandbox.developers.deliveroo.com".into(),
            api_base: "https://api-sandbox.developers.deliveroo.com".into(),
        }
    }

    /// Both hosts at one base URL (local stubs)
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            auth_base: base.clone(),
            api_base: base,
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.auth_base)
    }

    fn order(&self) -> String {
        format!("{}/order", self.api_base)
    }

    fn menu(&self) -> String {
        format!("{}/menu", self.api_base)
    }

    fn site(&self) -> String {
        format!("{}/site", self.api_base)
    }
}

pub struct PlatformClient {
    executor: RequestExecutor,
    endpoints: PlatformEndpoints,
}

impl PlatformClient {
    pub fn new(executor: RequestExecutor, endpoints: PlatformEndpoints) -> Self {
        Self {
            executor,
            endpoints,
        }
    }

    /// Wire up HTTP client, token manager and executor from configuration
    pub fn from_config(config: &Config, shutdown: CancellationToken) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let tokens = Arc::new(TokenManager::new(
            http.clone(),
            config.endpoints.token_url(),
            ClientCredentials {
                client_id: config.platform_client_id.clone(),
                client_secret: config.platform_client_secret.clone(),
            },
            config.token_refresh_buffer,
        ));
        let executor = RequestExecutor::new(http, tokens, config.retry, shutdown);
        Ok(Self::new(executor, config.endpoints.clone()))
    }

    // ==================== Orders ====================

    pub async fn list_orders(
        &self,
        query: &ListOrdersQuery,
    ) -> Result<OrdersListResponse, PlatformError> {
        let mut request = PlatformRequest::get(format!("{}/v2/orders", self.endpoints.order()));
        if let Some(status) = query.status {
            request = request.query("status", status.as_str());
        }
        if let Some(since) = query.since {
            request = request.query("since", since.to_rfc3339());
        }
        if let Some(location_id) = &query.location_id {
            request = request.query("location_id", location_id);
        }
        self.fetch(&request).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<PlatformOrder, PlatformError> {
        let request =
            PlatformRequest::get(format!("{}/v2/orders/{order_id}", self.endpoints.order()));
        self.fetch(&request).await
    }

    pub async fn list_restaurant_orders(
        &self,
        brand_id: &str,
        restaurant_id: &str,
        query: &RestaurantOrdersQuery,
    ) -> Result<OrdersPage, PlatformError> {
        let mut request = PlatformRequest::get(format!(
            "{}/v2/brand/{brand_id}/restaurant/{restaurant_id}/orders",
            self.endpoints.order()
        ));
        if let Some(start) = query.start_date {
            request = request.query("start_date", start.to_rfc3339());
        }
        if let Some(end) = query.end_date {
            request = request.query("end_date", end.to_rfc3339());
        }
        if let Some(cursor) = &query.cursor {
            request = request.query("cursor", cursor);
        }
        if let Some(live) = query.live_orders {
            request = request.query("live_orders", live.to_string());
        }
        self.fetch(&request).await
    }

    pub async fn acknowledge_order(&self, order_id: &str) -> Result<(), PlatformError> {
        let request = PlatformRequest::new(
            Method::POST,
            format!("{}/v1/orders/{order_id}/acknowledge", self.endpoints.order()),
        )
        .json(&AcknowledgeOrderRequest {
            acknowledged_at: Utc::now(),
        })?
        .idempotent();
        self.send(&request).await
    }

    pub async fn accept_order(
        &self,
        order_id: &str,
        preparation_minutes: u32,
    ) -> Result<(), PlatformError> {
        let request = PlatformRequest::new(
            Method::POST,
            format!("{}/v1/orders/{order_id}/accept", self.endpoints.order()),
        )
        .json(&AcceptOrderRequest {
            accepted_at: Utc::now(),
            preparation_minutes,
        })?
        .idempotent();
        self.send(&request).await
    }

    /// Accept, reject or confirm an order (`PATCH`, answers 204)
    pub async fn update_order(
        &self,
        order_id: &str,
        update: &UpdateOrderRequest,
    ) -> Result<(), PlatformError> {
        let request = PlatformRequest::new(
            Method::PATCH,
            format!("{}/v1/orders/{order_id}", self.endpoints.order()),
        )
        .json(update)?
        .idempotent();
        self.send(&request).await
    }

    pub async fn update_order_status(
        &self,
        order_id: &str,
        update: &UpdateOrderStatusRequest,
    ) -> Result<(), PlatformError> {
        let request = PlatformRequest::new(
            Method::PUT,
            format!("{}/v1/orders/{order_id}/status", self.endpoints.order()),
        )
        .json(update)?
        .idempotent();
        self.send(&request).await
    }

    /// Tell the platform whether the order reached us
    pub async fn create_sync_status(
        &self,
        order_id: &str,
        report: &SyncStatusReport,
    ) -> Result<(), PlatformError> {
        let request = PlatformRequest::new(
            Method::POST,
            format!("{}/v1/orders/{order_id}/sync_status", self.endpoints.order()),
        )
        .json(report)?
        .idempotent();
        self.send(&request).await
    }

    pub async fn create_prep_stage(
        &self,
        order_id: &str,
        stage: &PrepStageRequest,
    ) -> Result<(), PlatformError> {
        let request = PlatformRequest::new(
            Method::POST,
            format!("{}/v1/orders/{order_id}/prep_stage", self.endpoints.order()),
        )
        .json(stage)?
        .idempotent();
        self.send(&request).await
    }

    // ==================== Menus ====================

    pub async fn pull_menu(&self, brand_id: &str, menu_id: &str) -> Result<Value, PlatformError> {
        let request = PlatformRequest::get(format!(
            "{}/v1/brands/{brand_id}/menus/{menu_id}",
            self.endpoints.menu()
        ));
        self.fetch(&request).await
    }

    /// Upload a menu document as-is; the result arrives later as a webhook
    pub async fn push_menu(
        &self,
        brand_id: &str,
        menu_id: &str,
        menu: &Value,
    ) -> Result<(), PlatformError> {
        let request = PlatformRequest::new(
            Method::PUT,
            format!("{}/v1/brands/{brand_id}/menus/{menu_id}", self.endpoints.menu()),
        )
        .json(menu)?
        .idempotent();
        self.send(&request).await
    }

    // ==================== Integrator configuration ====================

    pub async fn get_webhook_config(&self, kind: WebhookKind) -> Result<WebhookConfig, PlatformError> {
        let request = PlatformRequest::get(self.webhook_config_url(kind));
        self.fetch(&request).await
    }

    pub async fn set_webhook_config(
        &self,
        kind: WebhookKind,
        config: &WebhookConfig,
    ) -> Result<(), PlatformError> {
        let request = PlatformRequest::new(Method::PUT, self.webhook_config_url(kind))
            .json(config)?
            .idempotent();
        self.send(&request).await
    }

    pub async fn get_sites_config(&self, brand_id: &str) -> Result<Value, PlatformError> {
        let request = PlatformRequest::get(self.sites_config_url(brand_id));
        self.fetch(&request).await
    }

    pub async fn set_sites_config(&self, brand_id: &str, config: &Value) -> Result<(), PlatformError> {
        let request = PlatformRequest::new(Method::PUT, self.sites_config_url(brand_id))
            .json(config)?
            .idempotent();
        self.send(&request).await
    }

    fn webhook_config_url(&self, kind: WebhookKind) -> String {
        format!(
            "{}/v1/integrator/webhooks/{}",
            self.endpoints.order(),
            kind.path_segment()
        )
    }

    fn sites_config_url(&self, brand_id: &str) -> String {
        format!(
            "{}/v1/integrator/brands/{brand_id}/sites-config",
            self.endpoints.site()
        )
    }

    // ==================== Helpers ====================

    async fn send(&self, request: &PlatformRequest) -> Result<(), PlatformError> {
        let response = self.executor.execute(request).await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn fetch<T: DeserializeOwned>(&self, request: &PlatformRequest) -> Result<T, PlatformError> {
        let response = self.executor.execute(request).await?;
        let response = expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PlatformError::UnexpectedStatus { status, body })
}
