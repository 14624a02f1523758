//! Outbound request bodies for the platform order API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::PlatformOrderStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgeOrderRequest {
    pub acknowledged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptOrderRequest {
    pub accepted_at: DateTime<Utc>,
    pub preparation_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: PlatformOrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_at: Option<DateTime<Utc>>,
}

/// Decision sent with `PATCH /v1/orders/{id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDecision {
    Accepted,
    Rejected,
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Closing,
    Busy,
    IngredientUnavailable,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: OrderDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UpdateOrderRequest {
    pub fn accept() -> Self {
        Self {
            status: OrderDecision::Accepted,
            reject_reason: None,
            notes: None,
        }
    }

    pub fn reject(reason: RejectReason, notes: Option<String>) -> Self {
        Self {
            status: OrderDecision::Rejected,
            reject_reason: Some(reason),
            notes,
        }
    }

    pub fn confirm() -> Self {
        Self {
            status: OrderDecision::Confirmed,
            reject_reason: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Succeeded,
    Failed,
}

/// Why an order could not be ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFailureReason {
    PriceMismatched,
    PosItemIdMismatched,
    PosItemIdNotFound,
    ItemsOutOfStock,
    LocationOffline,
    LocationNotSupported,
    UnsupportedOrderType,
    NoWebhookUrl,
    WebhookFailed,
    TimedOut,
    Other,
}

/// Tells the platform whether an order reached us
///
/// A failed report always carries a reason; the constructors are the only
/// way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusReport {
    status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<SyncFailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl SyncStatusReport {
    pub fn succeeded(occurred_at: DateTime<Utc>) -> Self {
        Self {
            status: SyncStatus::Succeeded,
            reason: None,
            notes: None,
            occurred_at,
        }
    }

    pub fn failed(
        reason: SyncFailureReason,
        notes: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: SyncStatus::Failed,
            reason: Some(reason),
            notes: Some(notes.into()),
            occurred_at,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn reason(&self) -> Option<SyncFailureReason> {
        self.reason
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Kitchen progress reported to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepStage {
    InKitchen,
    ReadyForCollectionSoon,
    ReadyForCollection,
    Collected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepStageRequest {
    pub stage: PrepStage,
    pub occurred_at: DateTime<Utc>,
    /// Extra minutes needed, only meaningful with `in_kitchen`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
}

/// Filters for `GET /v2/orders`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListOrdersQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PlatformOrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

/// Filters for the per-restaurant order listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestaurantOrdersQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_orders: Option<bool>,
}

/// Which webhook subscription to configure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    OrderEvents,
    RiderEvents,
}

impl WebhookKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::OrderEvents => "order-events",
            Self::RiderEvents => "rider-events",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub webhook_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sites_config: Option<Vec<SiteWebhookConfig>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteWebhookConfig {
    pub location_id: String,
    #[serde(default)]
    pub orders_api_webhook_type: Option<String>,
}
