//! Internal order model
//!
//! The order aggregate as the rest of the system sees it. Platform orders are
//! converted into this shape by the reconciler; nothing here knows about any
//! particular delivery platform's wire format.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    AwaitingPickUp,
    PickedUp,
    OutForDelivery,
    Delivered,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::AwaitingPickUp,
        Self::PickedUp,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Cancelled,
        Self::Failed,
    ];

    /// Parse from database string value
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "PREPARING" => Some(Self::Preparing),
            "AWAITING_PICK_UP" => Some(Self::AwaitingPickUp),
            "PICKED_UP" => Some(Self::PickedUp),
            "OUT_FOR_DELIVERY" => Some(Self::OutForDelivery),
            "DELIVERED" => Some(Self::Delivered),
            "CANCELLED" => Some(Self::Cancelled),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Database string representation
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Preparing => "PREPARING",
            Self::AwaitingPickUp => "AWAITING_PICK_UP",
            Self::PickedUp => "PICKED_UP",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        }
    }
}

/// How the order reaches the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "DELIVERY")]
    Delivery,
    #[serde(rename = "PICKUP")]
    PickUp,
}

impl OrderType {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "DELIVERY" => Some(Self::Delivery),
            "PICKUP" => Some(Self::PickUp),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Delivery => "DELIVERY",
            Self::PickUp => "PICKUP",
        }
    }
}

/// External system an order was imported from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSource {
    Deliveroo,
}

impl OrderSource {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "DELIVEROO" => Some(Self::Deliveroo),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Deliveroo => "DELIVEROO",
        }
    }
}

/// Outcome of matching a free-text delivery address against the address book.
///
/// Exactly one of "resolved id" or "raw text" exists for any order, so the
/// two are variants of one enum rather than two optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddressMatch {
    /// Matched a normalized internal address row
    Resolved { address_id: String },
    /// No match; human-readable concatenation of the platform fields
    Raw { text: String },
}

impl AddressMatch {
    pub fn address_id(&self) -> Option<&str> {
        match self {
            Self::Resolved { address_id } => Some(address_id),
            Self::Raw { .. } => None,
        }
    }

    pub fn address_extra(&self) -> Option<&str> {
        match self {
            Self::Resolved { .. } => None,
            Self::Raw { text } => Some(text),
        }
    }

    /// Rebuild from the two nullable columns; `None` if both or neither are set.
    pub fn from_columns(address_id: Option<String>, address_extra: Option<String>) -> Option<Self> {
        match (address_id, address_extra) {
            (Some(address_id), None) => Some(Self::Resolved { address_id }),
            (None, Some(text)) => Some(Self::Raw { text }),
            _ => None,
        }
    }
}

/// Correlation between an internal order and the platform order it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformRef {
    pub platform_order_id: String,
    pub source: OrderSource,
}

impl PlatformRef {
    pub fn new(platform_order_id: impl Into<String>, source: OrderSource) -> Self {
        Self {
            platform_order_id: platform_order_id.into(),
            source,
        }
    }
}

/// Internal order aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalOrder {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub platform: Option<PlatformRef>,
    pub order_status: OrderStatus,
    pub order_type: OrderType,
    pub is_online_payment: bool,
    pub discount_amount: Decimal,
    pub delivery_fee: Option<Decimal>,
    pub total_price: Decimal,
    pub estimated_ready_time: Option<DateTime<Utc>>,
    pub address: AddressMatch,
    pub order_note: Option<String>,
    /// Raw platform payload kept verbatim for audit and replay
    pub platform_data: Option<serde_json::Value>,
}

/// Persisted line item (top-level platform items only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}
