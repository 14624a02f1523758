//! Platform order payload as delivered by webhooks and the order API

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Order status vocabulary used by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformOrderStatus {
    Pending,
    Placed,
    Accepted,
    Confirmed,
    Rejected,
    Canceled,
    Delivered,
    /// Any status this build does not know about yet
    #[serde(other)]
    Unknown,
}

impl PlatformOrderStatus {
    /// Every declared status, including the catch-all
    pub const ALL: [PlatformOrderStatus; 8] = [
        Self::Pending,
        Self::Placed,
        Self::Accepted,
        Self::Confirmed,
        Self::Rejected,
        Self::Canceled,
        Self::Delivered,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Placed => "placed",
            Self::Accepted => "accepted",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Canceled => "canceled",
            Self::Delivered => "delivered",
            Self::Unknown => "unknown",
        }
    }
}

/// Who delivers the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    /// Platform rider
    Deliveroo,
    /// Restaurant's own courier
    Restaurant,
    /// Customer collects
    Customer,
    TableService,
    Autonomous,
    #[serde(other)]
    Unknown,
}

impl FulfillmentType {
    pub const ALL: [FulfillmentType; 6] = [
        Self::Deliveroo,
        Self::Restaurant,
        Self::Customer,
        Self::TableService,
        Self::Autonomous,
        Self::Unknown,
    ];
}

/// Money in minor units (cents) plus ISO currency code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonetaryAmount {
    pub fractional: i64,
    #[serde(default)]
    pub currency_code: String,
}

impl MonetaryAmount {
    pub fn new(fractional: i64, currency_code: impl Into<String>) -> Self {
        Self {
            fractional,
            currency_code: currency_code.into(),
        }
    }

    /// Exact decimal value in major units (1250 → 12.50)
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.fractional, 2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLogItem {
    pub at: DateTime<Utc>,
    pub status: PlatformOrderStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub address_line_1: String,
    #[serde(default)]
    pub address_line_2: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    #[serde(default)]
    pub delivery_fee: MonetaryAmount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<DeliveryAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delivery_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFee {
    #[serde(rename = "type")]
    pub fee_type: String,
    pub cost_per_unit: MonetaryAmount,
}

/// A line item; modifiers nest recursively
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Our product id as configured in the platform menu
    #[serde(default)]
    pub pos_item_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub operational_name: String,
    #[serde(default)]
    pub unit_price: MonetaryAmount,
    #[serde(default)]
    pub total_price: MonetaryAmount,
    #[serde(default)]
    pub menu_unit_price: MonetaryAmount,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_fees: Vec<ItemFee>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<OrderItem>,
    #[serde(default)]
    pub discount_amount: MonetaryAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeDescription {
    #[serde(rename = "type")]
    pub fee_type: String,
    pub amount: MonetaryAmount,
    #[serde(default)]
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: MonetaryAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyInfo {
    pub loyalty_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub contact_number: String,
    #[serde(default)]
    pub contact_access_code: String,
    #[serde(default)]
    pub order_frequency_at_site: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loyalty: Option<LoyaltyInfo>,
}

/// Order as sent by the platform
///
/// Only `id` and `status` are strictly required; everything else defaults so
/// that a sparse payload from a newer API version still decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformOrder {
    pub id: String,
    #[serde(default)]
    pub order_number: String,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub brand_id: String,
    #[serde(default)]
    pub display_id: String,
    pub status: PlatformOrderStatus,
    #[serde(default)]
    pub status_log: Vec<StatusLogItem>,
    #[serde(default = "default_fulfillment")]
    pub fulfillment_type: FulfillmentType,
    #[serde(default)]
    pub order_notes: String,
    #[serde(default)]
    pub cutlery_notes: String,
    #[serde(default)]
    pub asap: bool,
    #[serde(default)]
    pub prepare_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub table_number: String,
    #[serde(default)]
    pub subtotal: MonetaryAmount,
    #[serde(default)]
    pub delivery: Option<DeliveryDetails>,
    #[serde(default)]
    pub total_price: MonetaryAmount,
    #[serde(default)]
    pub partner_order_subtotal: MonetaryAmount,
    #[serde(default)]
    pub partner_order_total: MonetaryAmount,
    #[serde(default)]
    pub offer_discount: MonetaryAmount,
    #[serde(default)]
    pub cash_due: MonetaryAmount,
    #[serde(default)]
    pub bag_fee: MonetaryAmount,
    #[serde(default)]
    pub surcharge: MonetaryAmount,
    #[serde(default)]
    pub fee_breakdown: Vec<FeeDescription>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub start_preparing_at: Option<DateTime<Utc>>,
    /// Set for scheduled orders
    #[serde(default)]
    pub confirm_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub promotions: Vec<Promotion>,
    #[serde(default)]
    pub is_tabletless: bool,
    #[serde(default)]
    pub customer: Option<CustomerDetails>,
}

fn default_fulfillment() -> FulfillmentType {
    FulfillmentType::Deliveroo
}

impl PlatformOrder {
    pub fn delivery_address(&self) -> Option<&DeliveryAddress> {
        self.delivery.as_ref().and_then(|d| d.address.as_ref())
    }
}

/// Order exactly as it arrived, next to its typed view.
///
/// `raw` is never re-encoded from `order`: statuses this build maps to
/// `Unknown` and fields `PlatformOrder` does not declare are kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedOrder {
    pub order: PlatformOrder,
    pub raw: Value,
}

impl ReceivedOrder {
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        let order = PlatformOrder::deserialize(&raw)?;
        Ok(Self { order, raw })
    }
}

/// `GET /v2/orders` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdersListResponse {
    #[serde(default)]
    pub orders: Vec<PlatformOrder>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// Cursor page of a restaurant's orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdersPage {
    #[serde(default)]
    pub orders: Vec<PlatformOrder>,
    /// Cursor for the next page, absent on the last one
    #[serde(default)]
    pub next: Option<String>,
}
