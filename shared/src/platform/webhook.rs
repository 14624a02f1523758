//! Webhook event bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event discriminator values
pub const EVENT_ORDER_NEW: &str = "order.new";
pub const EVENT_ORDER_STATUS_UPDATE: &str = "order.status_update";
pub const EVENT_RIDER_STATUS_UPDATE: &str = "rider.status_update";
pub const EVENT_MENU_UPLOAD_RESULT: &str = "menu.upload_result";

/// Key of the order object inside `order.new` / `order.status_update` bodies
pub const ORDER_BODY_FIELD: &str = "order";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderStatus {
    RiderAssigned,
    RiderArrived,
    RiderConfirmedAtRestaurant,
    RiderInTransit,
    RiderUnassigned,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderStatusLogItem {
    pub at: DateTime<Utc>,
    pub status: RiderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderInfo {
    #[serde(default)]
    pub estimated_arrival_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_log: Vec<RiderStatusLogItem>,
}

impl RiderInfo {
    /// Most recent status in the log
    pub fn latest_status(&self) -> Option<RiderStatus> {
        self.status_log.last().map(|item| item.status)
    }
}

/// Body of `rider.status_update`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderEventBody {
    pub order_id: String,
    #[serde(default)]
    pub riders: Vec<RiderInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuUploadError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuUploadResult {
    pub http_status: u16,
    #[serde(default)]
    pub menu_id: String,
    #[serde(default)]
    pub brand_id: String,
    #[serde(default)]
    pub site_ids: Vec<String>,
    #[serde(default)]
    pub errors: Vec<MenuUploadError>,
}

impl MenuUploadResult {
    pub fn is_success(&self) -> bool {
        self.http_status == 200
    }
}

/// Body of `menu.upload_result`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEventBody {
    pub menu_upload_result: MenuUploadResult,
}
