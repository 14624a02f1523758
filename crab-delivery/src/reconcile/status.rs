//! 平台状态 → 内部状态

use shared::order::{OrderStatus, OrderType};
use shared::platform::{FulfillmentType, PlatformOrderStatus};

/// 平台订单状态映射到内部生命周期
///
/// 覆盖平台所有状态；未知状态落到 `Pending`，webhook 仍然正常确认。
pub fn map_external_status(status: PlatformOrderStatus) -> OrderStatus {
    match status {
        PlatformOrderStatus::Pending | PlatformOrderStatus::Placed => OrderStatus::Pending,
        PlatformOrderStatus::Accepted => OrderStatus::Confirmed,
        PlatformOrderStatus::Confirmed => OrderStatus::Preparing,
        PlatformOrderStatus::Rejected | PlatformOrderStatus::Canceled => OrderStatus::Cancelled,
        PlatformOrderStatus::Delivered => OrderStatus::Delivered,
        PlatformOrderStatus::Unknown => OrderStatus::Pending,
    }
}

/// 按履约方细化状态：自取订单是 picked up，不是 delivered
pub fn map_status_for_fulfillment(
    status: PlatformOrderStatus,
    fulfillment: FulfillmentType,
) -> OrderStatus {
    match (map_external_status(status), map_fulfillment(fulfillment)) {
        (OrderStatus::Delivered, OrderType::PickUp) => OrderStatus::PickedUp,
        (mapped, _) => mapped,
    }
}

pub fn map_fulfillment(fulfillment: FulfillmentType) -> OrderType {
    match fulfillment {
        FulfillmentType::Customer | FulfillmentType::TableService => OrderType::PickUp,
        FulfillmentType::Deliveroo
        | FulfillmentType::Restaurant
        | FulfillmentType::Autonomous
        | FulfillmentType::Unknown => OrderType::Delivery,
    }
}
