//! 平台订单 → 内部订单对账
//!
//! 每个平台订单只生效一次：首个 `order.new` 创建订单，重投不做任何事，
//! 状态更新只作用于已存在的订单。

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use shared::order::{InternalOrder, OrderLineItem, OrderSource, OrderStatus, PlatformRef};
use shared::platform::{
    MenuUploadResult, OrderItem, PlatformOrder, ReceivedOrder, RiderEventBody, SyncFailureReason,
    SyncStatusReport,
};
use thiserror::Error;
use uuid::Uuid;

use super::address::AddressResolver;
use super::status::{map_fulfillment, map_status_for_fulfillment};
use super::sync_report::SyncReporter;
use crate::db::{OrderRepository, ProductRepository, RepoError};
use crate::live::{EventPublisher, topics};
use crate::platform::WebhookEvent;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// What happened to a webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created { order_id: Uuid, line_items: usize },
    /// Order already existed; nothing written
    Duplicate { order_id: Option<Uuid> },
    Updated { order_id: Uuid, status: OrderStatus },
    RiderPublished { order_id: Uuid },
    /// Event refers to an order that was never created here
    NotFound,
    /// Logged only (menu upload results)
    Acknowledged,
    /// Event type this build does not handle
    Ignored,
}

impl ReconcileOutcome {
    /// Status string returned in the webhook acknowledgement
    pub fn ack_status(&self) -> &'static str {
        match self {
            Self::Created { .. }
            | Self::Updated { .. }
            | Self::RiderPublished { .. }
            | Self::Acknowledged => "received",
            Self::Duplicate { .. } => "duplicate",
            Self::NotFound => "not_found",
            Self::Ignored => "ignored",
        }
    }
}

pub struct OrderReconciler {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    addresses: AddressResolver,
    events: Arc<dyn EventPublisher>,
    sync: SyncReporter,
    source: OrderSource,
}

impl OrderReconciler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        addresses: AddressResolver,
        events: Arc<dyn EventPublisher>,
        sync: SyncReporter,
    ) -> Self {
        Self {
            orders,
            products,
            addresses,
            events,
            sync,
            source: OrderSource::Deliveroo,
        }
    }

    pub fn sync_reporter(&self) -> &SyncReporter {
        &self.sync
    }

    pub async fn handle_event(
        &self,
        event: &WebhookEvent,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match event {
            WebhookEvent::OrderNew(order) => self.handle_new_order(order).await,
            WebhookEvent::OrderStatusUpdate(order) => self.handle_status_update(order).await,
            WebhookEvent::RiderStatusUpdate(body) => self.handle_rider_update(body).await,
            WebhookEvent::MenuUploadResult(result) => {
                self.handle_menu_upload_result(result);
                Ok(ReconcileOutcome::Acknowledged)
            }
            WebhookEvent::Unknown { event } => {
                tracing::debug!(event = %event, "Ignoring unknown webhook event");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    /// 为新平台订单创建内部订单，最多一次
    ///
    /// 同步上报（成功或失败）在后台派发；重复事件不上报。
    pub async fn handle_new_order(
        &self,
        received: &ReceivedOrder,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let order = &received.order;
        tracing::info!(
            platform_order_id = %order.id,
            display_id = %order.display_id,
            "Received new platform order"
        );

        match self.create_order(received).await {
            Ok(outcome) => {
                if matches!(outcome, ReconcileOutcome::Created { .. }) {
                    self.sync.succeeded(order.id.clone());
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(
                    platform_order_id = %order.id,
                    error = %e,
                    "Failed to create platform order"
                );
                self.sync.report(
                    order.id.clone(),
                    SyncStatusReport::failed(
                        SyncFailureReason::WebhookFailed,
                        format!("Failed to create order: {e}"),
                        Utc::now(),
                    ),
                );
                Err(e)
            }
        }
    }

    async fn create_order(
        &self,
        received: &ReceivedOrder,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let order = &received.order;
        let key = PlatformRef::new(order.id.clone(), self.source);

        if let Some(existing) = self.orders.find_by_platform_id(&key).await? {
            tracing::info!(
                platform_order_id = %order.id,
                order_id = %existing.id,
                "Order already exists, skipping creation"
            );
            return Ok(ReconcileOutcome::Duplicate {
                order_id: Some(existing.id),
            });
        }

        let internal = self.build_order(key, received).await;
        let items = self.build_line_items(&order.items).await;
        tracing::info!(
            platform_order_id = %order.id,
            mapped = items.len(),
            total = order.items.len(),
            "Mapped platform items to products"
        );

        match self.orders.save_with_line_items(&internal, &items).await {
            Ok(()) => {}
            // 同一事件的并发投递先完成了插入
            Err(RepoError::Duplicate(_)) => {
                tracing::info!(platform_order_id = %order.id, "Order created concurrently, skipping");
                return Ok(ReconcileOutcome::Duplicate { order_id: None });
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            order_id = %internal.id,
            platform_order_id = %order.id,
            line_items = items.len(),
            "Created platform order"
        );

        self.publish_order(&topics::order_new(self.source), &internal);
        self.publish_order(&topics::order_update(internal.id), &internal);

        Ok(ReconcileOutcome::Created {
            order_id: internal.id,
            line_items: items.len(),
        })
    }

    /// 把平台状态变更应用到已有订单，从不创建订单
    pub async fn handle_status_update(
        &self,
        received: &ReceivedOrder,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let order = &received.order;
        let key = PlatformRef::new(order.id.clone(), self.source);
        tracing::info!(
            platform_order_id = %order.id,
            status = order.status.as_str(),
            "Received platform status update"
        );

        if self.orders.find_by_platform_id(&key).await?.is_none() {
            tracing::warn!(platform_order_id = %order.id, "Order not found for status update");
            return Ok(ReconcileOutcome::NotFound);
        }

        let status = map_status_for_fulfillment(order.status, order.fulfillment_type);
        let updated = match self.orders.update_status(&key, status, &received.raw).await {
            Ok(updated) => updated,
            Err(RepoError::NotFound(_)) => {
                tracing::warn!(platform_order_id = %order.id, "Order disappeared before update");
                return Ok(ReconcileOutcome::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        self.publish_order(&topics::order_update(updated.id), &updated);
        tracing::info!(order_id = %updated.id, status = status.as_db(), "Updated order status");

        Ok(ReconcileOutcome::Updated {
            order_id: updated.id,
            status,
        })
    }

    pub async fn handle_rider_update(
        &self,
        body: &RiderEventBody,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let key = PlatformRef::new(body.order_id.clone(), self.source);
        let Some(order) = self.orders.find_by_platform_id(&key).await? else {
            tracing::warn!(platform_order_id = %body.order_id, "Order not found for rider update");
            return Ok(ReconcileOutcome::NotFound);
        };

        tracing::info!(
            order_id = %order.id,
            riders = body.riders.len(),
            latest = ?body.riders.first().and_then(|r| r.latest_status()),
            "Rider update"
        );
        self.events.publish(
            &topics::rider_update(order.id),
            json!({ "orderId": order.id, "riders": body.riders }),
        );

        Ok(ReconcileOutcome::RiderPublished { order_id: order.id })
    }

    pub fn handle_menu_upload_result(&self, result: &MenuUploadResult) {
        if result.is_success() {
            tracing::info!(
                menu_id = %result.menu_id,
                brand_id = %result.brand_id,
                sites = ?result.site_ids,
                "Menu upload succeeded"
            );
            return;
        }

        tracing::warn!(
            menu_id = %result.menu_id,
            brand_id = %result.brand_id,
            http_status = result.http_status,
            "Menu upload failed"
        );
        for err in &result.errors {
            tracing::warn!(
                code = %err.code,
                field = err.field.as_deref().unwrap_or("-"),
                "{}",
                err.message
            );
        }
    }

    async fn build_order(&self, key: PlatformRef, received: &ReceivedOrder) -> InternalOrder {
        let order = &received.order;
        let address = self.addresses.resolve(order.delivery_address()).await;
        let now = Utc::now();

        InternalOrder {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            platform: Some(key),
            order_status: map_status_for_fulfillment(order.status, order.fulfillment_type),
            order_type: map_fulfillment(order.fulfillment_type),
            // 平台订单均为在线支付
            is_online_payment: true,
            discount_amount: order.offer_discount.to_decimal(),
            delivery_fee: order.delivery.as_ref().map(|d| d.delivery_fee.to_decimal()),
            total_price: order.total_price.to_decimal(),
            estimated_ready_time: order.prepare_for,
            address,
            order_note: build_note(order),
            platform_data: Some(received.raw.clone()),
        }
    }

    /// Top-level items that reference a known product; modifiers stay in the
    /// raw payload only.
    async fn build_line_items(&self, items: &[OrderItem]) -> Vec<OrderLineItem> {
        let mut lines = Vec::with_capacity(items.len());

        for item in items {
            let Some(pos_item_id) = item.pos_item_id.as_deref().filter(|id| !id.is_empty()) else {
                tracing::warn!(item = %item.name, "Skipping item without pos_item_id");
                continue;
            };
            let Ok(product_id) = Uuid::parse_str(pos_item_id) else {
                tracing::warn!(item = %item.name, pos_item_id, "Skipping item with invalid product id");
                continue;
            };
            match self.products.find_by_id(product_id).await {
                Ok(Some(product)) => lines.push(OrderLineItem {
                    product_id: product.id,
                    quantity: item.quantity,
                    unit_price: item.unit_price.to_decimal(),
                    total_price: item.total_price.to_decimal(),
                }),
                Ok(None) => {
                    tracing::warn!(item = %item.name, pos_item_id, "Skipping item for unknown product");
                }
                Err(e) => {
                    tracing::warn!(item = %item.name, pos_item_id, error = %e, "Product lookup failed");
                }
            }
        }

        lines
    }

    fn publish_order(&self, topic: &str, order: &InternalOrder) {
        match serde_json::to_value(order) {
            Ok(payload) => self.events.publish(topic, payload),
            Err(e) => tracing::warn!(topic, error = %e, "Failed to encode order event"),
        }
    }
}

/// Order notes and cutlery notes joined with " | "
fn build_note(order: &PlatformOrder) -> Option<String> {
    let mut notes = Vec::new();
    if !order.order_notes.trim().is_empty() {
        notes.push(order.order_notes.trim().to_string());
    }
    if !order.cutlery_notes.trim().is_empty() {
        notes.push(format!("Cutlery: {}", order.cutlery_notes.trim()));
    }
    (!notes.is_empty()).then(|| notes.join(" | "))
}
