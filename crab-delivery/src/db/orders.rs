use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use shared::order::{
    AddressMatch, InternalOrder, OrderLineItem, OrderSource, OrderStatus, OrderType, PlatformRef,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::{OrderRepository, RepoError, RepoResult};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    order_status: String,
    order_type: String,
    is_online_payment: bool,
    discount_amount: Decimal,
    delivery_fee: Option<Decimal>,
    total_price: Decimal,
    estimated_ready_time: Option<DateTime<Utc>>,
    address_id: Option<String>,
    address_extra: Option<String>,
    order_note: Option<String>,
    source: Option<String>,
    platform_order_id: Option<String>,
    platform_data: Option<Value>,
}

impl TryFrom<OrderRow> for InternalOrder {
    type Error = RepoError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let order_status = OrderStatus::from_db(&row.order_status).ok_or_else(|| {
            RepoError::Validation(format!("unknown order status {}", row.order_status))
        })?;
        let order_type = OrderType::from_db(&row.order_type)
            .ok_or_else(|| RepoError::Validation(format!("unknown order type {}", row.order_type)))?;
        let address = AddressMatch::from_columns(row.address_id, row.address_extra).ok_or_else(
            || RepoError::Validation(format!("order {} has no single address", row.id)),
        )?;
        let platform = match (row.platform_order_id, row.source) {
            (Some(platform_order_id), Some(source)) => {
                let source = OrderSource::from_db(&source)
                    .ok_or_else(|| RepoError::Validation(format!("unknown source {source}")))?;
                Some(PlatformRef::new(platform_order_id, source))
            }
            _ => None,
        };

        Ok(InternalOrder {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            platform,
            order_status,
            order_type,
            is_online_payment: row.is_online_payment,
            discount_amount: row.discount_amount,
            delivery_fee: row.delivery_fee,
            total_price: row.total_price,
            estimated_ready_time: row.estimated_ready_time,
            address,
            order_note: row.order_note,
            platform_data: row.platform_data,
        })
    }
}

const ORDER_COLUMNS: &str = "id, created_at, updated_at, order_status, order_type, \
     is_online_payment, discount_amount, delivery_fee, total_price, estimated_ready_time, \
     address_id, address_extra, order_note, source, platform_order_id, platform_data";

#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn find_by_platform_id(&self, key: &PlatformRef) -> RepoResult<Option<InternalOrder>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE platform_order_id = $1 AND source = $2"
        ))
        .bind(&key.platform_order_id)
        .bind(key.source.as_db())
        .fetch_optional(&self.pool)
        .await?;

        row.map(InternalOrder::try_from).transpose()
    }

    async fn save_with_line_items(
        &self,
        order: &InternalOrder,
        items: &[OrderLineItem],
    ) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        // 先插入再看 rows_affected：由唯一键判定重复，不做预先 SELECT
        let inserted = sqlx::query(
            "INSERT INTO orders (
                id, created_at, updated_at, order_status, order_type, is_online_payment,
                discount_amount, delivery_fee, total_price, estimated_ready_time,
                address_id, address_extra, order_note, source, platform_order_id, platform_data
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             ON CONFLICT (platform_order_id, source) DO NOTHING",
        )
        .bind(order.id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.order_status.as_db())
        .bind(order.order_type.as_db())
        .bind(order.is_online_payment)
        .bind(order.discount_amount)
        .bind(order.delivery_fee)
        .bind(order.total_price)
        .bind(order.estimated_ready_time)
        .bind(order.address.address_id())
        .bind(order.address.address_extra())
        .bind(order.order_note.as_deref())
        .bind(order.platform.as_ref().map(|p| p.source.as_db()))
        .bind(order.platform.as_ref().map(|p| p.platform_order_id.as_str()))
        .bind(order.platform_data.as_ref())
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            let key = order
                .platform
                .as_ref()
                .map(|p| p.platform_order_id.clone())
                .unwrap_or_default();
            return Err(RepoError::Duplicate(format!("platform order {key}")));
        }

        for item in items {
            sqlx::query(
                "INSERT INTO order_products (order_id, product_id, quantity, unit_price, total_price)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_status(
        &self,
        key: &PlatformRef,
        status: OrderStatus,
        platform_data: &Value,
    ) -> RepoResult<InternalOrder> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET order_status = $1, platform_data = $2, updated_at = NOW()
             WHERE platform_order_id = $3 AND source = $4
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(status.as_db())
        .bind(platform_data)
        .bind(&key.platform_order_id)
        .bind(key.source.as_db())
        .fetch_optional(&self.pool)
        .await?;

        row.map(InternalOrder::try_from)
            .transpose()?
            .ok_or_else(|| RepoError::NotFound(format!("platform order {}", key.platform_order_id)))
    }
}
