//! 订单对账使用的持久化层
//!
//! 每个 repository 是一个 trait，各有 PostgreSQL 实现和内存实现。
//! reconciler 只依赖 `Arc<dyn ...>`。

pub mod addresses;
pub mod memory;
pub mod orders;
pub mod products;

pub use addresses::PgAddressRepository;
pub use memory::{MemoryAddressRepository, MemoryOrderRepository, MemoryProductRepository};
pub use orders::PgOrderRepository;
pub use products::PgProductRepository;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use shared::order::{InternalOrder, OrderLineItem, OrderStatus, PlatformRef};
use thiserror::Error;
use uuid::Uuid;

/// Repository 错误类型
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound("row".into()),
            other => RepoError::Database(other.to_string()),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// 地址库中的街道候选
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Street {
    #[sqlx(rename = "street_id")]
    pub id: String,
    #[sqlx(rename = "streetname_fr")]
    pub street_name: String,
    #[sqlx(rename = "municipality_name_fr")]
    pub municipality_name: String,
    pub postcode: String,
}

/// 可配送的具体地址（街道 + 门牌号 + 可选 box）
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Address {
    #[sqlx(rename = "address_id")]
    pub id: String,
    #[sqlx(rename = "streetname_fr")]
    pub street_name: String,
    pub house_number: String,
    pub box_number: Option<String>,
    #[sqlx(rename = "municipality_name_fr")]
    pub municipality_name: String,
    pub postcode: String,
    /// 距餐厅距离（米）
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_platform_id(&self, key: &PlatformRef) -> RepoResult<Option<InternalOrder>>;

    /// 原子写入订单及其明细
    ///
    /// 相同平台 key 的订单已存在时返回 `RepoError::Duplicate`，不写入任何数据。
    async fn save_with_line_items(
        &self,
        order: &InternalOrder,
        items: &[OrderLineItem],
    ) -> RepoResult<()>;

    /// 更新状态并替换原始 payload；key 不存在时返回 `NotFound`
    async fn update_status(
        &self,
        key: &PlatformRef,
        status: OrderStatus,
        platform_data: &Value,
    ) -> RepoResult<InternalOrder>;
}

#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// 按相似度排序的街道候选，最佳在前
    async fn search_street_names(&self, query: &str, limit: i64) -> RepoResult<Vec<Street>>;

    /// 精确地址行；box 为 `None` 时只匹配没有 box 的行
    async fn get_final_address(
        &self,
        street_id: &str,
        house_number: &str,
        box_number: Option<&str>,
    ) -> RepoResult<Option<Address>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Product>>;
}
