//! In-memory repositories
//!
//! Same contracts as the PostgreSQL implementations, including the
//! duplicate-key behaviour of `save_with_line_items`. Used by tests and by
//! local runs without a database.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use shared::order::{InternalOrder, OrderLineItem, OrderStatus, PlatformRef};
use uuid::Uuid;

use super::{
    Address, AddressRepository, OrderRepository, Product, ProductRepository, RepoError,
    RepoResult, Street,
};

#[derive(Debug, Clone)]
struct StoredOrder {
    order: InternalOrder,
    items: Vec<OrderLineItem>,
}

#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: DashMap<PlatformRef, StoredOrder>,
    fail_writes: AtomicBool,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a database error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn line_items(&self, key: &PlatformRef) -> Vec<OrderLineItem> {
        self.orders
            .get(key)
            .map(|stored| stored.items.clone())
            .unwrap_or_default()
    }

    fn check_writable(&self) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::Database("simulated write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn find_by_platform_id(&self, key: &PlatformRef) -> RepoResult<Option<InternalOrder>> {
        Ok(self.orders.get(key).map(|stored| stored.order.clone()))
    }

    async fn save_with_line_items(
        &self,
        order: &InternalOrder,
        items: &[OrderLineItem],
    ) -> RepoResult<()> {
        self.check_writable()?;
        let key = order
            .platform
            .clone()
            .ok_or_else(|| RepoError::Validation("order has no platform reference".into()))?;

        match self.orders.entry(key) {
            Entry::Occupied(entry) => Err(RepoError::Duplicate(format!(
                "platform order {}",
                entry.key().platform_order_id
            ))),
            Entry::Vacant(entry) => {
                entry.insert(StoredOrder {
                    order: order.clone(),
                    items: items.to_vec(),
                });
                Ok(())
            }
        }
    }

    async fn update_status(
        &self,
        key: &PlatformRef,
        status: OrderStatus,
        platform_data: &Value,
    ) -> RepoResult<InternalOrder> {
        self.check_writable()?;
        let mut stored = self
            .orders
            .get_mut(key)
            .ok_or_else(|| RepoError::NotFound(format!("platform order {}", key.platform_order_id)))?;
        stored.order.order_status = status;
        stored.order.platform_data = Some(platform_data.clone());
        stored.order.updated_at = Utc::now();
        Ok(stored.order.clone())
    }
}

#[derive(Default)]
pub struct MemoryAddressRepository {
    streets: Vec<Street>,
    addresses: Vec<(String, Address)>,
}

impl MemoryAddressRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_street(mut self, street: Street) -> Self {
        self.streets.push(street);
        self
    }

    pub fn with_address(mut self, street_id: impl Into<String>, address: Address) -> Self {
        self.addresses.push((street_id.into(), address));
        self
    }
}

/// Lower-case and drop the accents common in Belgian street names
fn normalize(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[async_trait]
impl AddressRepository for MemoryAddressRepository {
    /// Substring match in either direction, closest length first
    async fn search_street_names(&self, query: &str, limit: i64) -> RepoResult<Vec<Street>> {
        let needle = normalize(query);
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let mut hits: Vec<&Street> = self
            .streets
            .iter()
            .filter(|s| {
                let name = normalize(&s.street_name);
                name.contains(&needle) || needle.contains(&name)
            })
            .collect();
        hits.sort_by_key(|s| s.street_name.len().abs_diff(query.len()));

        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(hits.into_iter().take(limit).cloned().collect())
    }

    async fn get_final_address(
        &self,
        street_id: &str,
        house_number: &str,
        box_number: Option<&str>,
    ) -> RepoResult<Option<Address>> {
        Ok(self
            .addresses
            .iter()
            .find(|(sid, a)| {
                sid == street_id
                    && a.house_number == house_number
                    && a.box_number.as_deref() == box_number
            })
            .map(|(_, a)| a.clone()))
    }
}

#[derive(Default)]
pub struct MemoryProductRepository {
    products: DashMap<Uuid, Product>,
}

impl MemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, product: Product) {
        self.products.insert(product.id, product);
    }
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Product>> {
        Ok(self.products.get(&id).map(|p| p.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::order::{AddressMatch, OrderSource, OrderType};

    fn order(platform_id: &str) -> InternalOrder {
        let now = Utc::now();
        InternalOrder {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            platform: Some(PlatformRef::new(platform_id, OrderSource::Deliveroo)),
            order_status: OrderStatus::Pending,
            order_type: OrderType::Delivery,
            is_online_payment: true,
            discount_amount: Decimal::ZERO,
            delivery_fee: None,
            total_price: Decimal::new(1250, 2),
            estimated_ready_time: None,
            address: AddressMatch::Raw {
                text: "Rue Neuve, 1".into(),
            },
            order_note: None,
            platform_data: None,
        }
    }

    #[tokio::test]
    async fn second_save_with_same_key_is_duplicate() {
        let repo = MemoryOrderRepository::new();
        repo.save_with_line_items(&order("gb:1"), &[]).await.unwrap();

        let err = repo
            .save_with_line_items(&order("gb:1"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Duplicate(_)));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn update_unknown_order_is_not_found() {
        let repo = MemoryOrderRepository::new();
        let key = PlatformRef::new("gb:missing", OrderSource::Deliveroo);
        let err = repo
            .update_status(&key, OrderStatus::Confirmed, &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn street_search_ignores_case_and_accents() {
        let repo = MemoryAddressRepository::new().with_street(Street {
            id: "s1".into(),
            street_name: "Chaussée de Wavre".into(),
            municipality_name: "Ixelles".into(),
            postcode: "1050".into(),
        });

        let hits = repo.search_street_names("chaussee de wavre", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(repo.search_street_names("Avenue Louise", 5).await.unwrap().is_empty());
        assert!(repo.search_street_names("wavre", 0).await.unwrap().is_empty());
    }
}
