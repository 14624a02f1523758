use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Product, ProductRepository, RepoResult};

#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let product = sqlx::query_as("SELECT id, name, price FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }
}
