use async_trait::async_trait;
use sqlx::PgPool;

use super::{Address, AddressRepository, RepoResult, Street};

/// Address book backed by the `streets` / `addresses` import tables.
///
/// Street search relies on `pg_trgm` similarity over an unaccented,
/// lower-cased copy of the street name.
#[derive(Clone)]
pub struct PgAddressRepository {
    pool: PgPool,
}

impl PgAddressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressRepository for PgAddressRepository {
    async fn search_street_names(&self, query: &str, limit: i64) -> RepoResult<Vec<Street>> {
        let streets = sqlx::query_as(
            "SELECT street_id, streetname_fr, municipality_name_fr, postcode
             FROM streets
             WHERE streetname_fr_unaccent % lower(unaccent($1))
             ORDER BY similarity(streetname_fr_unaccent, lower(unaccent($1))) DESC
             LIMIT $2",
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(streets)
    }

    async fn get_final_address(
        &self,
        street_id: &str,
        house_number: &str,
        box_number: Option<&str>,
    ) -> RepoResult<Option<Address>> {
        let address = sqlx::query_as(
            "SELECT a.address_id, a.streetname_fr, a.house_number, a.box_number,
                    a.municipality_name_fr, a.postcode,
                    COALESCE(ad.distance, 10000)::float8 AS distance
             FROM addresses a
             LEFT JOIN address_distance ad ON a.address_id = ad.address_id
             WHERE a.street_id = $1
               AND a.house_number = $2
               AND (($3::text IS NULL AND a.box_number IS NULL) OR a.box_number = $3::text)
             LIMIT 1",
        )
        .bind(street_id)
        .bind(house_number)
        .bind(box_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(address)
    }
}
