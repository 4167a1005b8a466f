// SQLite read models for listings and users
//
// Both tables are filled by the owning systems (catalog sync, identity
// sync); this adapter only reads them, plus upserts for seeding.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use reservo_core::domain::{Listing, UserIdentity};
use reservo_core::error::Result;
use reservo_core::port::{IdentityProvider, ListingDirectory};
use sqlx::SqlitePool;

pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_listing(&self, listing: &Listing) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO listings (id, owner_id, price_cents, is_active)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                owner_id = excluded.owner_id,
                price_cents = excluded.price_cents,
                is_active = excluded.is_active
            "#,
        )
        .bind(&listing.id)
        .bind(&listing.owner_id)
        .bind(listing.price_cents)
        .bind(listing.is_active)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    pub async fn upsert_user(&self, user: &UserIdentity) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email) VALUES (?, ?) \
             ON CONFLICT (id) DO UPDATE SET email = excluded.email",
        )
        .bind(&user.id)
        .bind(&user.email)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: String,
    owner_id: String,
    price_cents: i64,
    is_active: bool,
}

#[async_trait]
impl ListingDirectory for SqliteDirectory {
    async fn get_listing(&self, listing_id: &str) -> Result<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>(
            "SELECT id, owner_id, price_cents, is_active FROM listings WHERE id = ?",
        )
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|r| Listing {
            id: r.id,
            owner_id: r.owner_id,
            price_cents: r.price_cents,
            is_active: r.is_active,
        }))
    }
}

#[async_trait]
impl IdentityProvider for SqliteDirectory {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserIdentity>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, email FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(row.map(|(id, email)| UserIdentity { id, email }))
    }
}
