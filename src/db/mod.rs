//! Database module
//!
//! `AddressStore` is the seam between the batch pipeline and persistence:
//! `PgAddressStore` backs it with PostgreSQL in production, and tests use an
//! in-memory implementation so pipeline behavior is checked without a
//! database.

pub mod queries;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::Error;
use crate::types::{AddressRecord, BatchCheckpoint};

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), Error> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Config(format!("migration failed: {e}")))?;
    info!("Database migrations complete");
    Ok(())
}

/// Row-oriented access to the `address` collection: paged reads plus the
/// single per-row coordinate update the pipeline performs.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Next page for an incremental scan: rows past the cursor id, or rows
    /// updated after the cursor timestamp. Ordered by id ascending.
    async fn fetch_incremental_page(
        &self,
        checkpoint: &BatchCheckpoint,
        limit: i64,
    ) -> Result<Vec<AddressRecord>, Error>;

    /// Next page for a catch-up scan: rows past `after_id` whose coordinates
    /// are still unset. Ordered by id ascending.
    async fn fetch_unset_page(
        &self,
        after_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AddressRecord>, Error>;

    /// Write new coordinates for one row.
    async fn update_coordinates(&self, id: Uuid, lat: f64, long: f64) -> Result<(), Error>;

    /// Total rows in the collection.
    async fn count_addresses(&self) -> Result<i64, Error>;
}

/// PostgreSQL-backed address store.
pub struct PgAddressStore {
    pool: PgPool,
}

impl PgAddressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressStore for PgAddressStore {
    async fn fetch_incremental_page(
        &self,
        checkpoint: &BatchCheckpoint,
        limit: i64,
    ) -> Result<Vec<AddressRecord>, Error> {
        Ok(queries::address::fetch_incremental_page(
            &self.pool,
            checkpoint.last_processed_id,
            checkpoint.last_processed_timestamp,
            limit,
        )
        .await?)
    }

    async fn fetch_unset_page(
        &self,
        after_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AddressRecord>, Error> {
        Ok(queries::address::fetch_unset_page(&self.pool, after_id, limit).await?)
    }

    async fn update_coordinates(&self, id: Uuid, lat: f64, long: f64) -> Result<(), Error> {
        Ok(queries::address::update_coordinates(&self.pool, id, lat, long).await?)
    }

    async fn count_addresses(&self) -> Result<i64, Error> {
        Ok(queries::address::count_addresses(&self.pool).await?)
    }
}

// ==========================================================================
// In-memory store for tests
// ==========================================================================
