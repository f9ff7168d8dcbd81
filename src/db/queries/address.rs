//! Address table queries

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::AddressRecord;

/// Fetch the next incremental-scan page: rows strictly past `last_id`, or
/// rows touched after `last_timestamp` (to pick up edits behind the
/// cursor). Ordered by id so the cursor advances monotonically.
pub async fn fetch_incremental_page(
    pool: &PgPool,
    last_id: Uuid,
    last_timestamp: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<AddressRecord>, sqlx::Error> {
    sqlx::query_as::<_, AddressRecord>(
        r#"
        SELECT id, full_address_text, lat, long, country, updated_at
        FROM address
        WHERE id > $1 OR ($2::timestamptz IS NOT NULL AND updated_at > $2)
        ORDER BY id ASC
        LIMIT $3
        "#,
    )
    .bind(last_id)
    .bind(last_timestamp)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Fetch the next catch-up page: rows past `after_id` whose coordinates are
/// missing or still the `(0, 0)` placeholder.
pub async fn fetch_unset_page(
    pool: &PgPool,
    after_id: Uuid,
    limit: i64,
) -> Result<Vec<AddressRecord>, sqlx::Error> {
    sqlx::query_as::<_, AddressRecord>(
        r#"
        SELECT id, full_address_text, lat, long, country, updated_at
        FROM address
        WHERE id > $1
          AND (lat IS NULL OR long IS NULL OR (lat = 0 AND long = 0))
        ORDER BY id ASC
        LIMIT $2
        "#,
    )
    .bind(after_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Write new coordinates for one row (after geocoding).
pub async fn update_coordinates(
    pool: &PgPool,
    id: Uuid,
    lat: f64,
    long: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE address
        SET lat = $1, long = $2, updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(lat)
    .bind(long)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Total rows in the address table.
pub async fn count_addresses(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM address")
        .fetch_one(pool)
        .await?;

    Ok(count)
}
