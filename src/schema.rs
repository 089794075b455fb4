//! Database schema management for `weather-ingest`.
//!
//! Ensures the `weather` table and its two indexes exist. Called at the top
//! of every run through [`crate::store::WeatherStore::ensure_indexes`].

use sqlx::PgPool;

// ---

/// Table holding one row per `(city, dt)` observation.
pub const WEATHER_TABLE: &str = "weather";

/// Create the table and indexes if missing (idempotent).
///
/// - `idx_weather_updated_at`: non-unique, `updated_at` ascending
/// - `idx_weather_city_dt`: unique, `(city, dt)` ascending
///
/// Location descriptors are JSONB so they keep whatever type the API sent.
/// The row key `id` already encodes `(city, dt)`; both constraints hold
/// together. Errors are propagated if any SQL execution fails.
pub async fn ensure_indexes(pool: &PgPool) -> Result<(), sqlx::Error> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather (
            id           TEXT             PRIMARY KEY,
            city         TEXT             NOT NULL,
            country      JSONB            NOT NULL,
            state_code   JSONB            NOT NULL,
            lat          JSONB            NOT NULL,
            lon          JSONB            NOT NULL,
            dt           TEXT             NOT NULL,
            measurements JSONB            NOT NULL,
            ingested_at  TIMESTAMPTZ      NOT NULL,
            updated_at   TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_weather_updated_at
            ON weather (updated_at ASC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_weather_city_dt
            ON weather (city ASC, dt ASC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
