//! Store writer: index setup and idempotent upsert-by-id.
//!
//! [`WeatherStore`] is the only surface the pipeline needs from storage.
//! [`PgStore`] implements it on PostgreSQL; tests plug in their own.

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::models::CanonicalRecord;
use crate::schema::{self, WEATHER_TABLE};

// ---

#[async_trait]
pub trait WeatherStore: Send + Sync {
    /// Idempotently create the `updatedAt` index and the unique `(city, dt)` index.
    async fn ensure_indexes(&self) -> Result<(), PipelineError>;

    /// Insert or replace each record by `id` as one unordered batch.
    ///
    /// One record failing does not stop the others. Returns inserted plus
    /// modified documents. Never called with an empty slice by [`upsert`].
    async fn upsert_batch(&self, records: &[CanonicalRecord]) -> Result<u64, PipelineError>;
}

/// Ensure indexes, downgrading any failure to a warning.
pub async fn ensure_indexes<S>(store: &S)
where
    S: WeatherStore + ?Sized,
{
    // ---
    match store.ensure_indexes().await {
        Ok(()) => info!("Indexes ensured on '{}'", WEATHER_TABLE),
        Err(e) => warn!("Failed to create indexes: {}", DisplayChain(&e)),
    }
}

/// Upsert `records`, returning the inserted + modified count.
///
/// An empty slice returns `0` without contacting storage.
pub async fn upsert<S>(store: &S, records: &[CanonicalRecord]) -> Result<u64, PipelineError>
where
    S: WeatherStore + ?Sized,
{
    // ---
    if records.is_empty() {
        warn!("No documents to upsert");
        return Ok(0);
    }
    store.upsert_batch(records).await
}

// ---

/// PostgreSQL-backed store writing to the `weather` table.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WeatherStore for PgStore {
    async fn ensure_indexes(&self) -> Result<(), PipelineError> {
        // ---
        schema::ensure_indexes(&self.pool)
            .await
            .map_err(|source| PipelineError::Index {
                table: WEATHER_TABLE,
                source,
            })
    }

    async fn upsert_batch(&self, records: &[CanonicalRecord]) -> Result<u64, PipelineError> {
        // ---
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|source| PipelineError::StorageWrite {
                table: WEATHER_TABLE,
                attempted: records.len(),
                source,
            })?;

        let mut affected: u64 = 0;
        let mut failed = 0usize;
        let mut last_error = None;

        for record in records {
            match upsert_one(&mut *conn, record).await {
                Ok(rows) => affected += rows,
                Err(e) => {
                    warn!("Failed to upsert '{}': {}", record.id, e);
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) if failed == records.len() => Err(PipelineError::StorageWrite {
                table: WEATHER_TABLE,
                attempted: records.len(),
                source,
            }),
            Some(_) => {
                warn!("{} of {} records failed to upsert", failed, records.len());
                Ok(affected)
            }
            None => Ok(affected),
        }
    }
}

/// Insert or fully replace one row by `id`.
async fn upsert_one(
    conn: &mut sqlx::PgConnection,
    record: &CanonicalRecord,
) -> Result<u64, sqlx::Error> {
    // ---
    let result = sqlx::query(
        r#"
        INSERT INTO weather (
            id, city, country, state_code, lat, lon, dt,
            measurements, ingested_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            city         = EXCLUDED.city,
            country      = EXCLUDED.country,
            state_code   = EXCLUDED.state_code,
            lat          = EXCLUDED.lat,
            lon          = EXCLUDED.lon,
            dt           = EXCLUDED.dt,
            measurements = EXCLUDED.measurements,
            ingested_at  = EXCLUDED.ingested_at,
            updated_at   = EXCLUDED.updated_at
        "#,
    )
    .bind(&record.id)
    .bind(&record.city)
    .bind(Json(&record.country))
    .bind(Json(&record.state_code))
    .bind(Json(&record.lat))
    .bind(Json(&record.lon))
    .bind(&record.dt)
    .bind(Json(&record.measurements))
    .bind(record.ingested_at)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Formats an error with its `source()` chain, `: `-separated.
struct DisplayChain<'a>(&'a (dyn std::error::Error + 'static));

impl std::fmt::Display for DisplayChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // ---
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, ": {}", cause)?;
            source = cause.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and fails index creation on demand.
    #[derive(Default)]
    struct CountingStore {
        index_calls: AtomicUsize,
        batch_calls: AtomicUsize,
        fail_indexes: bool,
    }

    #[async_trait]
    impl WeatherStore for CountingStore {
        async fn ensure_indexes(&self) -> Result<(), PipelineError> {
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_indexes {
                return Err(PipelineError::Index {
                    table: WEATHER_TABLE,
                    source: sqlx::Error::PoolClosed,
                });
            }
            Ok(())
        }

        async fn upsert_batch(&self, records: &[CanonicalRecord]) -> Result<u64, PipelineError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(records.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_empty_batch_short_circuits() {
        // ---
        let store = CountingStore::default();

        let count = upsert(&store, &[]).await.unwrap();

        assert_eq!(count, 0);
        assert_eq!(store.batch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_empty_batch_reaches_store() {
        // ---
        let store = CountingStore::default();
        let record = crate::normalize::normalize(&serde_json::Map::new());

        let count = upsert(&store, &[record.clone(), record]).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.batch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_index_failure_is_not_fatal() {
        // ---
        let store = CountingStore {
            fail_indexes: true,
            ..Default::default()
        };

        // Returns unit: the failure is only logged.
        ensure_indexes(&store).await;
        assert_eq!(store.index_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_display_chain_includes_sources() {
        // ---
        let err = PipelineError::Index {
            table: WEATHER_TABLE,
            source: sqlx::Error::PoolClosed,
        };

        let text = DisplayChain(&err).to_string();
        assert!(text.starts_with("Failed to ensure indexes on 'weather'"));
        assert!(text.contains(": "));
    }
}
