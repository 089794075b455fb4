//! One ingestion run: ensure indexes, fetch, normalize, upsert.

use reqwest::Client;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::fetch;
use crate::models::CanonicalRecord;
use crate::normalize::normalize;
use crate::store::{self, WeatherStore};

// ---

/// Counts reported by a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub records_fetched: usize,
    pub upserted_or_modified: u64,
}

/// Execute one run against `request_url` (key included), writing into `store`.
///
/// Index failures are logged and ignored. Any other failure aborts the run
/// and is returned to the caller; nothing is retried or rolled back.
pub async fn run_once<S>(
    client: &Client,
    request_url: &str,
    store: &S,
) -> Result<RunSummary, PipelineError>
where
    S: WeatherStore + ?Sized,
{
    // ---
    let span = tracing::info_span!("ingest_run", run_id = %Uuid::new_v4());

    async {
        store::ensure_indexes(store).await;

        let readings = fetch::fetch_hourly(client, request_url).await?;
        let records: Vec<CanonicalRecord> = readings.iter().map(normalize).collect();
        let upserted_or_modified = store::upsert(store, &records).await?;

        let summary = RunSummary {
            records_fetched: readings.len(),
            upserted_or_modified,
        };
        info!(
            "records_fetched={}, upserted_or_modified={}",
            summary.records_fetched, summary.upserted_or_modified
        );
        Ok::<_, PipelineError>(summary)
    }
    .instrument(span)
    .await
}
