//! Application entry point for the `weather-ingest` job.
//!
//! One invocation performs one ingestion run, typically from cron:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool scoped to the run
//! - Running fetch -> normalize -> upsert via `pipeline::run_once`
//!
//! Failures are logged and the process still exits with status 0, so the
//! scheduler never sees a failing job; operators read the logs.
//!
//! # Environment Variables
//! - `API_KEY`, `url`, `username`, `password`, `database` (**required**)
//! - `DB_HOST`, `DB_PORT`, `DB_POOL_MAX`, `HTTP_TIMEOUT_SECS` (optional)
//! - `WEATHER_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `WEATHER_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, io::IsTerminal};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use weather_ingest::{config, fetch, run_once, PgStore, RunSummary};

// ---

#[tokio::main]
async fn main() {
    // ---
    dotenv().ok();
    init_tracing();

    match run().await {
        Ok(summary) => tracing::info!(
            records_fetched = summary.records_fetched,
            upserted_or_modified = summary.upserted_or_modified,
            "Pipeline run succeeded"
        ),
        Err(e) => tracing::error!("Pipeline failed: {:?}", e),
    }

    tracing::info!("Pipeline run completed");
}

/// Load configuration, open the pool, run once, close the pool.
async fn run() -> Result<RunSummary> {
    // ---
    let cfg = config::load_from_env()?;
    cfg.log_config();

    let client = fetch::build_client(cfg.http_timeout())?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.database_url())
        .await
        .with_context(|| {
            format!(
                "Failed to connect to database '{}' on {}:{}",
                cfg.db_name, cfg.db_host, cfg.db_port
            )
        })?;

    tracing::info!("Successfully connected to database");

    let store = PgStore::new(pool.clone());
    let outcome = run_once(&client, &cfg.api_request_url(), &store).await;

    // Released on both paths before the outcome is inspected.
    pool.close().await;

    Ok(outcome?)
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `WEATHER_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `WEATHER_LOG_LEVEL` env var
///
/// This should be called once at startup before any logging or tracing
/// macros are invoked. It installs the subscriber globally for the lifetime
/// of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("WEATHER_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to WEATHER_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("WEATHER_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
