//! Hourly weather ingestion: fetch one API payload, normalize each reading
//! into a [`CanonicalRecord`], and upsert the records by natural key.
//!
//! The binary in `main.rs` wires [`config`], a PostgreSQL pool and
//! [`pipeline::run_once`] together; everything here is usable on its own.

pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::PipelineError;
pub use models::{CanonicalRecord, RawReading};
pub use pipeline::{run_once, RunSummary};
pub use store::{PgStore, WeatherStore};
