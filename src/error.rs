//! Error kinds raised by the ingestion pipeline.
//!
//! Every stage returns [`PipelineError`]. Only [`PipelineError::Index`] is
//! downgraded to a warning where it occurs; the rest propagate to
//! [`crate::pipeline::run_once`] and from there to the binary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    // Transport
    #[error("Weather API returned status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Weather API request failed")]
    Transport(#[source] reqwest::Error),

    // Decode
    #[error("Weather API response is not valid JSON")]
    Decode(#[source] serde_json::Error),

    #[error("Weather API response is not a JSON object (got {0})")]
    NotAnObject(&'static str),

    // Storage
    #[error("Failed to ensure indexes on '{table}'")]
    Index {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Bulk upsert into '{table}' failed for all {attempted} records")]
    StorageWrite {
        table: &'static str,
        attempted: usize,
        #[source]
        source: sqlx::Error,
    },
}

impl PipelineError {
    /// `true` for the transport family (non-2xx status, network or timeout).
    pub fn is_transport(&self) -> bool {
        // ---
        matches!(self, Self::HttpStatus { .. } | Self::Transport(_))
    }

    /// `true` when the response body could not be decoded into an object.
    pub fn is_decode(&self) -> bool {
        // ---
        matches!(self, Self::Decode(_) | Self::NotAnObject(_))
    }
}

/// Human-readable JSON type name used in decode errors.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    // ---
    use serde_json::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
