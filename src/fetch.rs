//! Weather API client.
//!
//! One GET per run, no pagination, no retry. The payload carries location
//! metadata once at the top level and the hourly readings under `"data"`;
//! [`flatten_payload`] copies the metadata into every reading.

use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{json_kind, PipelineError};
use crate::models::RawReading;

// ---

/// Top-level payload keys copied into every reading.
pub const METADATA_KEYS: &[&str] = &["city_name", "country_code", "state_code", "lat", "lon"];

/// Build the HTTP client used for the weather API.
pub fn build_client(timeout: Duration) -> Result<Client, PipelineError> {
    // ---
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(PipelineError::Transport)
}

/// Fetch the hourly readings from `url` (the full request target, key included).
///
/// Non-2xx responses fail with [`PipelineError::HttpStatus`] carrying the body;
/// network and timeout failures with [`PipelineError::Transport`].
pub async fn fetch_hourly(client: &Client, url: &str) -> Result<Vec<RawReading>, PipelineError> {
    // ---
    info!("Fetching hourly weather data");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::Transport(e.without_url()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::Transport(e.without_url()))?;

    if !status.is_success() {
        return Err(PipelineError::HttpStatus { status, body });
    }

    debug!("Weather API returned {} bytes", body.len());

    let payload: Value = serde_json::from_str(&body).map_err(PipelineError::Decode)?;
    flatten_payload(payload)
}

/// Split an API payload into readings, overlaying the location metadata on
/// each item. Metadata wins when an item carries a key of the same name.
///
/// A missing or non-array `"data"` yields no readings; items that are not
/// objects are skipped.
pub fn flatten_payload(payload: Value) -> Result<Vec<RawReading>, PipelineError> {
    // ---
    let mut payload = match payload {
        Value::Object(map) => map,
        other => return Err(PipelineError::NotAnObject(json_kind(&other))),
    };

    let metadata: Map<String, Value> = METADATA_KEYS
        .iter()
        .map(|key| (key.to_string(), payload.get(*key).cloned().unwrap_or(Value::Null)))
        .collect();

    let items = match payload.remove("data") {
        Some(Value::Array(items)) => items,
        Some(other) => {
            debug!("Payload 'data' is {} rather than an array", json_kind(&other));
            Vec::new()
        }
        None => {
            debug!("Payload missing 'data' field");
            Vec::new()
        }
    };

    let mut readings = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let mut reading = match item {
            Value::Object(map) => map,
            other => {
                debug!("Skipping item {}: {} is not an object", i, json_kind(&other));
                continue;
            }
        };
        for (key, value) in &metadata {
            reading.insert(key.clone(), value.clone());
        }
        readings.push(reading);
    }

    Ok(readings)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_injected_into_every_reading() {
        // ---
        let payload = json!({
            "city_name": "Lagos",
            "country_code": "NG",
            "state_code": "05",
            "lat": 6.45,
            "lon": 3.39,
            "timezone": "Africa/Lagos",
            "data": [
                {"timestamp_utc": "2024-03-01 00:00:00", "temp": 28},
                {"timestamp_utc": "2024-03-01 01:00:00", "temp": 27}
            ]
        });

        let readings = flatten_payload(payload).unwrap();

        assert_eq!(readings.len(), 2);
        for r in &readings {
            assert_eq!(r["city_name"], "Lagos");
            assert_eq!(r["country_code"], "NG");
            assert_eq!(r["state_code"], "05");
            assert_eq!(r["lat"], 6.45);
            assert_eq!(r["lon"], 3.39);
            assert!(r.get("timezone").is_none());
        }
        // Source order kept
        assert_eq!(readings[0]["temp"], 28);
        assert_eq!(readings[1]["temp"], 27);
    }

    #[test]
    fn test_metadata_overwrites_item_keys() {
        // ---
        let payload = json!({
            "city_name": "Lagos",
            "data": [{"city_name": "Ikeja", "lat": 1.0, "temp": 30}]
        });

        let readings = flatten_payload(payload).unwrap();

        assert_eq!(readings[0]["city_name"], "Lagos");
        // Missing metadata is injected as null, hiding the item's own value
        assert_eq!(readings[0]["lat"], Value::Null);
        assert_eq!(readings[0]["temp"], 30);
    }

    #[test]
    fn test_missing_data_yields_no_readings() {
        // ---
        let readings = flatten_payload(json!({"city_name": "Lagos"})).unwrap();
        assert!(readings.is_empty());

        let readings = flatten_payload(json!({"city_name": "Lagos", "data": {"temp": 1}})).unwrap();
        assert!(readings.is_empty());
    }

    #[test]
    fn test_non_object_items_skipped() {
        // ---
        let payload = json!({"data": [1, {"temp": 2}, "x", null]});

        let readings = flatten_payload(payload).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0]["temp"], 2);
    }

    #[test]
    fn test_non_object_payload_is_decode_error() {
        // ---
        let err = flatten_payload(json!([{"temp": 1}])).unwrap_err();

        assert!(err.is_decode());
        assert!(matches!(err, PipelineError::NotAnObject("array")));
    }
}
