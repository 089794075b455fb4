//! Data models for the weather ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

// ---

/// One hourly reading from the weather API, merged with the payload's
/// location metadata. The API schema is open-ended, so the reading stays a
/// plain JSON object until it is normalized.
pub type RawReading = Map<String, Value>;

/// Storage-ready representation of one hourly observation.
///
/// Identity is `(city, dt)`, encoded in `id` as `"{city}|{dt}"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    // ---
    pub id: String,
    pub city: String,
    /// Location descriptors copied verbatim from the reading, `null` if absent.
    pub country: Value,
    pub state_code: Value,
    pub lat: Value,
    pub lon: Value,
    /// ISO-8601 UTC, always `Z`-suffixed.
    pub dt: String,
    /// Renamed measurement fields keyed by canonical name; every canonical
    /// field is present, `null` when the source omitted it.
    #[serde(flatten)]
    pub measurements: Map<String, Value>,
    pub ingested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalRecord {
    /// Canonical measurement value, `None` for unknown names.
    pub fn measurement(&self, name: &str) -> Option<&Value> {
        self.measurements.get(name)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_serializes_as_flat_camel_case_document() {
        // ---
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 5, 0).unwrap();
        let mut measurements = Map::new();
        measurements.insert("tempC".to_string(), json!(28));
        measurements.insert("weatherCode".to_string(), Value::Null);

        let record = CanonicalRecord {
            id: "Lagos|2024-03-01T00:00:00Z".to_string(),
            city: "Lagos".to_string(),
            country: json!("NG"),
            state_code: Value::Null,
            lat: json!(6.45),
            lon: json!("3.39"),
            dt: "2024-03-01T00:00:00Z".to_string(),
            measurements,
            ingested_at: at,
            updated_at: at,
        };

        let doc = serde_json::to_value(&record).unwrap();
        assert_eq!(doc["id"], "Lagos|2024-03-01T00:00:00Z");
        assert_eq!(doc["stateCode"], Value::Null);
        assert_eq!(doc["lon"], "3.39");
        assert_eq!(doc["tempC"], 28);
        assert_eq!(doc["weatherCode"], Value::Null);
        assert_eq!(doc["ingestedAt"], "2024-03-01T00:05:00Z");
        assert!(doc.get("measurements").is_none());
    }
}
