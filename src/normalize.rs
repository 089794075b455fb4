//! Raw-to-canonical mapping.
//!
//! [`normalize`] is total: absent fields degrade to `null` and oddly typed
//! ones pass through, never to an error. The measurement mapping is the static [`FIELD_MAP`]
//! table; nothing else decides which source keys are read.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::models::{CanonicalRecord, RawReading};

// ---

/// City used in the natural key when the reading carries none.
pub const UNKNOWN_CITY: &str = "NOT_KNOWN";

/// `(source key, canonical key)` for every measurement that is a plain rename.
/// Values are copied unmodified; unit suffixes on the canonical names do not
/// imply conversion.
pub const FIELD_MAP: &[(&str, &str)] = &[
    ("temp", "tempC"),
    ("app_temp", "feelsLikeC"),
    ("rh", "rh"),
    ("dewpt", "dewptC"),
    ("wind_spd", "windMs"),
    ("wind_gust_spd", "windGustMs"),
    ("wind_dir", "windDirDeg"),
    ("wind_cdir", "windCdir"),
    ("wind_cdir_full", "windCdirFull"),
    ("pop", "popPct"),
    ("precip", "precipMm"),
    ("snow", "snowMm"),
    ("snow_depth", "snowDepthMm"),
    ("clouds_low", "cloudsLowPct"),
    ("clouds_mid", "cloudsMidPct"),
    ("clouds_hi", "cloudsHiPct"),
    ("clouds", "cloudsPct"),
    ("slp", "slpMb"),
    ("pres", "presMb"),
    ("vis", "visKm"),
    ("uv", "uvIndex"),
    ("dhi", "dhiWm2"),
    ("dni", "dniWm2"),
    ("ghi", "ghiWm2"),
    ("solar_rad", "solarRadWm2"),
    ("ozone", "ozoneDobson"),
    ("pod", "pod"),
];

/// `(key inside "weather", canonical key)`, read only when `weather` is an object.
pub const WEATHER_FIELD_MAP: &[(&str, &str)] = &[
    ("description", "conditions"),
    ("code", "weatherCode"),
    ("icon", "weatherIcon"),
];

/// Normalize one reading, stamping it with the current UTC instant.
pub fn normalize(raw: &RawReading) -> CanonicalRecord {
    // ---
    normalize_at(raw, Utc::now())
}

/// Normalize one reading as if the clock read `now`.
///
/// `now` is used for `ingestedAt`/`updatedAt` and as the timestamp of
/// last resort when the reading carries none.
pub fn normalize_at(raw: &RawReading, now: DateTime<Utc>) -> CanonicalRecord {
    // ---
    let dt = resolve_timestamp(raw, now);
    let city = non_empty_str(raw.get("city_name"))
        .unwrap_or(UNKNOWN_CITY)
        .to_string();

    CanonicalRecord {
        id: natural_key(&city, &dt),
        city,
        country: verbatim(raw, "country_code"),
        state_code: verbatim(raw, "state_code"),
        lat: verbatim(raw, "lat"),
        lon: verbatim(raw, "lon"),
        dt,
        measurements: map_measurements(raw),
        ingested_at: now,
        updated_at: now,
    }
}

/// `"{city}|{dt}"`.
pub fn natural_key(city: &str, dt: &str) -> String {
    format!("{}|{}", city, dt)
}

/// Resolve the observation time as a `Z`-suffixed ISO-8601 string.
///
/// First match wins:
/// 1. the first non-empty string of `timestamp_utc`, `datetime`, with spaces
///    turned into `T` and a `Z` appended if missing; it is trusted to be UTC
/// 2. `ts` as epoch seconds (number or numeric string)
/// 3. `now`
pub fn resolve_timestamp(raw: &RawReading, now: DateTime<Utc>) -> String {
    // ---
    let textual = ["timestamp_utc", "datetime"]
        .iter()
        .find_map(|key| non_empty_str(raw.get(*key)));

    if let Some(text) = textual {
        let mut iso = text.replace(' ', "T");
        if !iso.ends_with('Z') {
            iso.push('Z');
        }
        return iso;
    }

    if let Some(at) = raw.get("ts").and_then(epoch_seconds) {
        return iso_seconds(at);
    }

    iso_seconds(now)
}

fn iso_seconds(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Epoch seconds from a JSON number or numeric string. Fractions are
/// truncated; anything unparseable or out of range is `None`.
fn epoch_seconds(value: &Value) -> Option<DateTime<Utc>> {
    // ---
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))?
        }
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

fn verbatim(raw: &RawReading, key: &str) -> Value {
    raw.get(key).cloned().unwrap_or(Value::Null)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn map_measurements(raw: &RawReading) -> Map<String, Value> {
    // ---
    let mut out = Map::with_capacity(FIELD_MAP.len() + WEATHER_FIELD_MAP.len());

    for (source, canonical) in FIELD_MAP {
        out.insert((*canonical).to_string(), verbatim(raw, source));
    }

    // A scalar or array "weather" is tolerated and yields nulls.
    let weather = raw.get("weather").and_then(Value::as_object);
    for (source, canonical) in WEATHER_FIELD_MAP {
        let value = weather
            .and_then(|wx| wx.get(*source))
            .cloned()
            .unwrap_or(Value::Null);
        out.insert((*canonical).to_string(), value);
    }

    out
}
