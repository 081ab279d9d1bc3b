//! Provider payload shapes and their mapping onto the internal schema.
//!
//! Everything here is pure. Provider records are deserialized leniently (every
//! field optional, numbers accepted as JSON numbers or decimal strings) and
//! then filtered: a record without a finite value is dropped, never reported
//! as zero.

use crate::error::{AirQualityError, PipelineResult};
use crate::models::{CityRanking, Coordinates, Measurement, Pollutant, ResolvedLocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const UNKNOWN_CITY: &str = "Unknown City";
const UNKNOWN_COUNTRY: &str = "Unknown Country";
const UNKNOWN_STATION: &str = "Unknown Station";

/// `{ "results": [...] }` page returned by the measurement provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPage<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Geocoder match; coordinates are named `lat`/`lon` and usually strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlace {
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lon: Option<Value>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Provider coordinate object, named `latitude`/`longitude`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCoordinates {
    #[serde(default)]
    pub latitude: Option<Value>,
    #[serde(default)]
    pub longitude: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDate {
    #[serde(default)]
    pub utc: Option<String>,
}

/// One record from the measurements endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMeasurement {
    #[serde(default)]
    pub parameter: Option<String>,
    #[serde(default, deserialize_with = "lenient_value")]
    pub value: Option<Value>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub date: Option<RawDate>,
    /// Station name
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub coordinates: Option<RawCoordinates>,
}

/// Per-parameter aggregate inside a location record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParameter {
    #[serde(default)]
    pub parameter: Option<String>,
    #[serde(default, deserialize_with = "lenient_value")]
    pub average: Option<Value>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// One record from the locations endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocation {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub coordinates: Option<RawCoordinates>,
    #[serde(default)]
    pub parameters: Vec<RawParameter>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Field value that reads as `None` when it cannot be parsed at all, such as
/// a number outside the `f64` range. The rest of the record still decodes.
fn lenient_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer).unwrap_or(None))
}

/// A JSON number or numeric string that is finite.
pub fn finite_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Both halves of a coordinate pair, or nothing.
fn coordinate_pair(lat: Option<&Value>, lon: Option<&Value>) -> Option<Coordinates> {
    let lat = lat.and_then(finite_number)?;
    let lon = lon.and_then(finite_number)?;
    Some(Coordinates { lat, lon })
}

impl RawPlace {
    pub fn coordinates(&self) -> Option<Coordinates> {
        coordinate_pair(self.lat.as_ref(), self.lon.as_ref())
    }
}

impl RawCoordinates {
    pub fn coordinates(&self) -> Option<Coordinates> {
        coordinate_pair(self.latitude.as_ref(), self.longitude.as_ref())
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn label_or(value: Option<String>, fallback: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Turn the geocoder's match list into a resolved location.
///
/// Only the first match is considered. No match is `NotFound`; a match
/// without a usable coordinate pair is an upstream defect.
pub fn resolve_place(places: Vec<RawPlace>) -> PipelineResult<ResolvedLocation> {
    let place = places
        .into_iter()
        .next()
        .ok_or_else(|| AirQualityError::not_found("Location not found"))?;

    let coordinates = place.coordinates().ok_or_else(|| {
        AirQualityError::UpstreamUnavailable("Geocoding returned a match without coordinates".into())
    })?;

    Ok(ResolvedLocation {
        display_name: label_or(place.display_name, "Unknown Location"),
        lat: coordinates.lat,
        lon: coordinates.lon,
    })
}

/// Map one measurement record, or `None` when its value is unusable.
pub fn normalize_measurement(raw: RawMeasurement) -> Option<Measurement> {
    let value = raw.value.as_ref().and_then(finite_number)?;
    Some(Measurement {
        parameter: raw.parameter.unwrap_or_default(),
        value,
        unit: raw.unit.unwrap_or_default(),
        observed_at: parse_timestamp(raw.date.as_ref().and_then(|d| d.utc.as_deref())),
        station_label: label_or(raw.location, UNKNOWN_STATION),
    })
}

/// Filter and map a measurement batch; an empty result is `NotFound`.
pub fn normalize_measurements(records: Vec<RawMeasurement>) -> PipelineResult<Vec<Measurement>> {
    let total = records.len();
    let measurements: Vec<Measurement> = records
        .into_iter()
        .filter_map(normalize_measurement)
        .collect();

    if measurements.len() < total {
        tracing::debug!(
            dropped = total - measurements.len(),
            kept = measurements.len(),
            "Dropped measurements without a finite value"
        );
    }

    if measurements.is_empty() {
        return Err(AirQualityError::not_found(
            "No valid measurements found for this location",
        ));
    }
    Ok(measurements)
}

/// Map one location record for `parameter`, or `None` when it has no finite
/// average for that parameter.
pub fn normalize_ranking(raw: RawLocation, parameter: Pollutant) -> Option<CityRanking> {
    let (value, unit) = raw
        .parameters
        .iter()
        .filter(|p| p.parameter.as_deref() == Some(parameter.as_str()))
        .find_map(|p| {
            let average = p.average.as_ref().and_then(finite_number)?;
            Some((average, p.unit.clone().unwrap_or_default()))
        })?;

    Some(CityRanking {
        city: label_or(raw.city, UNKNOWN_CITY),
        country: label_or(raw.country, UNKNOWN_COUNTRY),
        value,
        unit,
        coordinates: raw.coordinates.as_ref().and_then(RawCoordinates::coordinates),
        observed_at: parse_timestamp(raw.last_updated.as_deref()),
    })
}

/// Filter and map ranking records, keeping provider order.
pub fn normalize_rankings(
    records: Vec<RawLocation>,
    parameter: Pollutant,
) -> PipelineResult<Vec<CityRanking>> {
    let rankings: Vec<CityRanking> = records
        .into_iter()
        .filter_map(|raw| normalize_ranking(raw, parameter))
        .collect();

    if rankings.is_empty() {
        return Err(AirQualityError::not_found(format!(
            "No valid {parameter} data available for rankings"
        )));
    }
    Ok(rankings)
}
