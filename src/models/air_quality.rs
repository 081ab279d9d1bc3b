//! Normalized air-quality schema and validated query types.

use crate::error::{AirQualityError, PipelineResult};
use chrono::{DateTime, Utc};
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_RADIUS_METERS: u32 = 10_000;
pub const MIN_RADIUS_METERS: u32 = 1_000;
pub const MAX_RADIUS_METERS: u32 = 100_000;

pub const DEFAULT_RANKING_LIMIT: u32 = 10;
pub const MIN_RANKING_LIMIT: u32 = 5;
pub const MAX_RANKING_LIMIT: u32 = 100;

/// Geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// First geocoding match for a free-text place name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
    pub display_name: String,
    pub lat: f64,
    pub lon: f64,
}

impl ResolvedLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// One pollutant reading from a monitoring station.
///
/// `value` is always finite; records without a usable value never make it
/// this far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub parameter: String,
    pub value: f64,
    pub unit: String,
    pub observed_at: Option<DateTime<Utc>>,
    pub station_label: String,
}

/// Measurements near a resolved location. `measurements` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct AirQualityResult {
    pub location: String,
    pub coordinates: Coordinates,
    pub measurements: Vec<Measurement>,
}

/// A location's average for one pollutant, as ranked by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct CityRanking {
    pub city: String,
    pub country: String,
    pub value: f64,
    pub unit: String,
    pub coordinates: Option<Coordinates>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// Pollutant parameters that can be ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    #[default]
    Pm25,
    Pm10,
    No2,
    So2,
    O3,
    Co,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::O3,
        Pollutant::Co,
    ];

    /// Provider parameter code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::No2 => "no2",
            Pollutant::So2 => "so2",
            Pollutant::O3 => "o3",
            Pollutant::Co => "co",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pollutant {
    type Err = AirQualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pollutant::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                AirQualityError::invalid_input(format!(
                    "parameter: must be one of pm25, pm10, no2, so2, o3, co (got '{s}')"
                ))
            })
    }
}

/// Validated input for an air-quality lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationQuery {
    text: String,
    radius_meters: u32,
}

impl LocationQuery {
    /// Validate a free-text location and optional radius.
    ///
    /// Blank text and radii outside `[1000, 100000]` are `InvalidInput`.
    pub fn new(text: &str, radius_meters: Option<i64>) -> PipelineResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AirQualityError::invalid_input("location: Location is required"));
        }

        let radius_meters = match radius_meters {
            None => DEFAULT_RADIUS_METERS,
            Some(r) if (MIN_RADIUS_METERS as i64..=MAX_RADIUS_METERS as i64).contains(&r) => r as u32,
            Some(r) => {
                return Err(AirQualityError::invalid_input(format!(
                    "radius: must be between {MIN_RADIUS_METERS} and {MAX_RADIUS_METERS} meters (got {r})"
                )));
            }
        };

        Ok(Self {
            text: text.to_string(),
            radius_meters,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn radius_meters(&self) -> u32 {
        self.radius_meters
    }
}

/// Validated input for a city ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingQuery {
    parameter: Pollutant,
    limit: u32,
}

impl RankingQuery {
    pub fn new(parameter: Option<Pollutant>, limit: Option<i64>) -> PipelineResult<Self> {
        let limit = match limit {
            None => DEFAULT_RANKING_LIMIT,
            Some(l) if (MIN_RANKING_LIMIT as i64..=MAX_RANKING_LIMIT as i64).contains(&l) => l as u32,
            Some(l) => {
                return Err(AirQualityError::invalid_input(format!(
                    "limit: must be between {MIN_RANKING_LIMIT} and {MAX_RANKING_LIMIT} (got {l})"
                )));
            }
        };

        Ok(Self {
            parameter: parameter.unwrap_or_default(),
            limit,
        })
    }

    /// Parse the raw string form used by query strings.
    pub fn parse(parameter: Option<&str>, limit: Option<i64>) -> PipelineResult<Self> {
        let parameter = parameter.map(str::parse::<Pollutant>).transpose()?;
        Self::new(parameter, limit)
    }

    pub fn parameter(&self) -> Pollutant {
        self.parameter
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
