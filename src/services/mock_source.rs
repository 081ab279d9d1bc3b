//! Synthetic data served in mock mode.
//!
//! Payloads have exactly the shape of the live pipeline's output so callers
//! never branch on the mode.

use crate::models::{AirQualityResult, CityRanking, Coordinates, Measurement};
use chrono::Utc;
use rand::Rng;

pub const MOCK_RANKING_COUNT: usize = 10;
pub const MOCK_MAX_VALUE: f64 = 50.0;

const MOCK_UNIT: &str = "µg/m³";

/// Fixed single-station result, independent of the query.
pub fn air_quality() -> AirQualityResult {
    AirQualityResult {
        location: "Sample City".to_string(),
        coordinates: Coordinates {
            lat: 40.7128,
            lon: -74.0060,
        },
        measurements: vec![Measurement {
            parameter: "pm25".to_string(),
            value: 15.0,
            unit: MOCK_UNIT.to_string(),
            observed_at: Some(Utc::now()),
            station_label: "Sample Station 1".to_string(),
        }],
    }
}

/// Ten sample cities with values in `[0, 50)`, highest first.
pub fn city_rankings() -> Vec<CityRanking> {
    let mut rng = rand::thread_rng();
    let now = Utc::now();

    let mut values: Vec<f64> = (0..MOCK_RANKING_COUNT)
        .map(|_| rng.gen_range(0.0..MOCK_MAX_VALUE))
        .collect();
    values.sort_by(|a, b| b.total_cmp(a));

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| CityRanking {
            city: format!("City {}", i + 1),
            country: "Sample Country".to_string(),
            value,
            unit: MOCK_UNIT.to_string(),
            coordinates: None,
            observed_at: Some(now),
        })
        .collect()
}
