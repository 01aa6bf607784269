//! DTOs and normalisation for Open-Meteo archive responses.
//!
//! The archive API returns column-oriented daily arrays keyed by variable
//! name. Normalisation transposes them into one JSON object per date, attaches
//! the site elevation, and derives means the API leaves implicit. Missing
//! readings stay `null` rather than being dropped, so every day in the
//! requested range appears exactly once.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::sanitize::finite_number;

/// Daily variables requested from the archive, in query order.
pub(super) const DAILY_VARIABLES: [&str; 9] = [
    "temperature_2m_max",
    "temperature_2m_min",
    "temperature_2m_mean",
    "precipitation_sum",
    "rain_sum",
    "snowfall_sum",
    "windspeed_10m_max",
    "relative_humidity_2m_max",
    "relative_humidity_2m_min",
];

#[derive(Debug, Deserialize)]
pub(super) struct ArchiveResponseDto {
    pub(super) elevation: Option<f64>,
    pub(super) daily: DailyBlockDto,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct DailyBlockDto {
    #[serde(default)]
    pub(super) time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    rain_sum: Vec<Option<f64>>,
    #[serde(default)]
    snowfall_sum: Vec<Option<f64>>,
    #[serde(default)]
    windspeed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_min: Vec<Option<f64>>,
}

fn reading(column: &[Option<f64>], index: usize) -> Option<f64> {
    column.get(index).copied().flatten()
}

fn number_or_null(value: Option<f64>) -> Value {
    value.map_or(Value::Null, finite_number)
}

fn mean(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        _ => None,
    }
}

impl ArchiveResponseDto {
    /// Transpose the daily columns into the cacheable payload.
    pub(super) fn into_payload(self) -> Value {
        let daily = &self.daily;
        let days: Vec<Value> = daily
            .time
            .iter()
            .enumerate()
            .map(|(i, date)| {
                let temp_max = reading(&daily.temperature_2m_max, i);
                let temp_min = reading(&daily.temperature_2m_min, i);
                // The archive omits the mean column for some sites; fall back
                // to the midpoint of the extremes.
                let temp_mean = reading(&daily.temperature_2m_mean, i)
                    .or_else(|| mean(temp_max, temp_min));
                let humidity_mean = mean(
                    reading(&daily.relative_humidity_2m_max, i),
                    reading(&daily.relative_humidity_2m_min, i),
                );
                json!({
                    "date": date,
                    "temperature_max_c": number_or_null(temp_max),
                    "temperature_min_c": number_or_null(temp_min),
                    "temperature_mean_c": number_or_null(temp_mean),
                    "precipitation_mm": number_or_null(reading(&daily.precipitation_sum, i)),
                    "rain_mm": number_or_null(reading(&daily.rain_sum, i)),
                    "snowfall_cm": number_or_null(reading(&daily.snowfall_sum, i)),
                    "wind_speed_max_kmh": number_or_null(reading(&daily.windspeed_10m_max, i)),
                    "relative_humidity_mean_pct": number_or_null(humidity_mean),
                })
            })
            .collect();

        json!({
            "provider": "open-meteo",
            "elevation_m": number_or_null(self.elevation),
            "days": days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(body: &str) -> ArchiveResponseDto {
        serde_json::from_str(body).expect("archive JSON decodes")
    }

    #[test]
    fn transposes_columns_into_per_date_rows() {
        let payload = decoded(
            r#"{
                "elevation": 550.0,
                "daily": {
                    "time": ["2025-06-01", "2025-06-02"],
                    "temperature_2m_max": [24.1, 26.3],
                    "temperature_2m_min": [12.0, 13.2],
                    "temperature_2m_mean": [18.3, 19.9],
                    "precipitation_sum": [0.0, 4.2],
                    "relative_humidity_2m_max": [80.0, 90.0],
                    "relative_humidity_2m_min": [40.0, 50.0]
                }
            }"#,
        )
        .into_payload();

        assert_eq!(payload["provider"], "open-meteo");
        assert_eq!(payload["elevation_m"], 550.0);
        let days = payload["days"].as_array().expect("days array");
        assert_eq!(days.len(), 2);
        assert_eq!(days[0]["date"], "2025-06-01");
        assert_eq!(days[0]["temperature_mean_c"], 18.3);
        assert_eq!(days[1]["precipitation_mm"], 4.2);
        assert_eq!(days[1]["relative_humidity_mean_pct"], 70.0);
    }

    #[test]
    fn missing_mean_falls_back_to_the_midpoint() {
        let payload = decoded(
            r#"{
                "elevation": null,
                "daily": {
                    "time": ["2025-06-01"],
                    "temperature_2m_max": [30.0],
                    "temperature_2m_min": [10.0]
                }
            }"#,
        )
        .into_payload();

        let day = &payload["days"][0];
        assert_eq!(day["temperature_mean_c"], 20.0);
        assert_eq!(payload["elevation_m"], Value::Null);
    }

    #[test]
    fn short_or_missing_columns_become_nulls_not_gaps() {
        let payload = decoded(
            r#"{
                "daily": {
                    "time": ["2025-06-01", "2025-06-02"],
                    "precipitation_sum": [1.5],
                    "windspeed_10m_max": [null, 22.0]
                }
            }"#,
        )
        .into_payload();

        let days = payload["days"].as_array().expect("days array");
        assert_eq!(days.len(), 2, "every date keeps its row");
        assert_eq!(days[0]["precipitation_mm"], 1.5);
        assert_eq!(days[1]["precipitation_mm"], Value::Null);
        assert_eq!(days[0]["wind_speed_max_kmh"], Value::Null);
        assert_eq!(days[1]["wind_speed_max_kmh"], 22.0);
    }
}
