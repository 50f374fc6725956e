use crate::error::{AlertError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest look-ahead a rule or provider request may ask for
pub const MAX_FORECAST_DAYS: usize = 16;

/// Forecast fields a condition can test against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    TemperatureMin,
    TemperatureMax,
    PrecipitationProbability,
    Humidity,
    WindSpeed,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::TemperatureMin,
        Field::TemperatureMax,
        Field::PrecipitationProbability,
        Field::Humidity,
        Field::WindSpeed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::TemperatureMin => "temperature_min",
            Field::TemperatureMax => "temperature_max",
            Field::PrecipitationProbability => "precipitation_probability",
            Field::Humidity => "humidity",
            Field::WindSpeed => "wind_speed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Field::ALL.into_iter().find(|f| f.as_str() == s.trim())
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One normalized forecast day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub fields: BTreeMap<Field, f64>,
}

impl ForecastDay {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: Field, value: f64) -> Self {
        self.fields.insert(field, value);
        self
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.fields.get(&field).copied()
    }
}

/// Provider-agnostic forecast, ordered by date with no duplicates.
///
/// Built fresh each run and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Forecast {
    days: Vec<ForecastDay>,
}

impl Forecast {
    /// Build a forecast, rejecting out-of-order or duplicate dates
    pub fn new(days: Vec<ForecastDay>) -> Result<Self> {
        for pair in days.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(AlertError::Data(format!(
                    "forecast dates must be strictly increasing ({} followed by {})",
                    pair[0].date, pair[1].date
                )));
            }
        }
        Ok(Self { days })
    }

    pub fn days(&self) -> &[ForecastDay] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// The days a rule looking `forecast_days` ahead should examine.
    ///
    /// Starts at `today` when the forecast contains it, otherwise at the
    /// forecast's first day. Returns fewer than `forecast_days` entries when
    /// the forecast is too short.
    pub fn window(&self, today: NaiveDate, forecast_days: usize) -> &[ForecastDay] {
        let start = self
            .days
            .iter()
            .position(|d| d.date == today)
            .unwrap_or(0);
        let end = (start + forecast_days).min(self.days.len());
        &self.days[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn three_days() -> Forecast {
        Forecast::new(vec![
            ForecastDay::new(date(2024, 1, 15)).with_field(Field::TemperatureMin, 28.0),
            ForecastDay::new(date(2024, 1, 16)).with_field(Field::TemperatureMin, 35.0),
            ForecastDay::new(date(2024, 1, 17)).with_field(Field::TemperatureMin, 40.0),
        ])
        .unwrap()
    }

    #[test]
    fn field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_str(field.as_str()), Some(field));
        }
        assert_eq!(Field::from_str("temp_min"), None);
    }

    #[test]
    fn rejects_duplicate_and_unordered_dates() {
        let dup = Forecast::new(vec![
            ForecastDay::new(date(2024, 1, 15)),
            ForecastDay::new(date(2024, 1, 15)),
        ]);
        assert!(matches!(dup, Err(AlertError::Data(_))));

        let backwards = Forecast::new(vec![
            ForecastDay::new(date(2024, 1, 16)),
            ForecastDay::new(date(2024, 1, 15)),
        ]);
        assert!(backwards.is_err());
    }

    #[test]
    fn window_starts_at_today_when_present() {
        let forecast = three_days();
        let window = forecast.window(date(2024, 1, 16), 2);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].date, date(2024, 1, 16));
    }

    #[test]
    fn window_falls_back_to_first_day() {
        let forecast = three_days();
        let window = forecast.window(date(2024, 1, 10), 1);
        assert_eq!(window[0].date, date(2024, 1, 15));
    }

    #[test]
    fn window_truncates_short_forecast() {
        let forecast = three_days();
        assert_eq!(forecast.window(date(2024, 1, 15), 7).len(), 3);
    }
}
