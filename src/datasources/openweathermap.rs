use super::WeatherProvider;
use crate::config::LocationConfig;
use crate::error::{AlertError, Result};
use crate::models::forecast::{Field, Forecast, ForecastDay};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const API_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
const SLOTS_PER_DAY: usize = 8;
// The 5-day/3-hour endpoint never returns more than this many slots
const MAX_SLOTS: usize = 40;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct OpenWeatherMapClient {
    client: reqwest::Client,
    location: LocationConfig,
    api_key: String,
}

// OpenWeatherMap API response structures
#[derive(Debug, Deserialize)]
struct OwmForecastResponse {
    list: Vec<OwmForecastItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwmForecastItem {
    dt: i64,
    main: OwmMain,
    #[serde(default)]
    wind: Option<OwmWind>,
    #[serde(default)]
    pop: Option<f64>, // probability of precipitation, 0..1
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

impl OpenWeatherMapClient {
    pub fn new(location: LocationConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            location,
            api_key,
        })
    }

    fn forecast_url(&self, days: usize) -> String {
        format!(
            "{}/forecast?lat={}&lon={}&appid={}&units=imperial&cnt={}",
            API_BASE_URL,
            self.location.latitude,
            self.location.longitude,
            self.api_key,
            days.saturating_mul(SLOTS_PER_DAY).min(MAX_SLOTS)
        )
    }
}

#[async_trait::async_trait]
impl WeatherProvider for OpenWeatherMapClient {
    /// Fetch 5-day/3-hour forecast and collapse it to daily values
    async fn fetch_forecast(&self, days: usize) -> Result<Forecast> {
        let response = self
            .client
            .get(self.forecast_url(days))
            .send()
            .await
            .map_err(|e| AlertError::DataSourceUnavailable(format!("OpenWeatherMap: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::DataSourceUnavailable(format!(
                "OpenWeatherMap returned {}: {}",
                status, body
            )));
        }

        let owm_response: OwmForecastResponse = response.json().await.map_err(|e| {
            AlertError::DataSourceUnavailable(format!(
                "Failed to parse OpenWeatherMap response: {}",
                e
            ))
        })?;

        normalize_items(&owm_response.list, days)
    }

    /// Test connection to OpenWeatherMap API
    async fn test_connection(&self) -> Result<bool> {
        let url = format!(
            "{}/weather?lat={}&lon={}&appid={}&units=imperial",
            API_BASE_URL, self.location.latitude, self.location.longitude, self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AlertError::DataSourceUnavailable(format!("OpenWeatherMap: {}", e)))?;

        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "openweathermap"
    }
}

#[derive(Default)]
struct DayAccumulator {
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    pop_percent: Option<f64>,
    humidity_sum: f64,
    humidity_count: usize,
    wind_max: Option<f64>,
}

/// Group 3-hour slots by UTC date
pub(crate) fn normalize_items(items: &[OwmForecastItem], days: usize) -> Result<Forecast> {
    let mut by_date: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for item in items {
        let date = DateTime::from_timestamp(item.dt, 0)
            .ok_or_else(|| AlertError::Data(format!("bad OpenWeatherMap timestamp {}", item.dt)))?
            .date_naive();
        let acc = by_date.entry(date).or_default();

        acc.temp_min = Some(acc.temp_min.map_or(item.main.temp_min, |t| t.min(item.main.temp_min)));
        acc.temp_max = Some(acc.temp_max.map_or(item.main.temp_max, |t| t.max(item.main.temp_max)));

        if let Some(pop) = item.pop {
            let percent = pop * 100.0;
            acc.pop_percent = Some(acc.pop_percent.map_or(percent, |p| p.max(percent)));
        }

        acc.humidity_sum += item.main.humidity;
        acc.humidity_count += 1;

        if let Some(ref wind) = item.wind {
            acc.wind_max = Some(acc.wind_max.map_or(wind.speed, |w| w.max(wind.speed)));
        }
    }

    let daily = by_date
        .into_iter()
        .take(days)
        .map(|(date, acc)| {
            let mut day = ForecastDay::new(date)
                .with_field(Field::PrecipitationProbability, acc.pop_percent.unwrap_or(0.0));
            if let Some(t) = acc.temp_min {
                day.fields.insert(Field::TemperatureMin, t);
            }
            if let Some(t) = acc.temp_max {
                day.fields.insert(Field::TemperatureMax, t);
            }
            if acc.humidity_count > 0 {
                day.fields
                    .insert(Field::Humidity, acc.humidity_sum / acc.humidity_count as f64);
            }
            if let Some(w) = acc.wind_max {
                day.fields.insert(Field::WindSpeed, w);
            }
            day
        })
        .collect();

    Forecast::new(daily)
}
