use super::WeatherProvider;
use crate::config::LocationConfig;
use crate::error::{AlertError, Result};
use crate::models::forecast::{Field, Forecast, ForecastDay};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;

const API_BASE_URL: &str = "https://api.weather.gov";
const DEFAULT_USER_AGENT: &str = concat!("weather-alerts/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// National Weather Service client (US locations, no API key)
pub struct NwsClient {
    client: reqwest::Client,
    location: LocationConfig,
    user_agent: String,
}

// api.weather.gov response structures
#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    forecast: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Vec<NwsPeriod>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NwsPeriod {
    start_time: String,
    is_daytime: bool,
    temperature: f64,
    #[serde(default)]
    probability_of_precipitation: Option<QuantitativeValue>,
    #[serde(default)]
    relative_humidity: Option<QuantitativeValue>,
    #[serde(default)]
    wind_speed: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct QuantitativeValue {
    value: Option<f64>,
}

impl NwsClient {
    pub fn new(location: LocationConfig, user_agent: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            location,
            user_agent: user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/geo+json")
            .send()
            .await
            .map_err(|e| AlertError::DataSourceUnavailable(format!("NWS: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::DataSourceUnavailable(format!(
                "NWS returned {}: {}",
                status, body
            )));
        }

        response.json().await.map_err(|e| {
            AlertError::DataSourceUnavailable(format!("Failed to parse NWS response: {}", e))
        })
    }

    fn points_url(&self) -> String {
        format!(
            "{}/points/{:.4},{:.4}",
            API_BASE_URL, self.location.latitude, self.location.longitude
        )
    }
}

#[async_trait::async_trait]
impl WeatherProvider for NwsClient {
    async fn fetch_forecast(&self, days: usize) -> Result<Forecast> {
        let points: PointsResponse = self.get_json(&self.points_url()).await?;
        tracing::debug!(url = %points.properties.forecast, "Resolved NWS forecast endpoint");

        let forecast: ForecastResponse = self.get_json(&points.properties.forecast).await?;
        normalize_periods(&forecast.properties.periods, days)
    }

    async fn test_connection(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.points_url())
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| AlertError::DataSourceUnavailable(format!("NWS: {}", e)))?;

        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "nws"
    }
}

/// Collapse day/night periods into one `ForecastDay` per local calendar date
pub(crate) fn normalize_periods(periods: &[NwsPeriod], days: usize) -> Result<Forecast> {
    let mut daily: Vec<ForecastDay> = Vec::new();

    for period in periods.iter().take(days * 2) {
        let date = period_date(&period.start_time)?;

        if daily.last().map(|d| d.date) != Some(date) {
            daily.push(ForecastDay::new(date));
        }
        let Some(day) = daily.last_mut() else {
            continue;
        };

        let temp_field = if period.is_daytime {
            Field::TemperatureMax
        } else {
            Field::TemperatureMin
        };
        day.fields.insert(temp_field, period.temperature);

        let precip = period
            .probability_of_precipitation
            .as_ref()
            .and_then(|q| q.value)
            .unwrap_or(0.0);
        raise(day, Field::PrecipitationProbability, precip);

        if let Some(humidity) = period.relative_humidity.as_ref().and_then(|q| q.value) {
            raise(day, Field::Humidity, humidity);
        }

        if let Some(wind) = period.wind_speed.as_deref().and_then(parse_wind_speed) {
            raise(day, Field::WindSpeed, wind);
        }
    }

    daily.truncate(days);
    Forecast::new(daily)
}

fn raise(day: &mut ForecastDay, field: Field, value: f64) {
    let entry = day.fields.entry(field).or_insert(value);
    if value > *entry {
        *entry = value;
    }
}

fn period_date(start_time: &str) -> Result<NaiveDate> {
    DateTime::parse_from_rfc3339(start_time)
        .map(|dt| dt.date_naive())
        .map_err(|e| AlertError::Data(format!("bad NWS startTime '{}': {}", start_time, e)))
}

/// Highest number in strings like "10 mph" or "5 to 15 mph"
pub(crate) fn parse_wind_speed(text: &str) -> Option<f64> {
    text.split(|c: char| !c.is_ascii_digit() && c != '.')
        .filter_map(|tok| tok.parse::<f64>().ok())
        .reduce(f64::max)
}
