pub mod nws;
pub mod openweathermap;

pub use nws::NwsClient;
pub use openweathermap::OpenWeatherMapClient;

use crate::config::{Config, WeatherProviderKind};
use crate::error::{AlertError, Result};
use crate::models::Forecast;

/// Source of normalized daily forecasts
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch up to `days` days starting with today
    async fn fetch_forecast(&self, days: usize) -> Result<Forecast>;

    async fn test_connection(&self) -> Result<bool>;

    fn name(&self) -> &str;
}

pub fn build_provider(config: &Config) -> Result<Box<dyn WeatherProvider>> {
    match config.weather.provider {
        WeatherProviderKind::Nws => Ok(Box::new(NwsClient::new(
            config.location,
            config.weather.user_agent.clone(),
        )?)),
        WeatherProviderKind::OpenWeatherMap => {
            let api_key = config
                .weather
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| AlertError::Config("OpenWeatherMap requires weather.api_key".into()))?;
            Ok(Box::new(OpenWeatherMapClient::new(config.location, api_key)?))
        }
    }
}
