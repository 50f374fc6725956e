use crate::error::{AlertError, Result};
use crate::models::MAX_FORECAST_DAYS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "weather-alerts";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub location: LocationConfig,
    pub weather: WeatherConfig,
    pub email: Option<EmailConfig>,
    pub state_file: Option<PathBuf>,
    #[serde(default)]
    pub alert_rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LocationConfig {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon")]
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherProviderKind {
    #[default]
    Nws,
    #[serde(alias = "openweather")]
    OpenWeatherMap,
}

impl WeatherProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherProviderKind::Nws => "nws",
            WeatherProviderKind::OpenWeatherMap => "openweathermap",
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub provider: WeatherProviderKind,
    pub api_key: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: usize,
}

fn default_forecast_days() -> usize {
    7
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("user_agent", &self.user_agent)
            .field("forecast_days", &self.forecast_days)
            .finish()
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    #[serde(default = "default_true")]
    pub use_ssl: bool,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub to_addresses: Vec<String>,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("use_ssl", &self.use_ssl)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("to_addresses", &self.to_addresses)
            .finish()
    }
}

/// An alert rule as written in config.yaml; see `models::rule::load_rules`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub condition: ConditionConfig,
    pub action: ActionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionConfig {
    #[serde(rename = "type", default = "default_condition_type")]
    pub kind: String,
    pub weather_condition: Option<ThresholdConfig>,
    #[serde(default)]
    pub weather_conditions: Vec<ThresholdConfig>,
    #[serde(default = "default_true")]
    pub all_must_match: bool,
    #[serde(default = "default_season_start")]
    pub season_start_month: i64,
    #[serde(default = "default_season_end")]
    pub season_end_month: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThresholdConfig {
    pub field: String,
    pub operator: String,
    pub value: f64,
    #[serde(default = "default_rule_days")]
    pub forecast_days: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(alias = "subject_template")]
    pub subject: String,
    #[serde(alias = "body_template")]
    pub body: String,
}

fn default_true() -> bool {
    true
}

fn default_condition_type() -> String {
    "threshold".to_string()
}

fn default_season_start() -> i64 {
    1
}

fn default_season_end() -> i64 {
    12
}

fn default_rule_days() -> i64 {
    1
}

impl Config {
    pub fn load(config_override: Option<&Path>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p.to_path_buf(),
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(AlertError::Config(format!(
                "Config file not found at {:?}. Copy config.example.yaml to config/config.yaml and edit it.",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| AlertError::Config(format!("Failed to read config: {}", e)))?;

        let config = Self::parse(&config_str)?;
        tracing::debug!(path = %config_path.display(), rules = config.alert_rules.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parse YAML after `${VAR}` substitution
    pub fn parse(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content);

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| AlertError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.location.latitude)
            || !(-180.0..=180.0).contains(&self.location.longitude)
        {
            return Err(AlertError::Config(format!(
                "location ({}, {}) is not a valid latitude/longitude",
                self.location.latitude, self.location.longitude
            )));
        }

        if !(1..=MAX_FORECAST_DAYS).contains(&self.weather.forecast_days) {
            return Err(AlertError::Config(format!(
                "weather.forecast_days must be between 1 and {}",
                MAX_FORECAST_DAYS
            )));
        }

        if self.weather.provider == WeatherProviderKind::OpenWeatherMap
            && self.weather.api_key.as_deref().unwrap_or("").is_empty()
        {
            return Err(AlertError::Config(
                "OpenWeatherMap requires weather.api_key".into(),
            ));
        }

        if let Some(ref email) = self.email {
            if email.to_addresses.is_empty() {
                return Err(AlertError::Config(
                    "email.to_addresses needs at least one recipient".into(),
                ));
            }
        }

        Ok(())
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        for local in ["config/config.yaml", "config.yaml"] {
            let local_config = PathBuf::from(local);
            if local_config.exists() {
                return Ok(local_config);
            }
        }

        let default_path = dirs::config_dir()
            .ok_or_else(|| AlertError::Config("Cannot determine config directory".into()))?
            .join(APP_DIR)
            .join("config.yaml");
        Ok(default_path)
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        // Find all ${VAR_NAME} patterns and substitute
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }

    pub fn data_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("WEATHER_ALERTS_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| AlertError::Config("Cannot determine data directory".into()))?
            .join(APP_DIR);

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    /// CLI override, then `state_file` from config, then the data directory
    pub fn state_path(&self, state_override: Option<&Path>) -> Result<PathBuf> {
        if let Some(p) = state_override {
            return Ok(p.to_path_buf());
        }
        if let Some(ref p) = self.state_file {
            return Ok(p.clone());
        }
        Ok(Self::data_dir()?.join("state.json"))
    }

    /// Days to request from the provider: enough for the longest rule window
    pub fn fetch_days(&self) -> usize {
        let longest_rule = self
            .alert_rules
            .iter()
            .filter(|r| r.enabled)
            .flat_map(|r| {
                r.condition
                    .weather_condition
                    .iter()
                    .chain(r.condition.weather_conditions.iter())
            })
            .map(|t| t.forecast_days.clamp(1, MAX_FORECAST_DAYS as i64) as usize)
            .max()
            .unwrap_or(1);
        self.weather
            .forecast_days
            .max(longest_rule)
            .min(MAX_FORECAST_DAYS)
    }
}
