//! Current weather lookup against an OpenWeatherMap-compatible API.

use std::time::Duration;

use agent_core::tools::{Tool, ToolError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub condition: String,
    pub description: String,
    pub humidity: f64,
    pub wind_speed: f64,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    name: String,
    #[serde(default)]
    sys: ProviderSys,
    main: ProviderMain,
    #[serde(default)]
    weather: Vec<ProviderCondition>,
    #[serde(default)]
    wind: ProviderWind,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderSys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct ProviderMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct ProviderCondition {
    main: String,
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderWind {
    #[serde(default)]
    speed: f64,
}

impl From<ProviderResponse> for WeatherReport {
    fn from(response: ProviderResponse) -> Self {
        let (condition, description) = response
            .weather
            .into_iter()
            .next()
            .map(|entry| (entry.main, entry.description))
            .unwrap_or_default();

        Self {
            city: response.name,
            country: response.sys.country,
            temperature: response.main.temp,
            feels_like: response.main.feels_like,
            condition,
            description,
            humidity: response.main.humidity,
            wind_speed: response.wind.speed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    city: String,
}

pub struct WeatherTool {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl WeatherTool {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn fetch(&self, city: &str) -> Result<WeatherReport, ToolError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ToolError::InvalidCredentials("Weather API key not configured".to_string())
        })?;

        let response = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    ToolError::Timeout(format!("weather request for '{city}' timed out"))
                } else {
                    ToolError::Provider(error.to_string())
                }
            })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(ToolError::CityNotFound(city.to_string())),
            StatusCode::UNAUTHORIZED => {
                return Err(ToolError::InvalidCredentials(
                    "weather provider rejected the API key".to_string(),
                ))
            }
            status => {
                return Err(ToolError::Provider(format!(
                    "weather provider returned HTTP {status}"
                )))
            }
        }

        let body: ProviderResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                ToolError::Timeout(format!("weather request for '{city}' timed out"))
            } else {
                ToolError::Provider(format!("unexpected weather payload: {error}"))
            }
        })?;

        Ok(body.into())
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a city."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name, optionally with a country code (e.g. \"London,UK\")"
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: WeatherArgs = serde_json::from_value(args)
            .map_err(|error| ToolError::InvalidArguments(error.to_string()))?;

        let report = self.fetch(&args.city).await?;
        serde_json::to_value(report).map_err(|error| ToolError::Execution(error.to_string()))
    }
}
