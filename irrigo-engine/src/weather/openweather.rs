use async_trait::async_trait;
use irrigo_core::{Region, WeatherCondition, WeatherSnapshot};
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::{WeatherError, WeatherSource};

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Current-conditions client for the OpenWeatherMap API.
#[derive(Clone)]
pub struct OpenWeatherSource {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl OpenWeatherSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_http_client(HttpClient::new(), OPENWEATHER_BASE_URL, api_key)
    }

    pub fn with_http_client(
        http: HttpClient,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentWeather {
    main: MainBlock,
    #[serde(default)]
    weather: Vec<ConditionBlock>,
    #[serde(default)]
    rain: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    main: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl WeatherSource for OpenWeatherSource {
    async fn fetch(&self, region: &Region) -> Result<WeatherSnapshot, WeatherError> {
        let url = format!("{}/weather", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("lat", region.location.lat.to_string()),
                ("lon", region.location.lon.to_string()),
                ("units", "metric".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| WeatherError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::UpstreamUnavailable(format!(
                "status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: CurrentWeather = response
            .json()
            .await
            .map_err(|e| WeatherError::Decode(e.to_string()))?;

        Ok(into_snapshot(region, body, jiff::Timestamp::now()))
    }
}

/// Maps the provider's primary condition group onto [`WeatherCondition`].
pub fn condition_from_main(main: &str) -> WeatherCondition {
    match main.to_ascii_lowercase().as_str() {
        "clear" => WeatherCondition::Sunny,
        "clouds" => WeatherCondition::Cloudy,
        "rain" | "drizzle" | "thunderstorm" => WeatherCondition::Rainy,
        _ => WeatherCondition::Other,
    }
}

pub(crate) fn into_snapshot(
    region: &Region,
    body: CurrentWeather,
    fetched_at: jiff::Timestamp,
) -> WeatherSnapshot {
    let first = body.weather.into_iter().next();
    let condition = first
        .as_ref()
        .map(|w| condition_from_main(&w.main))
        .unwrap_or(WeatherCondition::Other);
    let description = first.map(|w| w.description).unwrap_or_default();

    WeatherSnapshot {
        temperature: body.main.temp,
        humidity: body.main.humidity,
        condition,
        rain_forecast: body.rain.is_some(),
        description: description.into_boxed_str(),
        city: body
            .name
            .filter(|n| !n.is_empty())
            .map(String::into_boxed_str)
            .unwrap_or_else(|| region.name.clone()),
        region: region.id.clone(),
        fetched_at,
    }
}

#[cfg(test)]
mod tests {
    use irrigo_core::{GeoPoint, RegionId};

    use super::*;

    fn nagpur() -> Region {
        Region {
            id: RegionId::new("nagpur"),
            name: "Nagpur".into(),
            location: GeoPoint {
                lat: 21.1458,
                lon: 79.0882,
            },
        }
    }

    #[test]
    fn condition_groups_map_to_conditions() {
        assert_eq!(condition_from_main("Clear"), WeatherCondition::Sunny);
        assert_eq!(condition_from_main("Clouds"), WeatherCondition::Cloudy);
        assert_eq!(condition_from_main("Rain"), WeatherCondition::Rainy);
        assert_eq!(condition_from_main("Drizzle"), WeatherCondition::Rainy);
        assert_eq!(condition_from_main("Thunderstorm"), WeatherCondition::Rainy);
        assert_eq!(condition_from_main("Haze"), WeatherCondition::Other);
    }

    #[test]
    fn rain_block_means_rain_forecast() {
        let body: CurrentWeather = serde_json::from_str(
            r#"{
                "weather": [{"main": "Rain", "description": "light rain"}],
                "main": {"temp": 27.4, "humidity": 83},
                "rain": {"1h": 0.42},
                "name": "Nagpur"
            }"#,
        )
        .unwrap();

        let snapshot = into_snapshot(&nagpur(), body, jiff::Timestamp::now());
        assert!(snapshot.rain_forecast);
        assert_eq!(snapshot.condition, WeatherCondition::Rainy);
        assert_eq!(snapshot.temperature, 27.4);
        assert_eq!(snapshot.humidity, 83.0);
        assert_eq!(&*snapshot.description, "light rain");
    }

    #[test]
    fn missing_rain_block_means_dry() {
        let body: CurrentWeather = serde_json::from_str(
            r#"{
                "weather": [{"main": "Clouds", "description": "scattered clouds"}],
                "main": {"temp": 36.1, "humidity": 40}
            }"#,
        )
        .unwrap();

        let snapshot = into_snapshot(&nagpur(), body, jiff::Timestamp::now());
        assert!(!snapshot.rain_forecast);
        assert_eq!(snapshot.condition, WeatherCondition::Cloudy);
        assert_eq!(&*snapshot.city, "Nagpur");
        assert_eq!(snapshot.region.as_str(), "nagpur");
    }
}
