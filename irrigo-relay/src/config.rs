use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use irrigo_core::{Profile, RegionId};
use irrigo_engine::catalog::{CatalogError, RegionEntry, SoilCatalog};
use irrigo_engine::runtime::{Field, Schedule};
use irrigo_engine::tank::{Refill, TankError, TankThresholds};
use irrigo_engine::weather::{
    FallbackPolicy, OpenWeatherSource, SimulatedWeatherSource, WeatherGateway, WeatherSource,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const MOISTURE_THRESHOLD_RANGE: std::ops::RangeInclusive<u8> = 30..=80;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Tank(#[from] TankError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub weather: WeatherConfig,
    pub activity: ActivityConfig,
    pub profile: ProfileConfig,
    pub field: Field,
    pub schedule: Schedule,
    pub tank: TankConfig,
    /// Replaces the built-in region catalog when non-empty.
    pub regions: Vec<RegionEntry>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !MOISTURE_THRESHOLD_RANGE.contains(&self.profile.moisture_threshold) {
            return Err(ConfigError::Invalid(format!(
                "moisture_threshold must be within 30-80, got {}",
                self.profile.moisture_threshold
            )));
        }

        let catalog = self.catalog()?;
        catalog.soil(self.profile.default_region.as_str(), self.field.soil.as_str())?;
        catalog.soil(self.field.region.as_str(), self.field.soil.as_str())?;

        self.tank.thresholds().validate()?;
        if !(0.0..=100.0).contains(&self.tank.initial_level) {
            return Err(ConfigError::Invalid(format!(
                "tank initial_level must be within 0-100, got {}",
                self.tank.initial_level
            )));
        }

        let refill_ordered = 0.0 <= self.tank.refill_at
            && self.tank.refill_at < self.tank.refill_to
            && self.tank.refill_to <= 100.0;
        if !refill_ordered {
            return Err(ConfigError::Invalid(format!(
                "tank refill_at {} must be below refill_to {} within 0-100",
                self.tank.refill_at, self.tank.refill_to
            )));
        }

        let periods = [
            ("sensor_interval_secs", self.schedule.sensor_interval_secs),
            ("tank_interval_secs", self.schedule.tank_interval_secs),
            ("weather_refresh_secs", self.schedule.weather_refresh_secs),
            ("auto_evaluate_secs", self.schedule.auto_evaluate_secs),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("schedule {name} must be positive")));
        }

        if self.weather.timeout_secs == 0 {
            return Err(ConfigError::Invalid("weather timeout_secs must be positive".into()));
        }

        Ok(())
    }

    pub fn catalog(&self) -> Result<SoilCatalog, CatalogError> {
        if self.regions.is_empty() {
            return Ok(SoilCatalog::builtin());
        }
        SoilCatalog::from_entries(self.regions.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherProvider {
    #[default]
    OpenWeather,
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub provider: WeatherProvider,
    /// Takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub fallback: FallbackPolicy,
    pub max_age_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            provider: WeatherProvider::OpenWeather,
            api_key: None,
            api_key_env: "OPENWEATHER_API_KEY".to_string(),
            base_url: irrigo_engine::weather::OPENWEATHER_BASE_URL.to_string(),
            timeout_secs: 5,
            fallback: FallbackPolicy::LastKnownGood,
            max_age_secs: 30 * 60,
        }
    }
}

impl WeatherConfig {
    fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn build_gateway(&self, catalog: Arc<SoilCatalog>) -> WeatherGateway {
        let source: Arc<dyn WeatherSource> = match (self.provider, self.api_key()) {
            (WeatherProvider::OpenWeather, Some(key)) => {
                info!(base_url = %self.base_url, "Using OpenWeather provider");
                Arc::new(OpenWeatherSource::with_http_client(
                    reqwest::Client::new(),
                    &self.base_url,
                    key,
                ))
            }
            (WeatherProvider::OpenWeather, None) => {
                warn!(
                    env = %self.api_key_env,
                    "No OpenWeather API key configured, using simulated weather"
                );
                Arc::new(SimulatedWeatherSource::new())
            }
            (WeatherProvider::Simulated, _) => {
                info!("Using simulated weather provider");
                Arc::new(SimulatedWeatherSource::new())
            }
        };

        WeatherGateway::new(source, catalog)
            .with_fallback(self.fallback)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_age(Duration::from_secs(self.max_age_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActivityConfig {
    Memory {
        #[serde(default)]
        capacity: Option<usize>,
    },
    Sqlite {
        path: PathBuf,
    },
}

impl Default for ActivityConfig {
    fn default() -> Self {
        ActivityConfig::Memory {
            capacity: Some(500),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub default_region: RegionId,
    pub moisture_threshold: u8,
    pub notifications: bool,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        let profile = Profile::default();
        Self {
            default_region: profile.default_region,
            moisture_threshold: profile.moisture_threshold,
            notifications: profile.notifications,
        }
    }
}

impl From<ProfileConfig> for Profile {
    fn from(p: ProfileConfig) -> Self {
        Profile {
            default_region: RegionId::new(p.default_region.as_str()),
            moisture_threshold: p.moisture_threshold,
            notifications: p.notifications,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TankConfig {
    pub empty_at: f64,
    pub full_at: f64,
    /// Starting level of the simulated gauge.
    pub initial_level: f64,
    /// The simulated gauge is topped up to `refill_to` once it reaches this level.
    pub refill_at: f64,
    pub refill_to: f64,
}

impl TankConfig {
    pub fn thresholds(&self) -> TankThresholds {
        TankThresholds {
            empty_at: self.empty_at,
            full_at: self.full_at,
        }
    }

    pub fn refill(&self) -> Refill {
        Refill {
            at: self.refill_at,
            to: self.refill_to,
        }
    }
}

impl Default for TankConfig {
    fn default() -> Self {
        let thresholds = TankThresholds::default();
        let refill = Refill::default();
        Self {
            empty_at: thresholds.empty_at,
            full_at: thresholds.full_at,
            initial_level: 75.0,
            refill_at: refill.at,
            refill_to: refill.to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.http_addr.port(), 8080);
        assert_eq!(config.profile.moisture_threshold, 60);
        assert_eq!(config.field.region.as_str(), "nagpur");
        assert_eq!(config.schedule.cooldown_secs, 300);
        assert_eq!(
            config.activity,
            ActivityConfig::Memory {
                capacity: Some(500)
            }
        );
    }

    #[test]
    fn full_file_parses() {
        let config = Config::from_toml(
            r#"
            [server]
            http_addr = "127.0.0.1:9090"

            [weather]
            provider = "simulated"
            fallback = "none"
            timeout_secs = 3

            [activity]
            type = "sqlite"
            path = "/var/lib/irrigo/activity.db"

            [profile]
            default_region = "Amravati"
            moisture_threshold = 45
            notifications = false

            [field]
            region = "amravati"
            soil = "clay"

            [schedule]
            auto_enabled = false

            [tank]
            empty_at = 15.0
            full_at = 90.0
            "#,
        )
        .unwrap();

        assert_eq!(config.weather.provider, WeatherProvider::Simulated);
        assert_eq!(config.weather.fallback, FallbackPolicy::None);
        assert_eq!(
            config.activity,
            ActivityConfig::Sqlite {
                path: PathBuf::from("/var/lib/irrigo/activity.db")
            }
        );
        assert!(!config.schedule.auto_enabled);
        assert_eq!(config.schedule.sensor_interval_secs, 3);
        assert_eq!(config.tank.thresholds().empty_at, 15.0);

        let profile: Profile = config.profile.into();
        assert_eq!(profile.default_region.as_str(), "amravati");
    }

    #[test]
    fn threshold_outside_range_is_rejected() {
        for threshold in [29, 81] {
            let toml = format!("[profile]\nmoisture_threshold = {threshold}\n");
            assert!(matches!(
                Config::from_toml(&toml),
                Err(ConfigError::Invalid(_))
            ));
        }
    }

    #[test]
    fn unknown_field_soil_is_rejected() {
        let err = Config::from_toml("[field]\nregion = \"nagpur\"\nsoil = \"peat\"\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Catalog(CatalogError::UnknownSoil { .. })
        ));
    }

    #[test]
    fn inverted_tank_thresholds_are_rejected() {
        let err = Config::from_toml("[tank]\nempty_at = 90.0\nfull_at = 10.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Tank(_)));
    }

    #[test]
    fn tank_refill_marks() {
        let config = Config::from_toml("[tank]\nrefill_at = 10.0\nrefill_to = 80.0\n").unwrap();
        assert_eq!(config.tank.refill(), Refill { at: 10.0, to: 80.0 });
        assert_eq!(Config::default().tank.refill(), Refill::default());

        let err = Config::from_toml("[tank]\nrefill_at = 80.0\nrefill_to = 40.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn custom_regions_replace_builtin() {
        let config = Config::from_toml(
            r#"
            [profile]
            default_region = "wardha"

            [field]
            region = "wardha"
            soil = "black"

            [[regions]]
            id = "wardha"
            name = "Wardha"
            location = { lat = 20.7453, lon = 78.6022 }

            [[regions.soils]]
            id = "black"
            name = "Black Cotton Soil"
            description = "Heavy, swells when wet"
            watering_multiplier = 0.8
            "#,
        )
        .unwrap();

        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.multiplier("wardha", "black").unwrap(), 0.8);
        assert!(catalog.region("nagpur").is_err());
    }
}
