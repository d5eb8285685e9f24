use std::fmt;

use ordered_float::NotNan;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

type BoxStr = Box<str>;

/// Lower-case region identifier, e.g. `nagpur`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(pub BoxStr);

impl RegionId {
    /// Normalizes the identifier so lookups are case-insensitive.
    pub fn new(id: &str) -> Self {
        Self(id.trim().to_lowercase().into_boxed_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoilId(pub BoxStr);

impl SoilId {
    pub fn new(id: &str) -> Self {
        Self(id.trim().to_lowercase().into_boxed_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoilId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub Ulid);

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: BoxStr,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoilType {
    pub id: SoilId,
    pub name: BoxStr,
    pub description: BoxStr,
    pub watering_multiplier: NotNan<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Rainy,
    Other,
}

impl WeatherCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCondition::Sunny => "sunny",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Rainy => "rainy",
            WeatherCondition::Other => "other",
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, 0-100.
    pub humidity: f64,
    pub condition: WeatherCondition,
    pub rain_forecast: bool,
    pub description: BoxStr,
    pub city: BoxStr,
    pub region: RegionId,
    pub fetched_at: jiff::Timestamp,
}

impl WeatherSnapshot {
    /// Time elapsed since the snapshot was fetched.
    pub fn age(&self, now: jiff::Timestamp) -> jiff::SignedDuration {
        now.duration_since(self.fetched_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Skip,
    Light,
    Moderate,
    Heavy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WateringRecommendation {
    pub base_duration_seconds: u32,
    /// Rounded to one decimal.
    pub adjusted_duration_seconds: f64,
    pub tier: Tier,
    pub rationale: BoxStr,
}

impl WateringRecommendation {
    /// Whole seconds used for pump countdowns.
    pub fn countdown_seconds(&self) -> u32 {
        self.adjusted_duration_seconds.round().max(0.0) as u32
    }

    pub fn is_skip(&self) -> bool {
        self.tier == Tier::Skip
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Empty,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TankBand {
    Empty,
    Normal,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TankState {
    pub level_percent: f64,
    pub last_alert: Option<AlertKind>,
}

impl TankState {
    pub fn is_empty(&self) -> bool {
        self.last_alert == Some(AlertKind::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub level_percent: f64,
    pub timestamp: jiff::Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Soil moisture, 0-100.
    pub moisture_level: f64,
    /// Soil temperature in degrees Celsius, 20-40.
    pub temperature: f64,
    pub timestamp: jiff::Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpMode {
    Auto,
    Manual,
}

impl fmt::Display for PumpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpMode::Auto => f.write_str("auto"),
            PumpMode::Manual => f.write_str("manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpRun {
    pub id: RunId,
    pub mode: PumpMode,
    pub time_remaining_seconds: u32,
    pub total_duration_seconds: u32,
    pub started_at: jiff::Timestamp,
}

impl PumpRun {
    pub fn elapsed_seconds(&self) -> u32 {
        self.total_duration_seconds
            .saturating_sub(self.time_remaining_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PumpStatus {
    Idle,
    Running(PumpRun),
}

impl PumpStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, PumpStatus::Running(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Watered,
    Skipped,
    Manual,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Watered => "watered",
            ActivityAction::Skipped => "skipped",
            ActivityAction::Manual => "manual",
        }
    }
}

/// An activity event that has not been appended to a log yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub action: ActivityAction,
    pub duration_seconds: u32,
    pub reason: BoxStr,
    pub moisture_level_at_event: f64,
    pub weather_condition_at_event: Option<WeatherCondition>,
}

impl ActivityRecord {
    pub fn stamp(self, id: ActivityId, timestamp: jiff::Timestamp) -> ActivityEntry {
        ActivityEntry {
            id,
            timestamp,
            action: self.action,
            duration_seconds: self.duration_seconds,
            reason: self.reason,
            moisture_level_at_event: self.moisture_level_at_event,
            weather_condition_at_event: self.weather_condition_at_event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: ActivityId,
    pub timestamp: jiff::Timestamp,
    pub action: ActivityAction,
    pub duration_seconds: u32,
    pub reason: BoxStr,
    pub moisture_level_at_event: f64,
    pub weather_condition_at_event: Option<WeatherCondition>,
}

/// User preferences consumed read-only by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub default_region: RegionId,
    /// Soil moisture percentage below which the field needs water, 30-80.
    pub moisture_threshold: u8,
    pub notifications: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            default_region: RegionId::new("nagpur"),
            moisture_threshold: 60,
            notifications: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_ids_are_case_insensitive() {
        assert_eq!(RegionId::new("  Nagpur "), RegionId::new("nagpur"));
    }

    #[test]
    fn countdown_rounds_to_whole_seconds() {
        let rec = WateringRecommendation {
            base_duration_seconds: 10,
            adjusted_duration_seconds: 9.1,
            tier: Tier::Moderate,
            rationale: "moderate".into(),
        };
        assert_eq!(rec.countdown_seconds(), 9);

        let rec = WateringRecommendation {
            adjusted_duration_seconds: 19.5,
            ..rec
        };
        assert_eq!(rec.countdown_seconds(), 20);
    }

    #[test]
    fn pump_status_is_tagged_by_state() {
        let json = serde_json::to_value(PumpStatus::Idle).unwrap();
        assert_eq!(json["state"], "idle");

        let run = PumpRun {
            id: RunId(Ulid::new()),
            mode: PumpMode::Manual,
            time_remaining_seconds: 4,
            total_duration_seconds: 10,
            started_at: jiff::Timestamp::now(),
        };
        let json = serde_json::to_value(PumpStatus::Running(run)).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["mode"], "manual");
        assert_eq!(run.elapsed_seconds(), 6);
    }
}
