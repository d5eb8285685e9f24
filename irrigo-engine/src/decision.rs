//! Watering recommendation from a soil multiplier and a weather snapshot.
//!
//! The computation is pure: the same inputs always yield the same
//! recommendation, and nothing outside the returned value is touched.

use irrigo_core::{SoilType, Tier, WateringRecommendation, WeatherSnapshot};
use thiserror::Error;

pub const BASE_DURATION_SECONDS: u32 = 10;

/// Applied when rain is forecast.
pub const RAIN_FACTOR: f64 = 0.3;

/// Applied above [`HEAT_THRESHOLD_CELSIUS`] when no rain is forecast.
pub const HEAT_FACTOR: f64 = 1.3;
pub const HEAT_THRESHOLD_CELSIUS: f64 = 35.0;

pub const LIGHT_MAX_SECONDS: f64 = 5.0;
pub const MODERATE_MAX_SECONDS: f64 = 12.0;

pub const RAIN_RATIONALE: &str = "rain expected: irrigation suppressed to avoid overwatering";
pub const ZERO_DURATION_RATIONALE: &str = "zero watering duration: nothing to irrigate";

#[derive(Debug, Error, PartialEq)]
pub enum DecisionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Recommends a watering duration and tier.
///
/// Rain suppresses watering (tier [`Tier::Skip`]) but the reduced duration is
/// still reported. Otherwise heat above 35°C extends the duration by 30% and
/// the tier follows the duration bands. A duration that rounds to zero is an
/// implicit skip.
pub fn recommend(
    multiplier: f64,
    weather: &WeatherSnapshot,
) -> Result<WateringRecommendation, DecisionError> {
    validate(multiplier, weather)?;

    let mut adjusted = f64::from(BASE_DURATION_SECONDS) * multiplier;

    if weather.rain_forecast {
        adjusted *= RAIN_FACTOR;
        return Ok(recommendation(adjusted, Tier::Skip, RAIN_RATIONALE.into()));
    }

    if weather.temperature > HEAT_THRESHOLD_CELSIUS {
        adjusted *= HEAT_FACTOR;
    }

    if round1(adjusted) <= 0.0 {
        return Ok(recommendation(
            adjusted,
            Tier::Skip,
            ZERO_DURATION_RATIONALE.into(),
        ));
    }

    let (tier, rationale) = if adjusted <= LIGHT_MAX_SECONDS {
        (
            Tier::Light,
            format!("light watering for {adjusted:.1} seconds"),
        )
    } else if adjusted <= MODERATE_MAX_SECONDS {
        (
            Tier::Moderate,
            format!("moderate watering for {adjusted:.1} seconds"),
        )
    } else {
        (
            Tier::Heavy,
            format!("extended watering for {adjusted:.1} seconds due to soil type and weather"),
        )
    };

    Ok(recommendation(adjusted, tier, rationale))
}

/// Like [`recommend`], for callers whose selection may still be incomplete.
pub fn recommend_for(
    soil: Option<&SoilType>,
    weather: Option<&WeatherSnapshot>,
) -> Result<WateringRecommendation, DecisionError> {
    let soil = soil.ok_or_else(|| DecisionError::InvalidInput("no soil type selected".into()))?;
    let weather = weather
        .ok_or_else(|| DecisionError::InvalidInput("no weather snapshot available".into()))?;
    recommend(soil.watering_multiplier.into_inner(), weather)
}

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn recommendation(adjusted: f64, tier: Tier, rationale: String) -> WateringRecommendation {
    WateringRecommendation {
        base_duration_seconds: BASE_DURATION_SECONDS,
        adjusted_duration_seconds: round1(adjusted),
        tier,
        rationale: rationale.into_boxed_str(),
    }
}

fn validate(multiplier: f64, weather: &WeatherSnapshot) -> Result<(), DecisionError> {
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(DecisionError::InvalidInput(format!(
            "watering multiplier must be a non-negative number, got {multiplier}"
        )));
    }
    if !weather.temperature.is_finite() {
        return Err(DecisionError::InvalidInput(format!(
            "weather temperature must be a number, got {}",
            weather.temperature
        )));
    }
    if !(0.0..=100.0).contains(&weather.humidity) {
        return Err(DecisionError::InvalidInput(format!(
            "weather humidity must be within 0-100, got {}",
            weather.humidity
        )));
    }
    Ok(())
}
