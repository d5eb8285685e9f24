use std::sync::Mutex;

use async_trait::async_trait;
use irrigo_core::{Region, WeatherCondition, WeatherSnapshot};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{WeatherError, WeatherSource};

/// Randomized weather used when no live provider is configured or as a
/// fallback when the provider is down.
pub struct SimulatedWeatherSource {
    rng: Mutex<StdRng>,
}

impl SimulatedWeatherSource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for SimulatedWeatherSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WeatherSource for SimulatedWeatherSource {
    async fn fetch(&self, region: &Region) -> Result<WeatherSnapshot, WeatherError> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(simulate(region, &mut *rng, jiff::Timestamp::now()))
    }
}

/// Temperature 25-39°C, humidity 50-79%, rain forecast exactly when rainy.
pub fn simulate(region: &Region, rng: &mut impl Rng, now: jiff::Timestamp) -> WeatherSnapshot {
    let condition = match rng.random_range(0..3) {
        0 => WeatherCondition::Sunny,
        1 => WeatherCondition::Cloudy,
        _ => WeatherCondition::Rainy,
    };
    let rain_forecast = condition == WeatherCondition::Rainy;

    WeatherSnapshot {
        temperature: f64::from(rng.random_range(25u8..40)),
        humidity: f64::from(rng.random_range(50u8..80)),
        condition,
        rain_forecast,
        description: if rain_forecast {
            "Light rain expected".into()
        } else {
            "Clear skies".into()
        },
        city: capitalize(region.id.as_str()).into_boxed_str(),
        region: region.id.clone(),
        fetched_at: now,
    }
}

fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use irrigo_core::{GeoPoint, RegionId};

    use super::*;

    fn yavatmal() -> Region {
        Region {
            id: RegionId::new("yavatmal"),
            name: "Yavatmal".into(),
            location: GeoPoint {
                lat: 20.3888,
                lon: 78.1204,
            },
        }
    }

    #[test]
    fn simulated_snapshots_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(11);
        let region = yavatmal();
        for _ in 0..500 {
            let s = simulate(&region, &mut rng, jiff::Timestamp::now());
            assert!((25.0..40.0).contains(&s.temperature));
            assert!((50.0..80.0).contains(&s.humidity));
            assert_eq!(s.rain_forecast, s.condition == WeatherCondition::Rainy);
            assert_ne!(s.condition, WeatherCondition::Other);
            assert_eq!(&*s.city, "Yavatmal");
        }
    }

    #[test]
    fn description_follows_rain() {
        let mut rng = StdRng::seed_from_u64(5);
        let region = yavatmal();
        for _ in 0..50 {
            let s = simulate(&region, &mut rng, jiff::Timestamp::now());
            let expected = if s.rain_forecast {
                "Light rain expected"
            } else {
                "Clear skies"
            };
            assert_eq!(&*s.description, expected);
        }
    }
}
