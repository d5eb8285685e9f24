use async_trait::async_trait;
use irrigo_core::SensorReading;
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;

pub const MOISTURE_RANGE: (f64, f64) = (0.0, 100.0);
pub const TEMPERATURE_RANGE: (f64, f64) = (20.0, 40.0);

/// Largest moisture change per tick, in either direction.
pub const MOISTURE_STEP: f64 = 2.5;
/// Largest temperature change per tick, in either direction.
pub const TEMPERATURE_STEP: f64 = 1.0;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    Read(String),
}

/// Produces the next soil reading from the previous one.
///
/// Any implementation must keep moisture within 0-100 and temperature within
/// 20-40 so that threshold logic downstream behaves the same for the
/// simulator, test doubles and a hardware reader.
#[async_trait]
pub trait SensorSource: Send + 'static {
    async fn tick(&mut self, previous: &SensorReading) -> Result<SensorReading, SensorError>;
}

/// Random-walk stand-in for a capacitive soil probe.
pub struct SimulatedSensor {
    rng: StdRng,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorSource for SimulatedSensor {
    async fn tick(&mut self, previous: &SensorReading) -> Result<SensorReading, SensorError> {
        let moisture_delta = self.rng.random_range(-MOISTURE_STEP..=MOISTURE_STEP);
        let temperature_delta = self.rng.random_range(-TEMPERATURE_STEP..=TEMPERATURE_STEP);
        Ok(walk(
            previous,
            moisture_delta,
            temperature_delta,
            jiff::Timestamp::now(),
        ))
    }
}

/// Applies one clamped step of the walk.
pub fn walk(
    previous: &SensorReading,
    moisture_delta: f64,
    temperature_delta: f64,
    timestamp: jiff::Timestamp,
) -> SensorReading {
    SensorReading {
        moisture_level: (previous.moisture_level + moisture_delta)
            .clamp(MOISTURE_RANGE.0, MOISTURE_RANGE.1),
        temperature: (previous.temperature + temperature_delta)
            .clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1),
        timestamp,
    }
}

/// Reading the field starts from before the first tick.
pub fn initial_reading() -> SensorReading {
    SensorReading {
        moisture_level: 45.0,
        temperature: 28.0,
        timestamp: jiff::Timestamp::now(),
    }
}

pub fn needs_watering(reading: &SensorReading, threshold: f64) -> bool {
    reading.moisture_level < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(moisture_level: f64, temperature: f64) -> SensorReading {
        SensorReading {
            moisture_level,
            temperature,
            timestamp: jiff::Timestamp::now(),
        }
    }

    #[test]
    fn walk_clamps_to_bounds() {
        let now = jiff::Timestamp::now();

        let low = walk(&reading(1.0, 20.5), -2.5, -1.0, now);
        assert_eq!(low.moisture_level, 0.0);
        assert_eq!(low.temperature, 20.0);

        let high = walk(&reading(99.0, 39.5), 2.5, 1.0, now);
        assert_eq!(high.moisture_level, 100.0);
        assert_eq!(high.temperature, 40.0);

        let mid = walk(&reading(50.0, 30.0), 1.5, -0.5, now);
        assert_eq!(mid.moisture_level, 51.5);
        assert_eq!(mid.temperature, 29.5);
        assert_eq!(mid.timestamp, now);
    }

    #[tokio::test]
    async fn simulated_sensor_steps_are_bounded() {
        let mut sensor = SimulatedSensor::with_seed(42);
        let mut previous = initial_reading();

        for _ in 0..1000 {
            let next = sensor.tick(&previous).await.unwrap();
            assert!((next.moisture_level - previous.moisture_level).abs() <= MOISTURE_STEP + 1e-9);
            assert!((next.temperature - previous.temperature).abs() <= TEMPERATURE_STEP + 1e-9);
            assert!((0.0..=100.0).contains(&next.moisture_level));
            assert!((20.0..=40.0).contains(&next.temperature));
            previous = next;
        }
    }

    #[tokio::test]
    async fn seeded_sensors_are_reproducible() {
        let start = initial_reading();
        let mut a = SimulatedSensor::with_seed(9);
        let mut b = SimulatedSensor::with_seed(9);

        let ra = a.tick(&start).await.unwrap();
        let rb = b.tick(&start).await.unwrap();
        assert_eq!(ra.moisture_level, rb.moisture_level);
        assert_eq!(ra.temperature, rb.temperature);
    }

    #[test]
    fn needs_watering_is_strictly_below_threshold() {
        assert!(needs_watering(&reading(59.9, 25.0), 60.0));
        assert!(!needs_watering(&reading(60.0, 25.0), 60.0));
        assert!(!needs_watering(&reading(75.0, 25.0), 60.0));
    }
}
