use async_trait::async_trait;
use irrigo_core::{AlertEvent, AlertKind, TankBand, TankState};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TankError {
    #[error("tank level {0} is outside 0-100")]
    OutOfRange(f64),
    #[error("empty threshold {empty_at} must be below full threshold {full_at}")]
    InvalidThresholds { empty_at: f64, full_at: f64 },
    #[error("tank gauge unavailable: {0}")]
    Gauge(String),
}

/// Alert bounds, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankThresholds {
    pub empty_at: f64,
    pub full_at: f64,
}

impl TankThresholds {
    pub fn validate(&self) -> Result<(), TankError> {
        let ordered = 0.0 <= self.empty_at && self.empty_at < self.full_at && self.full_at <= 100.0;
        if !ordered {
            return Err(TankError::InvalidThresholds {
                empty_at: self.empty_at,
                full_at: self.full_at,
            });
        }
        Ok(())
    }

    pub fn band(&self, level_percent: f64) -> TankBand {
        if level_percent <= self.empty_at {
            TankBand::Empty
        } else if level_percent >= self.full_at {
            TankBand::Full
        } else {
            TankBand::Normal
        }
    }
}

impl Default for TankThresholds {
    fn default() -> Self {
        Self {
            empty_at: 20.0,
            full_at: 95.0,
        }
    }
}

/// Watches reservoir level readings and emits one alert per excursion into
/// the empty or full band.
#[derive(Debug, Clone)]
pub struct TankMonitor {
    thresholds: TankThresholds,
    state: TankState,
}

impl TankMonitor {
    pub fn new(thresholds: TankThresholds) -> Result<Self, TankError> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            state: TankState {
                level_percent: 0.0,
                last_alert: None,
            },
        })
    }

    pub fn observe(&mut self, level_percent: f64) -> Result<Option<AlertEvent>, TankError> {
        if !(0.0..=100.0).contains(&level_percent) {
            return Err(TankError::OutOfRange(level_percent));
        }

        let entered = match self.thresholds.band(level_percent) {
            TankBand::Empty => Some(AlertKind::Empty),
            TankBand::Full => Some(AlertKind::Full),
            TankBand::Normal => None,
        };

        let previous = self.state.last_alert;
        self.state = TankState {
            level_percent,
            last_alert: entered,
        };

        match entered {
            Some(kind) if previous != Some(kind) => Ok(Some(AlertEvent {
                kind,
                level_percent,
                timestamp: jiff::Timestamp::now(),
            })),
            _ => Ok(None),
        }
    }

    pub fn state(&self) -> TankState {
        self.state
    }

    pub fn thresholds(&self) -> TankThresholds {
        self.thresholds
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

/// Source of reservoir level readings.
#[async_trait]
pub trait TankGauge: Send + 'static {
    async fn read_level(&mut self) -> Result<f64, TankError>;
}

/// Reservoir stand-in: a bounded random walk that drifts slowly downward
/// and is topped up once it falls to the refill mark.
pub struct SimulatedTankGauge {
    level: f64,
    refill: Refill,
    rng: StdRng,
}

/// Level at or below which the simulated reservoir is refilled, and the
/// level it is refilled to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Refill {
    pub at: f64,
    pub to: f64,
}

impl Default for Refill {
    fn default() -> Self {
        Self { at: 15.0, to: 90.0 }
    }
}

impl SimulatedTankGauge {
    pub const STEP: (f64, f64) = (-2.0, 1.0);

    pub fn new(initial_level: f64) -> Self {
        Self::with_rng(initial_level, StdRng::from_os_rng())
    }

    pub fn with_seed(initial_level: f64, seed: u64) -> Self {
        Self::with_rng(initial_level, StdRng::seed_from_u64(seed))
    }

    fn with_rng(initial_level: f64, rng: StdRng) -> Self {
        Self {
            level: initial_level.clamp(0.0, 100.0),
            refill: Refill::default(),
            rng,
        }
    }

    pub fn with_refill(mut self, refill: Refill) -> Self {
        self.refill = refill;
        self
    }
}

#[async_trait]
impl TankGauge for SimulatedTankGauge {
    async fn read_level(&mut self) -> Result<f64, TankError> {
        if self.level <= self.refill.at {
            self.level = self.refill.to.clamp(0.0, 100.0);
            return Ok(self.level);
        }

        let (low, high) = Self::STEP;
        let step = self.rng.random_range(low..=high);
        self.level = (self.level + step).clamp(0.0, 100.0);
        Ok(self.level)
    }
}
