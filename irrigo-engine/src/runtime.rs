use std::sync::Arc;
use std::time::Duration;

use irrigo_core::{ActivityEntry, RegionId, SoilId, WateringRecommendation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activity::ActivityLog;
use crate::catalog::CatalogError;
use crate::decision::{self, DecisionError};
use crate::irrigation::{Irrigation, IrrigationError};
use crate::pump::{PumpError, StartOutcome};
use crate::sensor::SensorSource;
use crate::tank::TankGauge;
use crate::weather::{WeatherError, WeatherGateway};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Weather(#[from] WeatherError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    Irrigation(#[from] IrrigationError),
}

/// Periods of the background tasks, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub sensor_interval_secs: u64,
    pub tank_interval_secs: u64,
    pub weather_refresh_secs: u64,
    pub auto_evaluate_secs: u64,
    /// Quiet period after a finished run before auto mode may start another.
    pub cooldown_secs: u64,
    pub auto_enabled: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            sensor_interval_secs: 3,
            tank_interval_secs: 5,
            weather_refresh_secs: 600,
            auto_evaluate_secs: 30,
            cooldown_secs: 300,
            auto_enabled: true,
        }
    }
}

/// The region and soil type the controller is irrigating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub region: RegionId,
    pub soil: SoilId,
}

impl Default for Field {
    fn default() -> Self {
        Self {
            region: RegionId::new("nagpur"),
            soil: SoilId::new("loamy"),
        }
    }
}

/// Periodic driver for one field: sensor, tank, weather and auto mode.
pub struct Runtime<L> {
    engine: Irrigation<L>,
    gateway: Arc<WeatherGateway>,
    field: Field,
    schedule: Schedule,
}

impl<L: ActivityLog> Runtime<L> {
    pub fn new(
        engine: Irrigation<L>,
        gateway: Arc<WeatherGateway>,
        field: Field,
        schedule: Schedule,
    ) -> Self {
        Self {
            engine,
            gateway,
            field,
            schedule,
        }
    }

    pub fn engine(&self) -> &Irrigation<L> {
        &self.engine
    }

    /// Fetches weather for the field and stores it with a fresh recommendation.
    pub async fn refresh_weather(&self) -> Result<WateringRecommendation, RuntimeError> {
        let report = self.gateway.fetch(self.field.region.as_str()).await?;
        let multiplier = self
            .gateway
            .catalog()
            .multiplier(self.field.region.as_str(), self.field.soil.as_str())?;
        let recommendation = decision::recommend(multiplier, &report.snapshot)?;

        info!(
            region = %self.field.region,
            provenance = ?report.provenance,
            tier = ?recommendation.tier,
            duration = recommendation.adjusted_duration_seconds,
            "weather refreshed"
        );
        self.engine
            .update_weather(report.snapshot, Some(recommendation.clone()))
            .await;

        Ok(recommendation)
    }

    /// One scheduled auto-mode evaluation. Returns `None` when auto mode is
    /// disabled, the pump is busy, the cooldown has not elapsed, or no
    /// recommendation is known yet.
    pub async fn evaluate_once(
        &self,
    ) -> Result<Option<StartOutcome<Option<ActivityEntry>>>, IrrigationError> {
        if !self.schedule.auto_enabled {
            return Ok(None);
        }
        if let Some(finished) = self.engine.last_completed().await {
            let since = jiff::Timestamp::now().duration_since(finished);
            let cooldown = i64::try_from(self.schedule.cooldown_secs).unwrap_or(i64::MAX);
            if since.as_secs() < cooldown {
                debug!(since_secs = since.as_secs(), "auto evaluation in cooldown");
                return Ok(None);
            }
        }

        // The idle check happens under the engine lock, so a manual start
        // racing this evaluation surfaces here.
        match self.engine.auto_evaluate_scheduled().await {
            Err(IrrigationError::Pump(PumpError::AlreadyRunning)) => {
                debug!("pump running, auto evaluation deferred");
                Ok(None)
            }
            result => result,
        }
    }

    /// Spawns the periodic tasks. They run until `cancel` fires.
    pub fn spawn<S, G>(self, sensor: S, gauge: G, cancel: CancellationToken) -> Vec<JoinHandle<()>>
    where
        S: SensorSource,
        G: TankGauge,
    {
        let schedule = self.schedule.clone();
        let runtime = Arc::new(self);

        info!(
            sensor_interval_secs = schedule.sensor_interval_secs,
            tank_interval_secs = schedule.tank_interval_secs,
            weather_refresh_secs = schedule.weather_refresh_secs,
            auto_evaluate_secs = schedule.auto_evaluate_secs,
            auto_enabled = schedule.auto_enabled,
            "starting irrigation runtime"
        );

        let mut handles = vec![
            tokio::spawn(sensor_loop(
                runtime.engine.clone(),
                sensor,
                period(schedule.sensor_interval_secs),
                cancel.clone(),
            )),
            tokio::spawn(tank_loop(
                runtime.engine.clone(),
                gauge,
                period(schedule.tank_interval_secs),
                cancel.clone(),
            )),
            tokio::spawn(weather_loop(
                Arc::clone(&runtime),
                period(schedule.weather_refresh_secs),
                cancel.clone(),
            )),
        ];

        if schedule.auto_enabled {
            handles.push(tokio::spawn(auto_loop(
                runtime,
                period(schedule.auto_evaluate_secs),
                cancel,
            )));
        }

        handles
    }
}

fn period(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

async fn sensor_loop<L: ActivityLog, S: SensorSource>(
    engine: Irrigation<L>,
    mut sensor: S,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("sensor task shutting down");
                break;
            }
            _ = interval.tick() => {
                let previous = engine.latest_reading().await;
                match sensor.tick(&previous).await {
                    Ok(reading) => engine.record_reading(reading).await,
                    Err(e) => warn!(error = %e, "soil sensor read failed"),
                }
            }
        }
    }
}

async fn tank_loop<L: ActivityLog, G: TankGauge>(
    engine: Irrigation<L>,
    mut gauge: G,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("tank task shutting down");
                break;
            }
            _ = interval.tick() => {
                let observed = match gauge.read_level().await {
                    Ok(level) => engine.observe_tank(level).await.map(|_| ()),
                    Err(e) => Err(e.into()),
                };
                if let Err(e) = observed {
                    warn!(error = %e, "tank observation failed");
                }
            }
        }
    }
}

async fn weather_loop<L: ActivityLog>(
    runtime: Arc<Runtime<L>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("weather task shutting down");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = runtime.refresh_weather().await {
                    warn!(error = %e, "weather refresh failed");
                }
            }
        }
    }
}

async fn auto_loop<L: ActivityLog>(
    runtime: Arc<Runtime<L>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("auto evaluation task shutting down");
                break;
            }
            _ = interval.tick() => match runtime.evaluate_once().await {
                Ok(Some(StartOutcome::Started(run))) => {
                    debug!(run_id = %run.id, "auto evaluation started the pump");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "auto evaluation failed"),
            }
        }
    }
}
