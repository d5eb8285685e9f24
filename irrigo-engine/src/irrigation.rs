use std::sync::Arc;
use std::time::Duration;

use irrigo_core::{
    ActivityEntry, ActivityRecord, AlertEvent, Profile, PumpRun, PumpStatus, RunId,
    SensorReading, TankState, WateringRecommendation, WeatherSnapshot,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::activity::ActivityLog;
use crate::pump::{
    FieldConditions, PumpController, PumpError, SkipReason, StartOutcome, Stopped, TickOutcome,
};
use crate::sensor::{initial_reading, needs_watering};
use crate::tank::{TankError, TankMonitor, TankThresholds};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum IrrigationError {
    #[error(transparent)]
    Pump(#[from] PumpError),
    #[error(transparent)]
    Tank(#[from] TankError),
    #[error("activity log error: {0}")]
    Activity(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IrrigationError {
    fn activity<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        IrrigationError::Activity(Box::new(e))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    TankAlert(AlertEvent),
    PumpStarted(PumpRun),
    PumpFinished(PumpRun),
    Activity(ActivityEntry),
}

/// Point-in-time view of the engine, as served to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub pump: PumpStatus,
    pub tank: TankState,
    pub reading: SensorReading,
    pub needs_watering: bool,
    pub moisture_threshold: u8,
    pub weather: Option<WeatherSnapshot>,
    pub recommendation: Option<WateringRecommendation>,
}

struct EngineState {
    pump: PumpController,
    tank: TankMonitor,
    reading: SensorReading,
    weather: Option<WeatherSnapshot>,
    recommendation: Option<WateringRecommendation>,
    last_completed: Option<jiff::Timestamp>,
    last_scheduled_skip: Option<SkipReason>,
}

impl EngineState {
    fn conditions(&self) -> FieldConditions {
        FieldConditions {
            moisture_level: self.reading.moisture_level,
            weather: self.weather.as_ref().map(|w| w.condition),
        }
    }
}

/// Shared handle over the pump, tank, latest reading and weather.
///
/// Every transition runs under one lock, and the activity record it produces
/// is appended before the lock is released.
#[derive(Clone)]
pub struct Irrigation<L> {
    state: Arc<Mutex<EngineState>>,
    log: L,
    profile: Arc<Profile>,
    events: broadcast::Sender<EngineEvent>,
    countdown: Option<CancellationToken>,
}

impl<L: ActivityLog> Irrigation<L> {
    pub fn new(log: L, profile: Profile, thresholds: TankThresholds) -> Result<Self, TankError> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            state: Arc::new(Mutex::new(EngineState {
                pump: PumpController::new(),
                tank: TankMonitor::new(thresholds)?,
                reading: initial_reading(),
                weather: None,
                recommendation: None,
                last_completed: None,
                last_scheduled_skip: None,
            })),
            log,
            profile: Arc::new(profile),
            events,
            countdown: None,
        })
    }

    /// Drive each started run with a one-second ticker until `cancel` fires.
    pub fn with_countdown(mut self, cancel: CancellationToken) -> Self {
        self.countdown = Some(cancel);
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn moisture_threshold(&self) -> f64 {
        f64::from(self.profile.moisture_threshold)
    }

    pub async fn status(&self) -> EngineStatus {
        let state = self.state.lock().await;
        EngineStatus {
            pump: state.pump.status(),
            tank: state.tank.state(),
            reading: state.reading,
            needs_watering: needs_watering(&state.reading, self.moisture_threshold()),
            moisture_threshold: self.profile.moisture_threshold,
            weather: state.weather.clone(),
            recommendation: state.recommendation.clone(),
        }
    }

    pub async fn latest_reading(&self) -> SensorReading {
        self.state.lock().await.reading
    }

    pub async fn record_reading(&self, reading: SensorReading) {
        self.state.lock().await.reading = reading;
    }

    pub async fn update_weather(
        &self,
        snapshot: WeatherSnapshot,
        recommendation: Option<WateringRecommendation>,
    ) {
        let mut state = self.state.lock().await;
        state.weather = Some(snapshot);
        state.recommendation = recommendation;
    }

    pub async fn recommendation(&self) -> Option<WateringRecommendation> {
        self.state.lock().await.recommendation.clone()
    }

    /// When the most recent run finished, by countdown or manual stop.
    pub async fn last_completed(&self) -> Option<jiff::Timestamp> {
        self.state.lock().await.last_completed
    }

    pub async fn observe_tank(
        &self,
        level_percent: f64,
    ) -> Result<Option<AlertEvent>, IrrigationError> {
        let alert = self.state.lock().await.tank.observe(level_percent)?;

        if let Some(alert) = alert {
            warn!(kind = ?alert.kind, level = alert.level_percent, "tank alert");
            if self.profile.notifications {
                self.publish(EngineEvent::TankAlert(alert));
            }
        }

        Ok(alert)
    }

    pub async fn start_manual(
        &self,
        duration_seconds: u32,
    ) -> Result<StartOutcome<ActivityEntry>, IrrigationError> {
        let mut state = self.state.lock().await;
        let tank = state.tank.state();
        let conditions = state.conditions();
        let outcome = state.pump.start_manual(duration_seconds, &tank, conditions)?;
        self.settle_start(&mut state, outcome).await
    }

    /// Evaluates `recommendation` against the latest reading and tank state.
    /// Every skip is logged.
    pub async fn auto_evaluate(
        &self,
        recommendation: &WateringRecommendation,
    ) -> Result<StartOutcome<ActivityEntry>, IrrigationError> {
        let mut state = self.state.lock().await;
        let outcome = self.evaluate(&mut state, recommendation)?;
        self.settle_start(&mut state, outcome).await
    }

    /// Periodic evaluation against the stored recommendation. A skip is only
    /// logged when its reason differs from the previous scheduled skip.
    ///
    /// Returns `None` while no recommendation is known.
    pub async fn auto_evaluate_scheduled(
        &self,
    ) -> Result<Option<StartOutcome<Option<ActivityEntry>>>, IrrigationError> {
        let mut state = self.state.lock().await;
        let Some(recommendation) = state.recommendation.clone() else {
            return Ok(None);
        };

        match self.evaluate(&mut state, &recommendation)? {
            StartOutcome::Skipped { reason, .. } if state.last_scheduled_skip == Some(reason) => {
                Ok(Some(StartOutcome::Skipped {
                    reason,
                    record: None,
                }))
            }
            outcome => {
                state.last_scheduled_skip = match &outcome {
                    StartOutcome::Skipped { reason, .. } => Some(*reason),
                    StartOutcome::Started(_) => None,
                };
                let settled = self.settle_start(&mut state, outcome).await?;
                Ok(Some(settled.map_record(Some)))
            }
        }
    }

    pub async fn tick(&self, run_id: RunId) -> Result<TickOutcome<ActivityEntry>, IrrigationError> {
        let mut state = self.state.lock().await;
        let conditions = state.conditions();

        match state.pump.tick(run_id, conditions) {
            TickOutcome::Ignored => Ok(TickOutcome::Ignored),
            TickOutcome::Counting(run) => Ok(TickOutcome::Counting(run)),
            TickOutcome::Finished { run, record } => {
                state.last_completed = Some(jiff::Timestamp::now());
                info!(run_id = %run.id, duration = run.total_duration_seconds, "pump run finished");
                self.publish(EngineEvent::PumpFinished(run));
                let entry = self.append(record).await?;
                Ok(TickOutcome::Finished { run, record: entry })
            }
        }
    }

    pub async fn stop_manual(&self) -> Result<Stopped<ActivityEntry>, IrrigationError> {
        let mut state = self.state.lock().await;
        let conditions = state.conditions();
        let Stopped { run, record } = state.pump.stop_manual(conditions)?;

        state.last_completed = Some(jiff::Timestamp::now());
        info!(run_id = %run.id, elapsed = record.duration_seconds, "pump stopped manually");
        self.publish(EngineEvent::PumpFinished(run));
        let entry = self.append(record).await?;

        Ok(Stopped { run, record: entry })
    }

    pub async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, L::Error> {
        self.log.recent(limit).await
    }

    fn evaluate(
        &self,
        state: &mut EngineState,
        recommendation: &WateringRecommendation,
    ) -> Result<StartOutcome, PumpError> {
        let tank = state.tank.state();
        let reading = state.reading;
        let weather = state.weather.as_ref().map(|w| w.condition);
        state.pump.auto_evaluate(
            recommendation,
            &reading,
            &tank,
            self.moisture_threshold(),
            weather,
        )
    }

    async fn settle_start(
        &self,
        state: &mut EngineState,
        outcome: StartOutcome,
    ) -> Result<StartOutcome<ActivityEntry>, IrrigationError> {
        match outcome {
            StartOutcome::Started(run) => {
                info!(
                    run_id = %run.id,
                    mode = %run.mode,
                    duration = run.total_duration_seconds,
                    "pump started"
                );
                state.last_scheduled_skip = None;
                self.publish(EngineEvent::PumpStarted(run));
                self.spawn_countdown(run.id);
                Ok(StartOutcome::Started(run))
            }
            StartOutcome::Skipped { reason, record } => {
                info!(reason = %reason, "watering skipped");
                let entry = self.append(record).await?;
                Ok(StartOutcome::Skipped {
                    reason,
                    record: entry,
                })
            }
        }
    }

    async fn append(&self, record: ActivityRecord) -> Result<ActivityEntry, IrrigationError> {
        let entry = self
            .log
            .append(record)
            .await
            .map_err(IrrigationError::activity)?;
        self.publish(EngineEvent::Activity(entry.clone()));
        Ok(entry)
    }

    fn publish(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn spawn_countdown(&self, run_id: RunId) {
        let Some(cancel) = self.countdown.clone() else {
            return;
        };
        let engine = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick of an interval completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => match engine.tick(run_id).await {
                        Ok(TickOutcome::Counting(_)) => {}
                        Ok(_) => break,
                        Err(e) => {
                            error!(run_id = %run_id, error = ?e, "pump countdown failed");
                            break;
                        }
                    }
                }
            }
        });
    }
}
