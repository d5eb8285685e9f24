//! Pump run/idle state machine.
//!
//! ```text
//! Idle ──start_manual / auto_evaluate──▶ Running ──tick (remaining ≤ 1)──▶ Idle
//!  ▲                                       │
//!  └──────────────stop_manual──────────────┘
//! ```
//!
//! The controller never appends to the activity log itself. Every terminal
//! transition and every skipped start hands exactly one [`ActivityRecord`]
//! back to the caller.

use std::fmt;

use irrigo_core::{
    ActivityAction, ActivityRecord, PumpMode, PumpRun, PumpStatus, RunId, SensorReading,
    TankState, WateringRecommendation, WeatherCondition,
};
use thiserror::Error;
use ulid::Ulid;

use crate::sensor::needs_watering;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PumpError {
    #[error("pump is already running")]
    AlreadyRunning,
    #[error("tank is empty: refusing to start the pump")]
    TankEmpty,
    #[error("pump is not running")]
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    TankEmpty,
    RainExpected,
    ZeroDuration,
    MoistureAdequate,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::TankEmpty => "tank empty",
            SkipReason::RainExpected => "rain expected",
            SkipReason::ZeroDuration => "zero watering duration",
            SkipReason::MoistureAdequate => "moisture adequate",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field conditions copied into activity records at the moment of a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldConditions {
    pub moisture_level: f64,
    pub weather: Option<WeatherCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome<R = ActivityRecord> {
    Started(PumpRun),
    Skipped { reason: SkipReason, record: R },
}

impl<R> StartOutcome<R> {
    pub fn map_record<T>(self, f: impl FnOnce(R) -> T) -> StartOutcome<T> {
        match self {
            StartOutcome::Started(run) => StartOutcome::Started(run),
            StartOutcome::Skipped { reason, record } => StartOutcome::Skipped {
                reason,
                record: f(record),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome<R = ActivityRecord> {
    /// The tick did not belong to the active run, or the pump is idle.
    Ignored,
    Counting(PumpRun),
    Finished { run: PumpRun, record: R },
}

impl<R> TickOutcome<R> {
    pub fn map_record<T>(self, f: impl FnOnce(R) -> T) -> TickOutcome<T> {
        match self {
            TickOutcome::Ignored => TickOutcome::Ignored,
            TickOutcome::Counting(run) => TickOutcome::Counting(run),
            TickOutcome::Finished { run, record } => TickOutcome::Finished {
                run,
                record: f(record),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stopped<R = ActivityRecord> {
    pub run: PumpRun,
    pub record: R,
}

#[derive(Debug, Clone)]
pub struct PumpController {
    status: PumpStatus,
}

impl PumpController {
    pub fn new() -> Self {
        Self {
            status: PumpStatus::Idle,
        }
    }

    pub fn status(&self) -> PumpStatus {
        self.status
    }

    pub fn active_run(&self) -> Option<&PumpRun> {
        match &self.status {
            PumpStatus::Running(run) => Some(run),
            PumpStatus::Idle => None,
        }
    }

    /// User-initiated start. Only an empty tank can refuse it.
    pub fn start_manual(
        &mut self,
        duration_seconds: u32,
        tank: &TankState,
        conditions: FieldConditions,
    ) -> Result<StartOutcome, PumpError> {
        self.ensure_idle()?;
        if tank.is_empty() {
            return Err(PumpError::TankEmpty);
        }
        if duration_seconds == 0 {
            return Ok(skipped(
                SkipReason::ZeroDuration,
                "manual start requested with zero duration".into(),
                conditions,
            ));
        }

        Ok(StartOutcome::Started(self.begin(PumpMode::Manual, duration_seconds)))
    }

    /// Engine-initiated start, gated on tank, recommendation and soil moisture
    /// in that order.
    pub fn auto_evaluate(
        &mut self,
        recommendation: &WateringRecommendation,
        reading: &SensorReading,
        tank: &TankState,
        moisture_threshold: f64,
        weather: Option<WeatherCondition>,
    ) -> Result<StartOutcome, PumpError> {
        self.ensure_idle()?;

        let conditions = FieldConditions {
            moisture_level: reading.moisture_level,
            weather,
        };

        if tank.is_empty() {
            return Ok(skipped(
                SkipReason::TankEmpty,
                format!("tank empty at {:.0}%", tank.level_percent),
                conditions,
            ));
        }

        if recommendation.is_skip() {
            let reason = if recommendation.adjusted_duration_seconds <= 0.0 {
                SkipReason::ZeroDuration
            } else {
                SkipReason::RainExpected
            };
            return Ok(skipped(reason, reason.as_str().into(), conditions));
        }

        if !needs_watering(reading, moisture_threshold) {
            return Ok(skipped(
                SkipReason::MoistureAdequate,
                format!(
                    "moisture adequate: {:.1}% at or above {:.0}% threshold",
                    reading.moisture_level, moisture_threshold
                ),
                conditions,
            ));
        }

        let duration = recommendation.countdown_seconds();
        if duration == 0 {
            return Ok(skipped(
                SkipReason::ZeroDuration,
                SkipReason::ZeroDuration.as_str().into(),
                conditions,
            ));
        }

        Ok(StartOutcome::Started(self.begin(PumpMode::Auto, duration)))
    }

    /// One-second countdown step for the run identified by `run_id`.
    pub fn tick(&mut self, run_id: RunId, conditions: FieldConditions) -> TickOutcome {
        let PumpStatus::Running(run) = &mut self.status else {
            return TickOutcome::Ignored;
        };
        if run.id != run_id {
            return TickOutcome::Ignored;
        }

        if run.time_remaining_seconds > 1 {
            run.time_remaining_seconds -= 1;
            return TickOutcome::Counting(*run);
        }

        let mut finished = *run;
        finished.time_remaining_seconds = 0;
        self.status = PumpStatus::Idle;

        let record = ActivityRecord {
            action: ActivityAction::Watered,
            duration_seconds: finished.total_duration_seconds,
            reason: format!(
                "{} watering completed after {}s",
                finished.mode, finished.total_duration_seconds
            )
            .into_boxed_str(),
            moisture_level_at_event: conditions.moisture_level,
            weather_condition_at_event: conditions.weather,
        };

        TickOutcome::Finished {
            run: finished,
            record,
        }
    }

    /// Stops the active run immediately, recording the elapsed time.
    pub fn stop_manual(&mut self, conditions: FieldConditions) -> Result<Stopped, PumpError> {
        let PumpStatus::Running(run) = self.status else {
            return Err(PumpError::NotRunning);
        };
        self.status = PumpStatus::Idle;

        let elapsed = run.elapsed_seconds();
        let record = ActivityRecord {
            action: ActivityAction::Manual,
            duration_seconds: elapsed,
            reason: format!(
                "stopped manually after {elapsed}s of {}s ({} run)",
                run.total_duration_seconds, run.mode
            )
            .into_boxed_str(),
            moisture_level_at_event: conditions.moisture_level,
            weather_condition_at_event: conditions.weather,
        };

        Ok(Stopped { run, record })
    }

    fn ensure_idle(&self) -> Result<(), PumpError> {
        match self.status {
            PumpStatus::Idle => Ok(()),
            PumpStatus::Running(_) => Err(PumpError::AlreadyRunning),
        }
    }

    fn begin(&mut self, mode: PumpMode, duration_seconds: u32) -> PumpRun {
        let run = PumpRun {
            id: RunId(Ulid::new()),
            mode,
            time_remaining_seconds: duration_seconds,
            total_duration_seconds: duration_seconds,
            started_at: jiff::Timestamp::now(),
        };
        self.status = PumpStatus::Running(run);
        run
    }
}

impl Default for PumpController {
    fn default() -> Self {
        Self::new()
    }
}

fn skipped(reason: SkipReason, text: String, conditions: FieldConditions) -> StartOutcome {
    StartOutcome::Skipped {
        reason,
        record: ActivityRecord {
            action: ActivityAction::Skipped,
            duration_seconds: 0,
            reason: text.into_boxed_str(),
            moisture_level_at_event: conditions.moisture_level,
            weather_condition_at_event: conditions.weather,
        },
    }
}
