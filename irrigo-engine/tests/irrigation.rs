use std::time::Duration;

use irrigo_core::{
    ActivityAction, Profile, PumpMode, PumpStatus, RegionId, SensorReading, Tier,
    WateringRecommendation, WeatherCondition, WeatherSnapshot,
};
use irrigo_engine::activity::ActivityLog;
use irrigo_engine::activity::memory::MemoryActivityLog;
use irrigo_engine::pump::{PumpError, SkipReason, StartOutcome, TickOutcome};
use irrigo_engine::tank::TankThresholds;
use irrigo_engine::{EngineEvent, Irrigation, IrrigationError};
use tokio_util::sync::CancellationToken;

fn engine() -> Irrigation<MemoryActivityLog> {
    Irrigation::new(
        MemoryActivityLog::new(),
        Profile::default(),
        TankThresholds::default(),
    )
    .unwrap()
}

fn reading(moisture_level: f64) -> SensorReading {
    SensorReading {
        moisture_level,
        temperature: 28.0,
        timestamp: jiff::Timestamp::now(),
    }
}

fn moderate(adjusted: f64) -> WateringRecommendation {
    WateringRecommendation {
        base_duration_seconds: 10,
        adjusted_duration_seconds: adjusted,
        tier: Tier::Moderate,
        rationale: "moderate watering".into(),
    }
}

async fn ready(engine: &Irrigation<MemoryActivityLog>) {
    engine.observe_tank(60.0).await.unwrap();
    engine.record_reading(reading(40.0)).await;
}

#[tokio::test]
async fn auto_run_completes_and_logs_once() {
    let engine = engine();
    ready(&engine).await;

    let run = match engine.auto_evaluate(&moderate(9.1)).await.unwrap() {
        StartOutcome::Started(run) => run,
        other => panic!("expected a started run, got {other:?}"),
    };
    assert_eq!(run.mode, PumpMode::Auto);
    assert_eq!(run.total_duration_seconds, 9);

    for _ in 1..run.total_duration_seconds {
        assert!(matches!(
            engine.tick(run.id).await.unwrap(),
            TickOutcome::Counting(_)
        ));
    }
    match engine.tick(run.id).await.unwrap() {
        TickOutcome::Finished { record, .. } => {
            assert_eq!(record.action, ActivityAction::Watered);
            assert_eq!(record.duration_seconds, 9);
        }
        other => panic!("expected finish, got {other:?}"),
    }

    assert_eq!(engine.status().await.pump, PumpStatus::Idle);
    assert_eq!(engine.log().count().await.unwrap(), 1);
    assert!(engine.last_completed().await.is_some());
}

#[tokio::test]
async fn manual_stop_logs_elapsed_and_ignores_late_tick() {
    let engine = engine();
    ready(&engine).await;

    let StartOutcome::Started(run) = engine.start_manual(10).await.unwrap() else {
        panic!("manual start was skipped");
    };
    engine.tick(run.id).await.unwrap();
    engine.tick(run.id).await.unwrap();
    engine.tick(run.id).await.unwrap();

    let stopped = engine.stop_manual().await.unwrap();
    assert_eq!(stopped.record.action, ActivityAction::Manual);
    assert_eq!(stopped.record.duration_seconds, 3);

    assert!(matches!(
        engine.tick(run.id).await.unwrap(),
        TickOutcome::Ignored
    ));
    assert_eq!(engine.log().count().await.unwrap(), 1);
}

#[tokio::test]
async fn rejections_are_distinguishable() {
    let engine = engine();
    ready(&engine).await;

    assert!(matches!(
        engine.stop_manual().await,
        Err(IrrigationError::Pump(PumpError::NotRunning))
    ));

    engine.start_manual(10).await.unwrap();
    assert!(matches!(
        engine.start_manual(10).await,
        Err(IrrigationError::Pump(PumpError::AlreadyRunning))
    ));
    engine.stop_manual().await.unwrap();

    engine.observe_tank(15.0).await.unwrap();
    assert!(matches!(
        engine.start_manual(10).await,
        Err(IrrigationError::Pump(PumpError::TankEmpty))
    ));
}

#[tokio::test]
async fn empty_tank_wins_over_rain_skip() {
    let engine = engine();
    engine.record_reading(reading(40.0)).await;
    engine.observe_tank(10.0).await.unwrap();

    let rain = WateringRecommendation {
        adjusted_duration_seconds: 2.1,
        tier: Tier::Skip,
        ..moderate(2.1)
    };
    match engine.auto_evaluate(&rain).await.unwrap() {
        StartOutcome::Skipped { reason, record } => {
            assert_eq!(reason, SkipReason::TankEmpty);
            assert_eq!(record.action, ActivityAction::Skipped);
        }
        other => panic!("expected a skip, got {other:?}"),
    }
}

#[tokio::test]
async fn scheduled_evaluation_logs_repeated_skips_once() {
    let engine = engine();
    engine.observe_tank(60.0).await.unwrap();
    engine.record_reading(reading(75.0)).await;

    assert!(engine.auto_evaluate_scheduled().await.unwrap().is_none());

    let snapshot = WeatherSnapshot {
        temperature: 30.0,
        humidity: 60.0,
        condition: WeatherCondition::Sunny,
        rain_forecast: false,
        description: "Clear skies".into(),
        city: "Nagpur".into(),
        region: RegionId::new("nagpur"),
        fetched_at: jiff::Timestamp::now(),
    };
    engine.update_weather(snapshot, Some(moderate(10.0))).await;

    for _ in 0..3 {
        let outcome = engine.auto_evaluate_scheduled().await.unwrap();
        assert!(matches!(
            outcome,
            Some(StartOutcome::Skipped {
                reason: SkipReason::MoistureAdequate,
                ..
            })
        ));
    }
    assert_eq!(engine.log().count().await.unwrap(), 1);

    engine.record_reading(reading(40.0)).await;
    assert!(matches!(
        engine.auto_evaluate_scheduled().await.unwrap(),
        Some(StartOutcome::Started(_))
    ));
}

#[tokio::test]
async fn tank_alerts_are_broadcast_when_notifications_are_on() {
    let engine = engine();
    let mut events = engine.subscribe();

    engine.observe_tank(18.0).await.unwrap();
    match events.recv().await.unwrap() {
        EngineEvent::TankAlert(alert) => assert_eq!(alert.level_percent, 18.0),
        other => panic!("expected a tank alert, got {other:?}"),
    }

    let quiet = Irrigation::new(
        MemoryActivityLog::new(),
        Profile {
            notifications: false,
            ..Profile::default()
        },
        TankThresholds::default(),
    )
    .unwrap();
    let mut quiet_events = quiet.subscribe();
    let alert = quiet.observe_tank(18.0).await.unwrap();
    assert!(alert.is_some());
    assert!(quiet_events.try_recv().is_err());
}

#[tokio::test]
async fn countdown_task_finishes_short_runs() {
    let cancel = CancellationToken::new();
    let engine = engine().with_countdown(cancel.clone());
    ready(&engine).await;

    let StartOutcome::Started(_) = engine.start_manual(2).await.unwrap() else {
        panic!("manual start was skipped");
    };

    let mut finished = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if !engine.status().await.pump.is_running() {
            finished = true;
            break;
        }
    }
    cancel.cancel();

    assert!(finished, "countdown did not finish the run");
    let recent = engine.recent_activity(5).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].action, ActivityAction::Watered);
    assert_eq!(recent[0].duration_seconds, 2);
}
