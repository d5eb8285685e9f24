use std::sync::Arc;
use std::time::Duration;

use irrigo_core::{Profile, PumpStatus};
use irrigo_engine::Irrigation;
use irrigo_engine::activity::memory::MemoryActivityLog;
use irrigo_engine::catalog::SoilCatalog;
use irrigo_engine::pump::StartOutcome;
use irrigo_engine::runtime::{Field, Runtime, Schedule};
use irrigo_engine::sensor::SimulatedSensor;
use irrigo_engine::tank::{SimulatedTankGauge, TankThresholds};
use irrigo_engine::weather::{SimulatedWeatherSource, WeatherGateway};
use tokio_util::sync::CancellationToken;

fn runtime(schedule: Schedule) -> Runtime<MemoryActivityLog> {
    let engine = Irrigation::new(
        MemoryActivityLog::new(),
        Profile::default(),
        TankThresholds::default(),
    )
    .unwrap();
    let gateway = WeatherGateway::new(
        Arc::new(SimulatedWeatherSource::with_seed(21)),
        Arc::new(SoilCatalog::builtin()),
    );
    Runtime::new(engine, Arc::new(gateway), Field::default(), schedule)
}

#[tokio::test]
async fn refresh_stores_weather_and_recommendation() {
    let runtime = runtime(Schedule::default());
    let recommendation = runtime.refresh_weather().await.unwrap();

    let status = runtime.engine().status().await;
    assert_eq!(status.recommendation, Some(recommendation));
    let weather = status.weather.unwrap();
    assert_eq!(weather.region.as_str(), "nagpur");
}

#[tokio::test]
async fn disabled_auto_mode_never_starts() {
    let runtime = runtime(Schedule {
        auto_enabled: false,
        ..Schedule::default()
    });
    runtime.refresh_weather().await.unwrap();
    assert!(runtime.evaluate_once().await.unwrap().is_none());
}

#[tokio::test]
async fn cooldown_defers_next_auto_run() {
    let runtime = runtime(Schedule::default());
    let engine = runtime.engine();
    engine.observe_tank(60.0).await.unwrap();
    runtime.refresh_weather().await.unwrap();

    let StartOutcome::Started(run) = engine.start_manual(1).await.unwrap() else {
        panic!("manual start was skipped");
    };
    engine.tick(run.id).await.unwrap();
    assert_eq!(engine.status().await.pump, PumpStatus::Idle);

    assert!(runtime.evaluate_once().await.unwrap().is_none());
}

#[tokio::test]
async fn running_pump_defers_auto_evaluation() {
    let runtime = runtime(Schedule::default());
    let engine = runtime.engine();
    engine.observe_tank(60.0).await.unwrap();
    runtime.refresh_weather().await.unwrap();

    let StartOutcome::Started(run) = engine.start_manual(30).await.unwrap() else {
        panic!("manual start was skipped");
    };

    assert!(runtime.evaluate_once().await.unwrap().is_none());
    assert_eq!(engine.status().await.pump, PumpStatus::Running(run));
    assert!(engine.recent_activity(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn spawned_tasks_feed_the_engine_and_stop_on_cancel() {
    let runtime = runtime(Schedule {
        sensor_interval_secs: 1,
        tank_interval_secs: 1,
        auto_enabled: false,
        ..Schedule::default()
    });
    let engine = runtime.engine().clone();
    let before = engine.latest_reading().await;

    let cancel = CancellationToken::new();
    let handles = runtime.spawn(
        SimulatedSensor::with_seed(4),
        SimulatedTankGauge::with_seed(70.0, 4),
        cancel.clone(),
    );
    assert_eq!(handles.len(), 3);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let status = engine.status().await;
    assert!(status.weather.is_some());
    assert!(status.tank.level_percent > 60.0);
    assert_ne!(engine.latest_reading().await.timestamp, before.timestamp);

    cancel.cancel();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
