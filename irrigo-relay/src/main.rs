use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use irrigo_engine::Irrigation;
use irrigo_engine::activity::ActivityLog;
use irrigo_engine::activity::memory::MemoryActivityLog;
use irrigo_engine::activity::sqlite::SqliteActivityLog;
use irrigo_engine::runtime::Runtime;
use irrigo_engine::sensor::SimulatedSensor;
use irrigo_engine::tank::SimulatedTankGauge;
use irrigo_engine::weather::WeatherGateway;
use irrigo_relay::api::{ApiState, api_router};
use irrigo_relay::config::{ActivityConfig, Config};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "irrigo-relay")]
#[command(about = "Irrigation controller with weather relay")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "irrigo.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };

    let catalog = Arc::new(config.catalog()?);
    let gateway = Arc::new(config.weather.build_gateway(catalog));

    match config.activity.clone() {
        ActivityConfig::Memory { capacity } => {
            info!(?capacity, "Using in-memory activity log");
            let log = match capacity {
                Some(capacity) => MemoryActivityLog::with_capacity(capacity),
                None => MemoryActivityLog::new(),
            };
            run_server(log, gateway, config).await?;
        }
        ActivityConfig::Sqlite { path } => {
            info!(path = ?path, "Using SQLite activity log");
            let log = SqliteActivityLog::new(&path).await?;
            run_server(log, gateway, config).await?;
        }
    }

    Ok(())
}

async fn run_server<L>(
    log: L,
    gateway: Arc<WeatherGateway>,
    config: Config,
) -> color_eyre::Result<()>
where
    L: ActivityLog,
{
    let cancel = CancellationToken::new();

    let engine = Irrigation::new(log, config.profile.clone().into(), config.tank.thresholds())?
        .with_countdown(cancel.clone());

    let runtime = Runtime::new(
        engine.clone(),
        Arc::clone(&gateway),
        config.field.clone(),
        config.schedule.clone(),
    );
    let tasks = runtime.spawn(
        SimulatedSensor::new(),
        SimulatedTankGauge::new(config.tank.initial_level)
            .with_refill(config.tank.refill()),
        cancel.clone(),
    );

    let state = ApiState {
        engine,
        gateway,
        field: config.field.clone(),
    };
    let app = api_router(state);

    let http_addr: SocketAddr = config.server.http_addr;
    let listener = TcpListener::bind(http_addr).await?;
    info!(%http_addr, region = %config.field.region, soil = %config.field.soil, "HTTP server listening");

    let cancel_clone = cancel.clone();
    tokio::select! {
        result = axum::serve(listener, app).with_graceful_shutdown(async move {
            cancel_clone.cancelled().await;
        }) => {
            if let Err(e) = result {
                tracing::error!(error = ?e, "HTTP server error");
            }
            info!("HTTP server shut down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}
