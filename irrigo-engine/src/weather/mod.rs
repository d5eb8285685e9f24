//! Weather lookups per region with timeout and fallback handling.

mod openweather;
mod simulated;

pub use openweather::{OPENWEATHER_BASE_URL, OpenWeatherSource, condition_from_main};
pub use simulated::SimulatedWeatherSource;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use irrigo_core::{Region, RegionId, WeatherSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::catalog::SoilCatalog;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("{0}")]
    UnknownRegion(String),
    #[error("weather upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("weather request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed weather response: {0}")]
    Decode(String),
    #[error("weather task failed: {0}")]
    Task(String),
}

impl WeatherError {
    /// Failures caused by the upstream provider rather than the caller.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, WeatherError::UnknownRegion(_))
    }
}

/// A provider of current weather for a region.
#[async_trait]
pub trait WeatherSource: Send + Sync + 'static {
    async fn fetch(&self, region: &Region) -> Result<WeatherSnapshot, WeatherError>;
}

/// What the gateway serves when the upstream fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// The last live snapshot while it is younger than the max age, then
    /// simulated data.
    #[default]
    LastKnownGood,
    Simulated,
    /// Surface the upstream error.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Live,
    LastKnownGood,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    #[serde(flatten)]
    pub snapshot: WeatherSnapshot,
    pub provenance: Provenance,
}

pub struct WeatherGateway {
    source: Arc<dyn WeatherSource>,
    catalog: Arc<SoilCatalog>,
    fallback: FallbackPolicy,
    timeout: Duration,
    max_age: Duration,
    simulator: SimulatedWeatherSource,
    last_good: RwLock<HashMap<RegionId, WeatherSnapshot>>,
}

impl WeatherGateway {
    pub fn new(source: Arc<dyn WeatherSource>, catalog: Arc<SoilCatalog>) -> Self {
        Self {
            source,
            catalog,
            fallback: FallbackPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            max_age: DEFAULT_MAX_AGE,
            simulator: SimulatedWeatherSource::new(),
            last_good: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_simulator(mut self, simulator: SimulatedWeatherSource) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn catalog(&self) -> &SoilCatalog {
        &self.catalog
    }

    /// Current weather for `region`, matched case-insensitively.
    pub async fn fetch(&self, region: &str) -> Result<WeatherReport, WeatherError> {
        let region = self
            .catalog
            .region(region)
            .map_err(|_| WeatherError::UnknownRegion(self.catalog.invalid_region_message()))?
            .clone();

        let result = match tokio::time::timeout(self.timeout, self.source.fetch(&region)).await {
            Ok(result) => result,
            Err(_) => Err(WeatherError::Timeout(self.timeout)),
        };

        match result {
            Ok(snapshot) => {
                self.last_good
                    .write()
                    .await
                    .insert(region.id.clone(), snapshot.clone());
                Ok(WeatherReport {
                    snapshot,
                    provenance: Provenance::Live,
                })
            }
            Err(e) if e.is_upstream() => self.fall_back(&region, e).await,
            Err(e) => Err(e),
        }
    }

    /// Current weather for every catalog region, in catalog order. Regions
    /// are fetched concurrently.
    pub async fn fetch_all(self: &Arc<Self>) -> Result<Vec<WeatherReport>, WeatherError> {
        let ids: Vec<RegionId> = self.catalog.regions().map(|r| r.id.clone()).collect();

        let mut tasks = JoinSet::new();
        for (index, id) in ids.into_iter().enumerate() {
            let gateway = Arc::clone(self);
            tasks.spawn(async move { (index, gateway.fetch(id.as_str()).await) });
        }

        let mut reports: Vec<Option<WeatherReport>> = vec![None; tasks.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| WeatherError::Task(e.to_string()))?;
            reports[index] = Some(result?);
        }

        Ok(reports.into_iter().flatten().collect())
    }

    async fn fall_back(
        &self,
        region: &Region,
        error: WeatherError,
    ) -> Result<WeatherReport, WeatherError> {
        match self.fallback {
            FallbackPolicy::None => {
                tracing::warn!(region = %region.id, error = %error, "weather fetch failed");
                Err(error)
            }
            FallbackPolicy::LastKnownGood => {
                let cached = self.last_good.read().await.get(&region.id).cloned();
                if let Some(snapshot) = cached
                    && self.is_fresh(&snapshot)
                {
                    tracing::warn!(
                        region = %region.id,
                        error = %error,
                        "weather fetch failed, serving last known good snapshot"
                    );
                    return Ok(WeatherReport {
                        snapshot,
                        provenance: Provenance::LastKnownGood,
                    });
                }
                self.simulated(region, error).await
            }
            FallbackPolicy::Simulated => self.simulated(region, error).await,
        }
    }

    async fn simulated(
        &self,
        region: &Region,
        error: WeatherError,
    ) -> Result<WeatherReport, WeatherError> {
        tracing::warn!(
            region = %region.id,
            error = %error,
            "weather fetch failed, serving simulated snapshot"
        );
        let snapshot = self.simulator.fetch(region).await?;
        Ok(WeatherReport {
            snapshot,
            provenance: Provenance::Simulated,
        })
    }

    fn is_fresh(&self, snapshot: &WeatherSnapshot) -> bool {
        let age = snapshot.age(jiff::Timestamp::now());
        match u64::try_from(age.as_secs()) {
            Ok(secs) => secs <= self.max_age.as_secs(),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use irrigo_core::WeatherCondition;

    use super::*;

    /// Upstream double that can be switched between answering and failing.
    struct Flaky {
        up: AtomicBool,
    }

    #[async_trait]
    impl WeatherSource for Flaky {
        async fn fetch(&self, region: &Region) -> Result<WeatherSnapshot, WeatherError> {
            if !self.up.load(Ordering::SeqCst) {
                return Err(WeatherError::UpstreamUnavailable("connection refused".into()));
            }
            Ok(WeatherSnapshot {
                temperature: 31.0,
                humidity: 55.0,
                condition: WeatherCondition::Cloudy,
                rain_forecast: false,
                description: "broken clouds".into(),
                city: region.name.clone(),
                region: region.id.clone(),
                fetched_at: jiff::Timestamp::now(),
            })
        }
    }

    struct Stalled;

    #[async_trait]
    impl WeatherSource for Stalled {
        async fn fetch(&self, _region: &Region) -> Result<WeatherSnapshot, WeatherError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(WeatherError::UpstreamUnavailable("unreachable".into()))
        }
    }

    fn gateway(up: bool) -> (Arc<Flaky>, WeatherGateway) {
        let source = Arc::new(Flaky {
            up: AtomicBool::new(up),
        });
        let gateway = WeatherGateway::new(source.clone(), Arc::new(SoilCatalog::builtin()))
            .with_simulator(SimulatedWeatherSource::with_seed(3));
        (source, gateway)
    }

    #[tokio::test]
    async fn live_snapshot_is_served_case_insensitively() {
        let (_, gateway) = gateway(true);
        let report = gateway.fetch("NaGpUr").await.unwrap();
        assert_eq!(report.provenance, Provenance::Live);
        assert_eq!(report.snapshot.region.as_str(), "nagpur");
        assert_eq!(&*report.snapshot.city, "Nagpur");
    }

    #[tokio::test]
    async fn unknown_region_lists_valid_ones() {
        let (_, gateway) = gateway(true);
        let err = gateway.fetch("pune").await.unwrap_err();
        assert!(matches!(err, WeatherError::UnknownRegion(_)));
        assert_eq!(
            err.to_string(),
            "Invalid region. Please use: nagpur, amravati, or yavatmal"
        );
    }

    #[tokio::test]
    async fn last_known_good_is_served_after_outage() {
        let (source, gateway) = gateway(true);
        let live = gateway.fetch("amravati").await.unwrap();

        source.up.store(false, Ordering::SeqCst);
        let cached = gateway.fetch("amravati").await.unwrap();
        assert_eq!(cached.provenance, Provenance::LastKnownGood);
        assert_eq!(cached.snapshot, live.snapshot);

        let never_seen = gateway.fetch("yavatmal").await.unwrap();
        assert_eq!(never_seen.provenance, Provenance::Simulated);
    }

    #[tokio::test]
    async fn stale_snapshot_falls_through_to_simulated() {
        let (source, gateway) = gateway(true);
        let gateway = gateway.with_max_age(Duration::ZERO);
        gateway.fetch("nagpur").await.unwrap();

        source.up.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let report = gateway.fetch("nagpur").await.unwrap();
        assert_eq!(report.provenance, Provenance::Simulated);
    }

    #[tokio::test]
    async fn no_fallback_surfaces_upstream_error() {
        let (_, gateway) = gateway(false);
        let gateway = gateway.with_fallback(FallbackPolicy::None);
        let err = gateway.fetch("nagpur").await.unwrap_err();
        assert!(matches!(err, WeatherError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let gateway = WeatherGateway::new(Arc::new(Stalled), Arc::new(SoilCatalog::builtin()))
            .with_fallback(FallbackPolicy::None)
            .with_timeout(Duration::from_millis(50));
        let err = gateway.fetch("nagpur").await.unwrap_err();
        assert!(matches!(err, WeatherError::Timeout(_)));
    }

    #[tokio::test]
    async fn fetch_all_covers_every_region() {
        let (_, gateway) = gateway(true);
        let reports = Arc::new(gateway).fetch_all().await.unwrap();
        let regions: Vec<&str> = reports.iter().map(|r| r.snapshot.region.as_str()).collect();
        assert_eq!(regions, ["nagpur", "amravati", "yavatmal"]);
    }

    #[tokio::test]
    async fn fetch_all_waits_for_one_timeout_not_one_per_region() {
        let timeout = Duration::from_millis(300);
        let gateway = WeatherGateway::new(Arc::new(Stalled), Arc::new(SoilCatalog::builtin()))
            .with_fallback(FallbackPolicy::Simulated)
            .with_simulator(SimulatedWeatherSource::with_seed(5))
            .with_timeout(timeout);

        let started = tokio::time::Instant::now();
        let reports = Arc::new(gateway).fetch_all().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.provenance == Provenance::Simulated));
        assert!(elapsed < timeout * 2, "took {elapsed:?}");
    }
}
