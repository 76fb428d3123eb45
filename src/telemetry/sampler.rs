//! Fixed-rate telemetry sampler
//!
//! While running, every tick composes one sample from the latest sensor
//! readings and pushes it to the backend without waiting for the previous
//! push. Ticks that fire before the first position fix are skipped.

use super::sample::TelemetrySample;
use crate::backend::SourceRegistry;
use crate::sensors::{OrientationFeed, PositionFeed};
use crate::utils::error::UplinkError;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Sampler settings
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Tick period
    pub interval: Duration,

    /// Allow at most one push in flight; ticks that find one running are skipped
    pub serialize_pushes: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            serialize_pushes: false,
        }
    }
}

/// Counters shared with the clock task
#[derive(Debug, Default)]
pub struct SamplerStats {
    pushed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl SamplerStats {
    /// Samples the backend accepted
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Pushes that failed
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Ticks that produced no push
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

struct RunningClock {
    source_id: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic telemetry uploader for one source
pub struct TelemetrySampler {
    registry: Arc<dyn SourceRegistry>,
    position: PositionFeed,
    orientation: OrientationFeed,
    config: SamplerConfig,
    clock: Mutex<Option<RunningClock>>,
    last_sample: Arc<RwLock<Option<TelemetrySample>>>,
    stats: Arc<SamplerStats>,
}

impl TelemetrySampler {
    /// Create a sampler reading from the given feeds
    pub fn new(
        registry: Arc<dyn SourceRegistry>,
        position: PositionFeed,
        orientation: OrientationFeed,
        config: SamplerConfig,
    ) -> Self {
        Self {
            registry,
            position,
            orientation,
            config,
            clock: Mutex::new(None),
            last_sample: Arc::new(RwLock::new(None)),
            stats: Arc::new(SamplerStats::default()),
        }
    }

    /// Whether the clock is running
    pub fn is_running(&self) -> bool {
        self.clock.lock().is_some()
    }

    /// Most recently composed sample
    pub fn last_sample(&self) -> Option<TelemetrySample> {
        self.last_sample.read().clone()
    }

    pub fn stats(&self) -> Arc<SamplerStats> {
        self.stats.clone()
    }

    /// Start ticking for `source_id`. Must be called inside a tokio runtime.
    pub fn start(&self, source_id: &str) {
        let mut clock = self.clock.lock();
        if clock.is_some() {
            tracing::warn!("Telemetry sampler already running, ignoring start");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_clock(
            source_id.to_string(),
            self.registry.clone(),
            self.position.clone(),
            self.orientation.clone(),
            self.config.clone(),
            self.last_sample.clone(),
            self.stats.clone(),
            cancel.clone(),
        ));

        *clock = Some(RunningClock {
            source_id: source_id.to_string(),
            cancel,
            handle,
        });

        tracing::info!(
            "Telemetry sampler started for {} every {:?}",
            source_id,
            self.config.interval
        );
    }

    /// Stop ticking and tell the backend the source is gone.
    ///
    /// Pushes already in flight are left to finish on their own. Returns
    /// false when the sampler was not running, in which case nothing is sent.
    pub async fn stop(&self) -> bool {
        let running = self.clock.lock().take();
        let Some(running) = running else {
            return false;
        };

        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            tracing::warn!("Telemetry clock task ended abnormally: {}", e);
        }

        if let Err(e) = self.registry.disconnect(&running.source_id).await {
            tracing::warn!("Disconnect notification for {} failed: {}", running.source_id, e);
        }

        tracing::info!(
            "Telemetry sampler stopped ({} pushed, {} failed)",
            self.stats.pushed(),
            self.stats.failed()
        );
        true
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_clock(
    source_id: String,
    registry: Arc<dyn SourceRegistry>,
    position: PositionFeed,
    orientation: OrientationFeed,
    config: SamplerConfig,
    last_sample: Arc<RwLock<Option<TelemetrySample>>>,
    stats: Arc<SamplerStats>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let in_flight = Arc::new(AtomicBool::new(false));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(fix) = position.latest() else {
            stats.skipped.fetch_add(1, Ordering::Relaxed);
            continue;
        };

        if config.serialize_pushes && in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("Previous telemetry push still in flight, skipping tick");
            stats.skipped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        let sample = TelemetrySample::compose(&fix, &orientation.latest());
        *last_sample.write() = Some(sample.clone());

        let registry = registry.clone();
        let source_id = source_id.clone();
        let stats = stats.clone();
        let in_flight = in_flight.clone();
        tokio::spawn(async move {
            match registry.update_telemetry(&source_id, &sample).await {
                Ok(()) => {
                    stats.pushed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    let error = UplinkError::TelemetryPush(e.to_string());
                    tracing::warn!("{}", error);
                }
            }
            in_flight.store(false, Ordering::Release);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ApiError, RegistrationRequest, RegistrationResponse};
    use crate::sensors::{OrientationReading, PositionReading};
    use async_trait::async_trait;

    #[derive(Default)]
    struct FakeRegistry {
        samples: Mutex<Vec<TelemetrySample>>,
        disconnects: Mutex<Vec<String>>,
        fail_pushes: bool,
        push_delay: Option<Duration>,
    }

    #[async_trait]
    impl SourceRegistry for FakeRegistry {
        async fn register(
            &self,
            request: &RegistrationRequest,
        ) -> Result<RegistrationResponse, ApiError> {
            Ok(RegistrationResponse {
                success: true,
                source_id: Some(request.source_id.clone()),
                message: None,
            })
        }

        async fn disconnect(&self, source_id: &str) -> Result<(), ApiError> {
            self.disconnects.lock().push(source_id.to_string());
            Ok(())
        }

        async fn update_telemetry(
            &self,
            _source_id: &str,
            sample: &TelemetrySample,
        ) -> Result<(), ApiError> {
            if let Some(delay) = self.push_delay {
                tokio::time::sleep(delay).await;
            }
            self.samples.lock().push(sample.clone());
            if self.fail_pushes {
                return Err(ApiError::Status {
                    status: 503,
                    detail: None,
                });
            }
            Ok(())
        }
    }

    fn fix() -> PositionReading {
        PositionReading {
            latitude: 45.0,
            longitude: 7.6,
            altitude: 240.0,
            heading: Some(90.0),
            course: 90.0,
            speed: 10.0,
        }
    }

    fn sampler(
        registry: Arc<FakeRegistry>,
        position: PositionFeed,
        serialize_pushes: bool,
    ) -> TelemetrySampler {
        TelemetrySampler::new(
            registry,
            position,
            OrientationFeed::new(),
            SamplerConfig {
                interval: Duration::from_millis(100),
                serialize_pushes,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_pushes_every_tick_once_position_known() {
        let registry = Arc::new(FakeRegistry::default());
        let position = PositionFeed::new();
        position.update(fix());

        let sampler = sampler(registry.clone(), position, false);
        sampler.start("DEV-1");
        tokio::time::sleep(Duration::from_millis(350)).await;

        let pushed = registry.samples.lock().len();
        assert!((3..=4).contains(&pushed), "pushed {pushed}");
        assert_eq!(sampler.last_sample().unwrap().camera_pan, Some(90.0));

        assert!(sampler.stop().await);
        assert_eq!(*registry.disconnects.lock(), vec!["DEV-1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_until_first_fix() {
        let registry = Arc::new(FakeRegistry::default());
        let position = PositionFeed::new();

        let sampler = sampler(registry.clone(), position.clone(), false);
        sampler.start("DEV-1");
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(registry.samples.lock().is_empty());
        assert!(sampler.last_sample().is_none());

        position.update(fix());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!registry.samples.lock().is_empty());

        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_push_keeps_clock_running() {
        let registry = Arc::new(FakeRegistry {
            fail_pushes: true,
            ..FakeRegistry::default()
        });
        let position = PositionFeed::new();
        position.update(fix());

        let sampler = sampler(registry.clone(), position, false);
        sampler.start("DEV-1");
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert!(sampler.stats().failed() >= 3);
        assert_eq!(sampler.stats().pushed(), 0);
        assert!(sampler.is_running());
        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_pushes_overlap_unless_serialized() {
        let position = PositionFeed::new();
        position.update(fix());

        let concurrent = Arc::new(FakeRegistry {
            push_delay: Some(Duration::from_millis(250)),
            ..FakeRegistry::default()
        });
        let sampler_a = sampler(concurrent.clone(), position.clone(), false);
        sampler_a.start("DEV-1");

        let serialized = Arc::new(FakeRegistry {
            push_delay: Some(Duration::from_millis(250)),
            ..FakeRegistry::default()
        });
        let sampler_b = sampler(serialized.clone(), position, true);
        sampler_b.start("DEV-2");

        tokio::time::sleep(Duration::from_millis(1000)).await;
        sampler_a.stop().await;
        sampler_b.stop().await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        let overlapping = concurrent.samples.lock().len();
        let one_at_a_time = serialized.samples.lock().len();
        assert!(overlapping > one_at_a_time, "{overlapping} vs {one_at_a_time}");
        assert!(sampler_b.stats().skipped() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_clock() {
        let registry = Arc::new(FakeRegistry::default());
        let position = PositionFeed::new();
        position.update(fix());

        let sampler = sampler(registry.clone(), position, false);
        assert!(!sampler.stop().await);
        assert!(registry.disconnects.lock().is_empty());

        sampler.start("DEV-1");
        tokio::time::sleep(Duration::from_millis(150)).await;
        sampler.stop().await;
        let after_stop = registry.samples.lock().len();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(registry.samples.lock().len(), after_stop);
        assert!(!sampler.is_running());
    }

    #[test]
    fn test_orientation_flows_into_sample() {
        let orientation = OrientationFeed::new();
        orientation.update(OrientationReading {
            pitch: 30.0,
            roll: 0.0,
            yaw: 0.0,
        });
        let sample = TelemetrySample::compose(&fix(), &orientation.latest());
        assert_eq!(sample.camera_tilt, Some(-30.0));
    }
}
