//! Session coordinator
//!
//! Brings a source from idle to live and back. Start and stop share one busy
//! guard, so at most one of them runs at a time and extra calls are ignored
//! rather than queued. A start or stop whose future is dropped midway is
//! unwound in the background back to `Idle`.

use super::state::{SessionEvent, SessionState, SessionSummary, StartOutcome};
use crate::backend::{DeviceInfo, RegistrationRequest, SourceRegistry};
use crate::capture::{CaptureSource, FrameHandler};
use crate::config::{SessionTimings, StreamConfig};
use crate::relay::{MediaRelay, MediaTransport, RelayStatus, TransportTarget};
use crate::sensors::{OrientationFeed, PositionFeed};
use crate::telemetry::{SamplerConfig, TelemetrySample, TelemetrySampler};
use crate::utils::error::{ErrorResponse, UplinkError, UplinkResult};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// External collaborators a session drives
pub struct SessionDeps {
    pub capture: Arc<dyn CaptureSource>,
    pub registry: Arc<dyn SourceRegistry>,
    pub transport: Arc<dyn MediaTransport>,
    pub position: PositionFeed,
    pub orientation: OrientationFeed,
}

/// Counters captured when the session went live
struct LiveSession {
    started_at: DateTime<Utc>,
    started: Instant,
    frames_forwarded: u64,
    frames_dropped: u64,
    telemetry_pushed: u64,
    telemetry_failed: u64,
}

/// Releases the busy flag when a start/stop finishes, however it finishes
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Held across a start/stop sequence. If the future is dropped before the
/// sequence completes, the remaining teardown runs on a spawned task and the
/// busy flag stays set until it is done.
struct Unwind<'a> {
    coordinator: &'a SessionCoordinator,
    busy: Option<BusyGuard>,
}

impl<'a> Unwind<'a> {
    fn new(coordinator: &'a SessionCoordinator, busy: BusyGuard) -> Self {
        Self {
            coordinator,
            busy: Some(busy),
        }
    }

    /// The sequence ran to completion; release the busy flag
    fn complete(mut self) {
        self.busy.take();
    }
}

impl Drop for Unwind<'_> {
    fn drop(&mut self) {
        if let Some(busy) = self.busy.take() {
            self.coordinator.abandon(busy);
        }
    }
}

/// Owns the session state machine for one source
pub struct SessionCoordinator {
    source_id: String,
    device: DeviceInfo,
    config: StreamConfig,
    capture: Arc<dyn CaptureSource>,
    registry: Arc<dyn SourceRegistry>,
    relay: Arc<MediaRelay>,
    sampler: Arc<TelemetrySampler>,

    /// Current session state
    state: RwLock<SessionState>,

    /// Set while a start or stop is running
    busy: Arc<AtomicBool>,

    live: Mutex<Option<LiveSession>>,

    /// Event broadcaster
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionCoordinator {
    /// Create a coordinator for `source_id` and wire capture to the relay
    pub fn new(source_id: impl Into<String>, config: StreamConfig, deps: SessionDeps) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let relay = Arc::new(MediaRelay::new(deps.transport));
        let sampler = Arc::new(TelemetrySampler::new(
            deps.registry.clone(),
            deps.position,
            deps.orientation,
            SamplerConfig {
                interval: config.timings.telemetry_interval(),
                serialize_pushes: config.serialize_telemetry_pushes,
            },
        ));

        let frame_relay = relay.clone();
        let handler: FrameHandler = Arc::new(move |frame| frame_relay.append_frame(frame));
        deps.capture.set_frame_handler(handler);

        Self {
            source_id: source_id.into(),
            device: DeviceInfo::detect(),
            config,
            capture: deps.capture,
            registry: deps.registry,
            relay,
            sampler,
            state: RwLock::new(SessionState::Idle),
            busy: Arc::new(AtomicBool::new(false)),
            live: Mutex::new(None),
            event_tx,
        }
    }

    /// Replace the detected device descriptor sent at registration
    pub fn with_device_info(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == SessionState::Live
    }

    pub fn is_connecting(&self) -> bool {
        self.state().is_connecting()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// The relay, for transports reporting connection events
    pub fn relay(&self) -> Arc<MediaRelay> {
        self.relay.clone()
    }

    pub fn relay_status(&self) -> RelayStatus {
        self.relay.status()
    }

    /// Last telemetry sample composed while live
    pub fn last_telemetry(&self) -> Option<TelemetrySample> {
        self.sampler.last_sample()
    }

    fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(self.busy.clone()))
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
        tracing::debug!("Session {} -> {:?}", self.source_id, state);
        let _ = self.event_tx.send(SessionEvent::StateChanged(state));
    }

    /// Start streaming.
    ///
    /// Ignored while another start/stop is running or the session is live.
    /// On failure nothing is left running and the session is back to `Idle`.
    pub async fn start(&self) -> UplinkResult<StartOutcome> {
        let Some(guard) = self.try_acquire() else {
            tracing::debug!("Start ignored: session busy");
            return Ok(StartOutcome::Ignored);
        };

        if self.state() == SessionState::Live {
            tracing::debug!("Start ignored: session already live");
            return Ok(StartOutcome::Ignored);
        }

        tracing::info!("Starting session for source {}", self.source_id);
        let unwind = Unwind::new(self, guard);

        let result = match self.bring_up().await {
            Ok(()) => Ok(StartOutcome::Live),
            Err(error) => {
                self.set_state(SessionState::Failed);
                tracing::error!("Session start failed: {}", error);
                let _ = self.event_tx.send(SessionEvent::Error(ErrorResponse::from(&error)));

                self.roll_back().await;
                self.set_state(SessionState::Idle);
                Err(error)
            }
        };

        unwind.complete();
        result
    }

    async fn bring_up(&self) -> UplinkResult<()> {
        let config = &self.config;
        config.validate().map_err(UplinkError::Configuration)?;
        if self.source_id.trim().is_empty() {
            return Err(UplinkError::Configuration("source id is empty".to_string()));
        }

        // Camera access
        self.set_state(SessionState::AcquiringPermission);
        let granted = self
            .capture
            .request_permission()
            .await
            .map_err(|e| UplinkError::PermissionDenied(e.to_string()))?;
        if !granted {
            return Err(UplinkError::PermissionDenied(
                "camera access was not granted".to_string(),
            ));
        }

        // Transport address, checked before anything goes on the network
        let target = TransportTarget::from_backend_url(&config.backend_url, &self.source_id);
        let transport_url = target.url();
        TransportTarget::parse(&transport_url)?;

        self.register(&transport_url, &config.timings).await?;

        self.set_state(SessionState::ConnectingTransport);
        self.relay.connect(&transport_url, &config.video_config()).await?;
        tokio::time::sleep(config.timings.settle_delay()).await;

        self.set_state(SessionState::Publishing);
        self.relay.publish(&target.stream_name).await?;

        self.capture
            .start()
            .await
            .map_err(|e| UplinkError::Capture(e.to_string()))?;
        self.sampler.start(&self.source_id);

        let stats = self.sampler.stats();
        *self.live.lock() = Some(LiveSession {
            started_at: Utc::now(),
            started: Instant::now(),
            frames_forwarded: self.relay.frames_forwarded(),
            frames_dropped: self.relay.frames_dropped(),
            telemetry_pushed: stats.pushed(),
            telemetry_failed: stats.failed(),
        });

        self.set_state(SessionState::Live);
        let _ = self.event_tx.send(SessionEvent::Started {
            source_id: self.source_id.clone(),
        });

        tracing::info!("Session live: {}", transport_url);
        Ok(())
    }

    /// Register, clearing a stale registration and retrying exactly once on conflict
    async fn register(&self, transport_url: &str, timings: &SessionTimings) -> UplinkResult<()> {
        let request = RegistrationRequest {
            source_id: self.source_id.clone(),
            device_info: self.device.clone(),
            rtmp_url: transport_url.to_string(),
        };

        self.set_state(SessionState::Registering);
        match self.register_once(&request).await {
            Err(error) if error.is_conflict() => {
                tracing::warn!(
                    "Source {} is still registered, disconnecting and retrying once",
                    self.source_id
                );

                self.set_state(SessionState::Disconnecting);
                if let Err(e) = self.registry.disconnect(&self.source_id).await {
                    tracing::warn!("Disconnect before retry failed: {}", e);
                }
                tokio::time::sleep(timings.conflict_retry_delay()).await;

                self.set_state(SessionState::Registering);
                self.register_once(&request).await
            }
            other => other,
        }
    }

    async fn register_once(&self, request: &RegistrationRequest) -> UplinkResult<()> {
        let response = self
            .registry
            .register(request)
            .await
            .map_err(UplinkError::from_registration)?;

        if !response.success {
            return Err(UplinkError::RegistrationFailure(
                response
                    .message
                    .unwrap_or_else(|| "backend refused the registration".to_string()),
            ));
        }

        tracing::info!(
            "Registered source {}: {}",
            response.source_id.as_deref().unwrap_or(&request.source_id),
            response.message.as_deref().unwrap_or("ok")
        );
        Ok(())
    }

    /// Undo whatever a failed start already brought up
    async fn roll_back(&self) {
        if let Err(e) = self.relay.stop().await {
            tracing::warn!("Relay cleanup after failed start: {}", e);
        }
        if self.capture.is_running() {
            self.capture.stop().await;
        }
    }

    /// Called when a start/stop future is dropped midway. The state goes back
    /// to `Idle` at once; relay, capture and sampler are shut down on a
    /// spawned task that keeps the busy flag until it finishes.
    fn abandon(&self, busy: BusyGuard) {
        let state = self.state();
        tracing::warn!(
            "Session {} abandoned while {:?}, unwinding in the background",
            self.source_id,
            state
        );

        if state.is_connecting() {
            self.set_state(SessionState::Failed);
        }
        self.live.lock().take();
        self.set_state(SessionState::Idle);

        let relay = self.relay.clone();
        let capture = self.capture.clone();
        let sampler = self.sampler.clone();
        let source_id = self.source_id.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _busy = busy;
                    if let Err(e) = relay.stop().await {
                        tracing::warn!("Relay cleanup for abandoned session: {}", e);
                    }
                    if capture.is_running() {
                        capture.stop().await;
                    }
                    sampler.stop().await;
                    tracing::debug!("Abandoned session {} unwound", source_id);
                });
            }
            Err(_) => {
                tracing::error!(
                    "No runtime to unwind abandoned session {}, transport may be left open",
                    source_id
                );
            }
        }
    }

    /// Stop streaming.
    ///
    /// Returns `None` without touching anything unless the session is live.
    /// Teardown always runs to the end: relay, then capture, then telemetry
    /// (which notifies the backend).
    pub async fn stop(&self) -> Option<SessionSummary> {
        let Some(guard) = self.try_acquire() else {
            tracing::debug!("Stop ignored: session busy");
            return None;
        };

        if self.state() != SessionState::Live {
            return None;
        }

        tracing::info!("Stopping session for source {}", self.source_id);
        let unwind = Unwind::new(self, guard);
        self.set_state(SessionState::Stopping);

        let mut teardown_warnings = Vec::new();
        if let Err(error) = self.relay.stop().await {
            tracing::warn!("{}", error);
            teardown_warnings.push(error.to_string());
            let _ = self
                .event_tx
                .send(SessionEvent::TeardownWarning(ErrorResponse::from(&error)));
        }

        self.capture.stop().await;
        self.sampler.stop().await;

        let summary = self.summarize(teardown_warnings);
        self.set_state(SessionState::Idle);
        unwind.complete();
        let _ = self.event_tx.send(SessionEvent::Stopped(summary.clone()));

        tracing::info!(
            "Session stopped after {:.0}ms ({} frames forwarded, {} telemetry samples)",
            summary.duration_ms,
            summary.frames_forwarded,
            summary.telemetry_pushed
        );
        Some(summary)
    }

    fn summarize(&self, teardown_warnings: Vec<String>) -> SessionSummary {
        let stats = self.sampler.stats();
        let live = self.live.lock().take();

        let (started_at, duration_ms, base) = match &live {
            Some(live) => (
                live.started_at,
                live.started.elapsed().as_secs_f64() * 1000.0,
                (
                    live.frames_forwarded,
                    live.frames_dropped,
                    live.telemetry_pushed,
                    live.telemetry_failed,
                ),
            ),
            None => (Utc::now(), 0.0, (0, 0, 0, 0)),
        };

        SessionSummary {
            source_id: self.source_id.clone(),
            started_at,
            duration_ms,
            frames_forwarded: self.relay.frames_forwarded().saturating_sub(base.0),
            frames_dropped: self.relay.frames_dropped().saturating_sub(base.1),
            telemetry_pushed: stats.pushed().saturating_sub(base.2),
            telemetry_failed: stats.failed().saturating_sub(base.3),
            teardown_warnings,
        }
    }
}
