//! Recording fakes for the session's collaborators
//!
//! Every fake writes into one shared journal so tests can assert on the
//! order of calls across capture, registry and transport.

#![allow(dead_code)]

use async_trait::async_trait;
use edge_uplink::backend::{
    ApiError, DeviceInfo, RegistrationRequest, RegistrationResponse, SourceRegistry,
};
use edge_uplink::capture::{CaptureError, CaptureSource, FrameHandler, VideoFrame};
use edge_uplink::config::{StreamConfig, VideoConfig};
use edge_uplink::relay::{MediaTransport, TransportEndpoint, TransportError};
use edge_uplink::sensors::{OrientationFeed, PositionFeed, PositionReading};
use edge_uplink::telemetry::TelemetrySample;
use edge_uplink::{SessionCoordinator, SessionDeps};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SOURCE_ID: &str = "5F0C2A9E-7D1B-4E43-9C1A-2B6F0E9D4A11";

/// Ordered log of external calls
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Entries other than telemetry pushes
    pub fn calls(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e != "telemetry")
            .collect()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn last_position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().rposition(|e| e == entry)
    }
}

pub struct FakeCapture {
    journal: Journal,
    pub grant_permission: AtomicBool,
    pub fail_start: AtomicBool,
    pub stop_delay: Mutex<Option<Duration>>,
    running: AtomicBool,
    handler: Mutex<Option<FrameHandler>>,
}

impl FakeCapture {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            grant_permission: AtomicBool::new(true),
            fail_start: AtomicBool::new(false),
            stop_delay: Mutex::new(None),
            running: AtomicBool::new(false),
            handler: Mutex::new(None),
        }
    }

    /// Deliver a frame the way the camera thread would
    pub fn emit(&self, count: usize) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            for i in 0..count {
                let pts = Duration::from_millis(i as u64 * 33);
                handler(VideoFrame::new(vec![0u8; 32], pts, i == 0));
            }
        }
    }
}

#[async_trait]
impl CaptureSource for FakeCapture {
    async fn request_permission(&self) -> Result<bool, CaptureError> {
        self.journal.record("capture.permission");
        Ok(self.grant_permission.load(Ordering::SeqCst))
    }

    fn set_frame_handler(&self, handler: FrameHandler) {
        *self.handler.lock() = Some(handler);
    }

    async fn start(&self) -> Result<(), CaptureError> {
        self.journal.record("capture.start");
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceNotFound("back camera".to_string()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.journal.record("capture.stop");
        let delay = *self.stop_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

pub struct FakeRegistry {
    journal: Journal,
    /// Scripted answers to `register`, consumed in order; success once empty
    pub register_script: Mutex<VecDeque<Result<RegistrationResponse, ApiError>>>,
    pub register_delay: Mutex<Option<Duration>>,
    pub requests: Mutex<Vec<RegistrationRequest>>,
    pub samples: Mutex<Vec<TelemetrySample>>,
}

impl FakeRegistry {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            register_script: Mutex::new(VecDeque::new()),
            register_delay: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            samples: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, answers: Vec<Result<RegistrationResponse, ApiError>>) {
        self.register_script.lock().extend(answers);
    }
}

pub fn accepted() -> Result<RegistrationResponse, ApiError> {
    Ok(RegistrationResponse {
        success: true,
        source_id: Some(SOURCE_ID.to_string()),
        message: Some("Source registered".to_string()),
    })
}

pub fn conflict() -> Result<RegistrationResponse, ApiError> {
    Err(ApiError::Status {
        status: 409,
        detail: Some(format!("Source {SOURCE_ID} already registered")),
    })
}

#[async_trait]
impl SourceRegistry for FakeRegistry {
    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ApiError> {
        self.journal.record("register");
        self.requests.lock().push(request.clone());

        let delay = *self.register_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let answer = self.register_script.lock().pop_front();
        answer.unwrap_or_else(accepted)
    }

    async fn disconnect(&self, _source_id: &str) -> Result<(), ApiError> {
        self.journal.record("disconnect");
        Ok(())
    }

    async fn update_telemetry(
        &self,
        _source_id: &str,
        sample: &TelemetrySample,
    ) -> Result<(), ApiError> {
        self.journal.record("telemetry");
        self.samples.lock().push(sample.clone());
        Ok(())
    }
}

pub struct FakeTransport {
    journal: Journal,
    pub fail_connect: AtomicBool,
    pub fail_publish: AtomicBool,
    pub fail_close: AtomicBool,
    pub close_delay: Mutex<Option<Duration>>,
    pub frames: AtomicU64,
}

impl FakeTransport {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_connect: AtomicBool::new(false),
            fail_publish: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            close_delay: Mutex::new(None),
            frames: AtomicU64::new(0),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTransport for FakeTransport {
    async fn connect(
        &self,
        endpoint: &TransportEndpoint,
        _video: &VideoConfig,
    ) -> Result<(), TransportError> {
        self.journal.record(format!("connect {}", endpoint.address()));
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    async fn publish(&self, stream_name: &str) -> Result<(), TransportError> {
        self.journal.record(format!("publish {stream_name}"));
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("NetStream.Publish.BadName".to_string()));
        }
        Ok(())
    }

    fn send_frame(&self, _frame: VideoFrame) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.journal.record("close");
        let delay = *self.close_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::Io("broken pipe".to_string()));
        }
        Ok(())
    }
}

/// A coordinator wired to fakes
pub struct Harness {
    pub journal: Journal,
    pub capture: Arc<FakeCapture>,
    pub registry: Arc<FakeRegistry>,
    pub transport: Arc<FakeTransport>,
    pub position: PositionFeed,
    pub orientation: OrientationFeed,
    pub coordinator: Arc<SessionCoordinator>,
}

pub fn config() -> StreamConfig {
    StreamConfig {
        backend_url: "http://10.0.0.4:8000".to_string(),
        ..StreamConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(SOURCE_ID, config())
}

pub fn harness_with(source_id: &str, config: StreamConfig) -> Harness {
    let journal = Journal::default();
    let capture = Arc::new(FakeCapture::new(journal.clone()));
    let registry = Arc::new(FakeRegistry::new(journal.clone()));
    let transport = Arc::new(FakeTransport::new(journal.clone()));
    let position = PositionFeed::new();
    let orientation = OrientationFeed::new();

    let coordinator = SessionCoordinator::new(
        source_id,
        config,
        SessionDeps {
            capture: capture.clone(),
            registry: registry.clone(),
            transport: transport.clone(),
            position: position.clone(),
            orientation: orientation.clone(),
        },
    )
    .with_device_info(DeviceInfo {
        model: "iPhone15,2".to_string(),
        os_version: "17.4".to_string(),
    });

    Harness {
        journal,
        capture,
        registry,
        transport,
        position,
        orientation,
        coordinator: Arc::new(coordinator),
    }
}

pub fn fix() -> PositionReading {
    PositionReading {
        latitude: 44.4949,
        longitude: 11.3426,
        altitude: 54.0,
        heading: Some(270.0),
        course: 90.0,
        speed: 10.0,
    }
}
