//! Media relay
//!
//! Thin façade over the media transport. It turns a transport URL into the
//! transport's connect/publish calls and forwards frames only while the
//! stream is published.

use super::target::{TransportEndpoint, TransportTarget};
use crate::capture::VideoFrame;
use crate::config::VideoConfig;
use crate::utils::error::{UplinkError, UplinkResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Transport-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(String),
}

/// Connection status changes reported by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    ConnectFailed(String),
    Closed,
}

/// The wire-level media transport (handshake, packetization, framing)
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Open a connection to `endpoint` and configure the encoder
    async fn connect(
        &self,
        endpoint: &TransportEndpoint,
        video: &VideoConfig,
    ) -> Result<(), TransportError>;

    /// Start publishing `stream_name` on the open connection
    async fn publish(&self, stream_name: &str) -> Result<(), TransportError>;

    /// Queue one frame for sending. Called from the capture thread.
    fn send_frame(&self, frame: VideoFrame);

    /// Stop publishing and close the connection
    async fn close(&self) -> Result<(), TransportError>;
}

/// Relay connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    Disconnected,
    Connected,
    Published,
}

/// Façade over a `MediaTransport` holding only the connection identity
pub struct MediaRelay {
    transport: Arc<dyn MediaTransport>,
    target: Mutex<Option<TransportTarget>>,
    published: AtomicBool,
    status_tx: watch::Sender<RelayStatus>,
    frames_forwarded: AtomicU64,
    frames_dropped: AtomicU64,
}

impl MediaRelay {
    pub fn new(transport: Arc<dyn MediaTransport>) -> Self {
        let (status_tx, _) = watch::channel(RelayStatus::Disconnected);
        Self {
            transport,
            target: Mutex::new(None),
            published: AtomicBool::new(false),
            status_tx,
            frames_forwarded: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Connect to the endpoint named by `url`.
    ///
    /// The URL is validated before the transport is touched; a malformed one
    /// is a configuration error and no connection is attempted.
    pub async fn connect(&self, url: &str, video: &VideoConfig) -> UplinkResult<()> {
        let target = TransportTarget::parse(url)?;
        let endpoint = target.endpoint();

        tracing::info!(
            "Connecting relay to {} ({}x{} @ {}fps, {} bps)",
            endpoint.address(),
            video.width,
            video.height,
            video.frame_rate,
            video.bitrate
        );

        self.transport
            .connect(&endpoint, video)
            .await
            .map_err(|e| UplinkError::TransportConnect(e.to_string()))?;

        *self.target.lock() = Some(target);
        self.status_tx.send_replace(RelayStatus::Connected);
        Ok(())
    }

    /// Publish `stream_name` on the open connection
    pub async fn publish(&self, stream_name: &str) -> UplinkResult<()> {
        if self.target.lock().is_none() {
            return Err(UplinkError::TransportPublish("relay is not connected".to_string()));
        }

        self.transport
            .publish(stream_name)
            .await
            .map_err(|e| UplinkError::TransportPublish(e.to_string()))?;

        self.published.store(true, Ordering::Release);
        self.status_tx.send_replace(RelayStatus::Published);

        tracing::info!("Relay publishing stream {}", stream_name);
        Ok(())
    }

    /// Forward one frame, or drop it if the stream is not published
    pub fn append_frame(&self, frame: VideoFrame) {
        if !self.published.load(Ordering::Acquire) {
            self.frames_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.transport.send_frame(frame);
        self.frames_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Stop publishing and close the connection.
    ///
    /// Frames stop being forwarded before the transport is asked to close,
    /// whatever the outcome of the close.
    pub async fn stop(&self) -> UplinkResult<()> {
        self.published.store(false, Ordering::Release);
        let target = self.target.lock().take();
        self.status_tx.send_replace(RelayStatus::Disconnected);

        let Some(target) = target else {
            return Ok(());
        };

        tracing::info!("Closing relay to {}", target.endpoint().address());

        self.transport
            .close()
            .await
            .map_err(|e| UplinkError::TransportTeardown(e.to_string()))
    }

    /// React to a status change reported by the transport
    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                if !self.published.load(Ordering::Acquire) {
                    self.status_tx.send_replace(RelayStatus::Connected);
                }
            }
            TransportEvent::ConnectFailed(reason) => {
                tracing::warn!("Transport connection failed: {}", reason);
                self.published.store(false, Ordering::Release);
                self.status_tx.send_replace(RelayStatus::Disconnected);
            }
            TransportEvent::Closed => {
                tracing::warn!("Transport connection closed by peer");
                self.published.store(false, Ordering::Release);
                self.status_tx.send_replace(RelayStatus::Disconnected);
            }
        }
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    pub fn status(&self) -> RelayStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RelayStatus> {
        self.status_tx.subscribe()
    }

    /// Target of the current connection
    pub fn target(&self) -> Option<TransportTarget> {
        self.target.lock().clone()
    }

    pub fn frames_forwarded(&self) -> u64 {
        self.frames_forwarded.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }
}
