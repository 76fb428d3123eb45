//! Capture trait definitions
//!
//! Platform-agnostic interface to the camera pipeline. The session never
//! configures the camera itself; it only asks for permission, installs the
//! frame handler and switches capture on and off.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// One compressed video frame as delivered by the camera pipeline
///
/// The payload is opaque to this crate and is handed to the transport as is.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Encoded sample data
    pub data: Bytes,

    /// Presentation timestamp relative to capture start
    pub pts: Duration,

    /// Whether this frame can be decoded on its own
    pub is_keyframe: bool,
}

impl VideoFrame {
    pub fn new(data: impl Into<Bytes>, pts: Duration, is_keyframe: bool) -> Self {
        Self {
            data: data.into(),
            pts,
            is_keyframe,
        }
    }
}

/// Callback the pipeline invokes for every frame, possibly from its own thread
pub type FrameHandler = Arc<dyn Fn(VideoFrame) + Send + Sync>;

/// Capture pipeline errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Capture failed: {0}")]
    Failed(String),
}

/// The camera pipeline as seen by the session coordinator
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Ask for camera access. Returns whether access is granted; asking again
    /// after a grant is harmless.
    async fn request_permission(&self) -> Result<bool, CaptureError>;

    /// Install the callback receiving every captured frame
    fn set_frame_handler(&self, handler: FrameHandler);

    /// Start delivering frames
    async fn start(&self) -> Result<(), CaptureError>;

    /// Stop delivering frames
    async fn stop(&self);

    /// Whether frames are currently being delivered
    fn is_running(&self) -> bool;
}
