//! Stream configuration schema
//!
//! These types match the JSON configuration file kept next to the device
//! identity file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Video
// =============================================================================

/// Capture/encode resolution presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoResolution {
    #[serde(rename = "720p")]
    Hd720p,
    #[serde(rename = "1080p")]
    Hd1080p,
    #[serde(rename = "4k")]
    Uhd4k,
}

impl VideoResolution {
    pub fn width(&self) -> u32 {
        match self {
            VideoResolution::Hd720p => 1280,
            VideoResolution::Hd1080p => 1920,
            VideoResolution::Uhd4k => 3840,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            VideoResolution::Hd720p => 720,
            VideoResolution::Hd1080p => 1080,
            VideoResolution::Uhd4k => 2160,
        }
    }
}

impl Default for VideoResolution {
    fn default() -> Self {
        Self::Hd1080p
    }
}

/// Encoder settings handed to the transport on connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Bits per second
    pub bitrate: u32,
    /// Maximum distance between keyframes
    pub keyframe_interval_secs: f64,
    pub audio_muted: bool,
}

// =============================================================================
// Timings
// =============================================================================

/// Fixed delays and timeouts used by a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionTimings {
    /// Pause between transport connect and publish
    pub settle_delay_ms: u64,
    /// Pause between the conflict disconnect and the re-registration
    pub conflict_retry_delay_ms: u64,
    /// Telemetry tick period (10 Hz)
    pub telemetry_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub resource_timeout_secs: u64,
}

impl SessionTimings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn conflict_retry_delay(&self) -> Duration {
        Duration::from_millis(self.conflict_retry_delay_ms)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_secs(self.resource_timeout_secs)
    }
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            conflict_retry_delay_ms: 1000,
            telemetry_interval_ms: 100,
            request_timeout_secs: 10,
            resource_timeout_secs: 30,
        }
    }
}

// =============================================================================
// Stream
// =============================================================================

/// Everything a session needs to know about where and how to stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamConfig {
    pub resolution: VideoResolution,
    pub frame_rate: u32,
    /// Bits per second
    pub bitrate: u32,
    /// Base URL of the tracking backend, e.g. `http://10.0.0.4:8000`
    pub backend_url: String,
    pub api_key: Option<String>,
    /// Keep at most one telemetry push in flight instead of one per tick
    pub serialize_telemetry_pushes: bool,
    pub timings: SessionTimings,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            resolution: VideoResolution::default(),
            frame_rate: 30,
            bitrate: 3_000_000,
            backend_url: "http://localhost:8000".to_string(),
            api_key: None,
            serialize_telemetry_pushes: false,
            timings: SessionTimings::default(),
        }
    }
}

impl StreamConfig {
    /// Encoder settings derived from this configuration
    pub fn video_config(&self) -> VideoConfig {
        VideoConfig {
            width: self.resolution.width(),
            height: self.resolution.height(),
            frame_rate: self.frame_rate,
            bitrate: self.bitrate,
            keyframe_interval_secs: 2.0,
            audio_muted: true,
        }
    }

    /// Check the values a session cannot start without
    pub fn validate(&self) -> Result<(), String> {
        if self.backend_url.trim().is_empty() {
            return Err("backend URL is empty".to_string());
        }
        if self.frame_rate == 0 {
            return Err("frame rate must be positive".to_string());
        }
        if self.bitrate == 0 {
            return Err("bitrate must be positive".to_string());
        }
        if self.timings.telemetry_interval_ms == 0 {
            return Err("telemetry interval must be positive".to_string());
        }
        Ok(())
    }
}
