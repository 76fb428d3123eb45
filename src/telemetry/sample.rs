//! Telemetry sample composition
//!
//! Turns the latest sensor readings into the record the backend fuses with
//! the video stream.

use crate::sensors::{OrientationReading, PositionReading};
use serde::{Deserialize, Serialize};

/// One telemetry upload
///
/// Absent optionals are left out of the JSON body entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_y: Option<f64>,
    /// GNSS gives no vertical speed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_tilt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_pan: Option<f64>,
}

impl TelemetrySample {
    /// Compose a sample from the latest position and orientation.
    ///
    /// Velocity is split along the course: x = speed·cos(course),
    /// y = speed·sin(course). The camera is assumed to look out of the back
    /// of the device, so a device tipped up (positive pitch) tilts the camera
    /// the other way, and it pans with the compass heading.
    pub fn compose(position: &PositionReading, orientation: &OrientationReading) -> Self {
        let course = position.course.to_radians();

        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            altitude: position.altitude,
            heading: position.heading,
            pitch: Some(orientation.pitch),
            roll: Some(orientation.roll),
            yaw: Some(orientation.yaw),
            velocity_x: Some(position.speed * course.cos()),
            velocity_y: Some(position.speed * course.sin()),
            velocity_z: None,
            camera_tilt: Some(-orientation.pitch),
            camera_pan: Some(position.heading.unwrap_or(0.0)),
        }
    }
}
