//! Position and orientation feeds
//!
//! The platform pushes readings into these containers whenever its sensors
//! report. Readers only ever see the latest value; nothing is queued.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// A GNSS fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionReading {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level
    pub altitude: f64,
    /// Compass heading in degrees, if the device has one
    pub heading: Option<f64>,
    /// Direction of travel in degrees clockwise from north
    pub course: f64,
    /// Meters per second
    pub speed: f64,
}

/// Device attitude in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrientationReading {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

impl OrientationReading {
    /// Build a reading from an attitude expressed in radians
    pub fn from_radians(pitch: f64, roll: f64, yaw: f64) -> Self {
        Self {
            pitch: pitch.to_degrees(),
            roll: roll.to_degrees(),
            yaw: yaw.to_degrees(),
        }
    }
}

/// Last-value container for position fixes
///
/// Starts empty: the sampler skips ticks until the first fix arrives.
#[derive(Debug, Clone)]
pub struct PositionFeed {
    tx: Arc<watch::Sender<Option<PositionReading>>>,
}

impl PositionFeed {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the latest fix
    pub fn update(&self, reading: PositionReading) {
        self.tx.send_replace(Some(reading));
    }

    /// Latest fix, if any has ever arrived
    pub fn latest(&self) -> Option<PositionReading> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PositionReading>> {
        self.tx.subscribe()
    }
}

impl Default for PositionFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Last-value container for attitude readings
///
/// Starts level (all zeros) until the motion sensor reports.
#[derive(Debug, Clone)]
pub struct OrientationFeed {
    tx: Arc<watch::Sender<OrientationReading>>,
}

impl OrientationFeed {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(OrientationReading::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn update(&self, reading: OrientationReading) {
        self.tx.send_replace(reading);
    }

    pub fn latest(&self) -> OrientationReading {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<OrientationReading> {
        self.tx.subscribe()
    }
}

impl Default for OrientationFeed {
    fn default() -> Self {
        Self::new()
    }
}
