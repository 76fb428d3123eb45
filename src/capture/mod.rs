//! Camera capture interface
//!
//! The pipeline itself lives outside this crate.

pub mod traits;

pub use traits::{CaptureError, CaptureSource, FrameHandler, VideoFrame};
