//! Telemetry sampling and upload

pub mod sample;
pub mod sampler;

pub use sample::TelemetrySample;
pub use sampler::{SamplerConfig, SamplerStats, TelemetrySampler};
