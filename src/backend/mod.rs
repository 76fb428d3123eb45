//! Tracking backend integration
//!
//! The registration collaborator: a `SourceRegistry` trait and its HTTP
//! implementation.

pub mod client;
pub mod types;

pub use client::{HttpSourceRegistry, SourceRegistry};
pub use types::{ApiError, DeviceInfo, RegistrationRequest, RegistrationResponse};
