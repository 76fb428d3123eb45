//! Error types and handling
//!
//! The session error taxonomy shared by the coordinator, relay and sampler.

use crate::backend::ApiError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session-wide error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UplinkError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Source already registered: {0}")]
    RegistrationConflict(String),

    #[error("Registration failed: {0}")]
    RegistrationFailure(String),

    #[error("Transport connect failed: {0}")]
    TransportConnect(String),

    #[error("Transport publish failed: {0}")]
    TransportPublish(String),

    #[error("Transport teardown failed: {0}")]
    TransportTeardown(String),

    #[error("Telemetry push failed: {0}")]
    TelemetryPush(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Capture error: {0}")]
    Capture(String),
}

impl UplinkError {
    /// Classify a failed registration call.
    ///
    /// A 409 from the backend means the source id is still registered from a
    /// previous session; everything else is a plain registration failure.
    pub fn from_registration(error: ApiError) -> Self {
        if error.status() == Some(409) {
            UplinkError::RegistrationConflict(error.to_string())
        } else {
            UplinkError::RegistrationFailure(error.to_string())
        }
    }

    /// Whether the coordinator recovers from this error on its own
    pub fn is_conflict(&self) -> bool {
        matches!(self, UplinkError::RegistrationConflict(_))
    }

    /// Whether the user can sensibly press "start" again after this error
    pub fn is_user_retryable(&self) -> bool {
        !matches!(self, UplinkError::Configuration(_))
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            UplinkError::PermissionDenied(_) => "PERMISSION_DENIED",
            UplinkError::RegistrationConflict(_) => "REGISTRATION_CONFLICT",
            UplinkError::RegistrationFailure(_) => "REGISTRATION_FAILURE",
            UplinkError::TransportConnect(_) => "TRANSPORT_CONNECT_FAILURE",
            UplinkError::TransportPublish(_) => "TRANSPORT_PUBLISH_FAILURE",
            UplinkError::TransportTeardown(_) => "TRANSPORT_TEARDOWN_FAILURE",
            UplinkError::TelemetryPush(_) => "TELEMETRY_PUSH_FAILURE",
            UplinkError::Configuration(_) => "CONFIGURATION_ERROR",
            UplinkError::Capture(_) => "CAPTURE_ERROR",
        }
    }
}

/// Error response for UI surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&UplinkError> for ErrorResponse {
    fn from(error: &UplinkError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
            retryable: error.is_user_retryable(),
        }
    }
}

/// Result type alias using UplinkError
pub type UplinkResult<T> = Result<T, UplinkError>;
