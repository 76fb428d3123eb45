//! Backend request/response types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from calls to the tracking backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("HTTP {status}{}", format_detail(.detail))]
    Status { status: u16, detail: Option<String> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// HTTP status, when the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn format_detail(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ApiError::InvalidResponse(error.to_string())
        } else {
            ApiError::Network(error.to_string())
        }
    }
}

/// Hardware/OS descriptor sent with the registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: String,
    pub os_version: String,
}

impl DeviceInfo {
    /// Describe the host this process runs on
    pub fn detect() -> Self {
        Self {
            model: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            os_version: get_os_version(),
        }
    }
}

fn get_os_version() -> String {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/sys/kernel/osrelease")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        "Unknown".to_string()
    }
}

/// Body of `POST /api/sources/mobile/register`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub source_id: String,
    pub device_info: DeviceInfo,
    pub rtmp_url: String,
}

/// Answer to a registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub success: bool,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body produced by the backend for non-2xx answers
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: Option<String>,
}
