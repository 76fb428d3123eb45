//! Transport target addressing
//!
//! A target has the shape `rtmp://host:port/application/stream_name`. The
//! host comes from the backend URL, the port and application are fixed, and
//! the stream name is the source id.

use crate::utils::error::{UplinkError, UplinkResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Well-known port of the backend's media ingest
pub const TRANSPORT_PORT: u16 = 1935;

/// Application name the backend ingests mobile sources under
pub const TRANSPORT_APPLICATION: &str = "stream";

const TRANSPORT_SCHEME: &str = "rtmp";

/// Where the transport connects to (everything but the stream name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportEndpoint {
    pub host: String,
    pub port: u16,
    pub application: String,
}

impl TransportEndpoint {
    /// `host:port/application`, the form transports take for their connect call
    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.application)
    }
}

/// Full address of the media relay endpoint for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportTarget {
    pub host: String,
    pub port: u16,
    pub application: String,
    pub stream_name: String,
}

impl TransportTarget {
    /// Derive the target for `source_id` from the backend's base URL
    pub fn from_backend_url(backend_url: &str, source_id: &str) -> Self {
        Self {
            host: backend_host(backend_url),
            port: TRANSPORT_PORT,
            application: TRANSPORT_APPLICATION.to_string(),
            stream_name: source_id.to_string(),
        }
    }

    /// Parse a `scheme://host[:port]/application/stream_name` URL.
    ///
    /// Anything with fewer than two path segments is rejected.
    pub fn parse(url: &str) -> UplinkResult<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| UplinkError::Configuration(format!("invalid transport URL {url}: {e}")))?;

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        if segments.len() < 2 {
            return Err(UplinkError::Configuration(format!(
                "transport URL must look like rtmp://host:port/app/stream_name, got {url}"
            )));
        }

        let stream_name = urlencoding::decode(segments[1])
            .map_err(|e| UplinkError::Configuration(format!("invalid stream name in {url}: {e}")))?
            .into_owned();

        Ok(Self {
            host: parsed.host_str().unwrap_or("localhost").to_string(),
            port: parsed.port().unwrap_or(TRANSPORT_PORT),
            application: segments[0].to_string(),
            stream_name,
        })
    }

    /// Render as a transport URL
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}/{}/{}",
            TRANSPORT_SCHEME,
            self.host,
            self.port,
            self.application,
            urlencoding::encode(&self.stream_name)
        )
    }

    pub fn endpoint(&self) -> TransportEndpoint {
        TransportEndpoint {
            host: self.host.clone(),
            port: self.port,
            application: self.application.clone(),
        }
    }
}

/// Host part of the backend URL.
///
/// Falls back to plain string surgery when the URL does not parse or has no
/// host (e.g. `192.168.1.20:8000` or `backend:8000`).
fn backend_host(backend_url: &str) -> String {
    let parsed = Url::parse(backend_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .filter(|host| !host.is_empty());

    if let Some(host) = parsed {
        return host;
    }

    let stripped = backend_url
        .trim()
        .replace("http://", "")
        .replace("https://", "");
    let host = stripped
        .split(':')
        .next()
        .unwrap_or_default()
        .split('/')
        .next()
        .unwrap_or_default();

    if host.is_empty() {
        "localhost".to_string()
    } else {
        host.to_string()
    }
}
