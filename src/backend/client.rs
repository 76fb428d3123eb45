//! Tracking backend client
//!
//! Registration, telemetry and disconnect calls for a mobile source.

use super::types::{ApiError, ErrorBody, RegistrationRequest, RegistrationResponse};
use crate::config::StreamConfig;
use crate::telemetry::TelemetrySample;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

/// The backend as seen by a source: register, report, leave
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// Register this device as a video source
    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ApiError>;

    /// Remove the source from the backend
    async fn disconnect(&self, source_id: &str) -> Result<(), ApiError>;

    /// Push one telemetry sample for the source
    async fn update_telemetry(
        &self,
        source_id: &str,
        sample: &TelemetrySample,
    ) -> Result<(), ApiError>;
}

/// `SourceRegistry` over the backend's HTTP API
pub struct HttpSourceRegistry {
    base_url: String,
    api_key: Option<String>,
    http_client: Client,
}

impl HttpSourceRegistry {
    /// Create a client with explicit timeouts.
    ///
    /// `request_timeout` bounds connecting and each wait for data, so a slow
    /// but progressing response is not cut off. `resource_timeout` bounds a
    /// whole request from start to finish.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
        resource_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(resource_timeout)
            .connect_timeout(request_timeout)
            .read_timeout(request_timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http_client,
        })
    }

    /// Create a client from a stream configuration
    pub fn from_config(config: &StreamConfig) -> Result<Self, ApiError> {
        Self::new(
            config.backend_url.clone(),
            config.api_key.clone(),
            config.timings.request_timeout(),
            config.timings.resource_timeout(),
        )
    }

    fn source_url(&self, source_id: &str, action: &str) -> String {
        format!(
            "{}/api/sources/mobile/{}/{}",
            self.base_url,
            urlencoding::encode(source_id),
            action
        )
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let request = self.http_client.post(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Turn non-2xx answers into `ApiError::Status`, keeping the backend's detail
    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail);

        Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl SourceRegistry for HttpSourceRegistry {
    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ApiError> {
        let url = format!("{}/api/sources/mobile/register", self.base_url);

        tracing::debug!("Registering source {} at {}", request.source_id, url);

        let response = self.post(&url).json(request).send().await?;
        let response = Self::check(response).await?;

        response
            .json::<RegistrationResponse>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn disconnect(&self, source_id: &str) -> Result<(), ApiError> {
        let url = self.source_url(source_id, "disconnect");

        tracing::debug!("Disconnecting source {}", source_id);

        let response = self.post(&url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_telemetry(
        &self,
        source_id: &str,
        sample: &TelemetrySample,
    ) -> Result<(), ApiError> {
        let url = self.source_url(source_id, "telemetry");

        let response = self.post(&url).json(sample).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}
