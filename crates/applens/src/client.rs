//! HTTP client for the AppLens diagnostics service

use crate::envelope::{ResponseMessageCollectionEnvelope, ResponseMessageEnvelope};
use crate::error::AppLensError;
use crate::options::{GetDetectorOptions, ListDetectorsOptions, RequestOptions};
use async_trait::async_trait;
use reqwest::{Method, Request, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Detector operations, implemented by [`Client`]
#[async_trait]
pub trait AppLensClient: Send + Sync {
    async fn get_detector(
        &self,
        options: &GetDetectorOptions,
    ) -> Result<ResponseMessageEnvelope, AppLensError>;

    async fn list_detectors(
        &self,
        options: &ListDetectorsOptions,
    ) -> Result<ResponseMessageCollectionEnvelope, AppLensError>;
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Bearer token sent with every request
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct Client {
    endpoint: String,
    http: reqwest::Client,
    token: Option<String>,
}

impl Client {
    pub fn new(endpoint: impl Into<String>, options: ClientOptions) -> Result<Self, AppLensError> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(AppLensError::ConfigError {
                message: format!(
                    "Invalid AppLens endpoint: {}. Must start with http:// or https://",
                    endpoint
                ),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| AppLensError::ConfigError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint,
            http,
            token: options.token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// List the detectors available for a cluster
    pub async fn list_detectors(
        &self,
        options: &ListDetectorsOptions,
    ) -> Result<ResponseMessageCollectionEnvelope, AppLensError> {
        let body = self.send_post_request(options).await?;
        ResponseMessageCollectionEnvelope::from_json(&body, &options.resource_id, &options.location)
    }

    /// Run one detector for a cluster
    pub async fn get_detector(
        &self,
        options: &GetDetectorOptions,
    ) -> Result<ResponseMessageEnvelope, AppLensError> {
        let body = self.send_post_request(options).await?;
        ResponseMessageEnvelope::from_json(
            &options.resource_id,
            &options.detector_id,
            &options.location,
            &body,
        )
    }

    async fn send_post_request<O: RequestOptions>(
        &self,
        options: &O,
    ) -> Result<Vec<u8>, AppLensError> {
        let request = self.create_request(Method::POST, options)?;
        let response = self.execute_and_ensure_success(request).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn create_request<O: RequestOptions>(
        &self,
        method: Method,
        options: &O,
    ) -> Result<Request, AppLensError> {
        let mut builder = self
            .http
            .request(method, &self.endpoint)
            .headers(options.to_headers()?);

        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        Ok(builder.build()?)
    }

    async fn execute_and_ensure_success(&self, request: Request) -> Result<Response, AppLensError> {
        debug!(
            method = %request.method(),
            path_query = ?request.headers().get(crate::options::HEADER_PATH_QUERY),
            "Sending AppLens request"
        );

        let response = self.http.execute(request).await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            return Ok(response);
        }

        warn!(status = %status, "AppLens request failed");
        Err(AppLensError::from_response(response).await)
    }
}

#[async_trait]
impl AppLensClient for Client {
    async fn get_detector(
        &self,
        options: &GetDetectorOptions,
    ) -> Result<ResponseMessageEnvelope, AppLensError> {
        Client::get_detector(self, options).await
    }

    async fn list_detectors(
        &self,
        options: &ListDetectorsOptions,
    ) -> Result<ResponseMessageCollectionEnvelope, AppLensError> {
        Client::list_detectors(self, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Client::new("https://diag-runtimehost.azurewebsites.net", ClientOptions::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_rejects_endpoint_without_scheme() {
        let result = Client::new("diag-runtimehost.azurewebsites.net", ClientOptions::default());
        assert!(matches!(result, Err(AppLensError::ConfigError { .. })));
    }
}
