//! ARM REST implementation of [`ScaleSetsClient`]
//!
//! Mutating calls return once their long-running operation completes. Completion
//! is tracked through the `Azure-AsyncOperation` status resource when ARM
//! provides one. An accepted delete falls back to polling the `Location` header;
//! a PUT without an async operation is already done.

use crate::compute::{ComputeError, ScaleSet, ScaleSetListResult, ScaleSetsClient};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_API_VERSION: &str = "2020-06-01";

const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Connection settings for [`ArmScaleSetsClient`]
#[derive(Debug, Clone)]
pub struct ArmClientSettings {
    pub endpoint: String,
    pub subscription_id: String,
    pub access_token: String,
    pub api_version: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub timeout: Duration,
}

impl ArmClientSettings {
    pub fn new(subscription_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
            subscription_id: subscription_id.into(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval: Duration::from_secs(5),
            max_polls: 360,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArmErrorResponse {
    error: Option<ArmErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ArmErrorDetail>,
}

enum PollTarget {
    AsyncOperation(String),
    Location(String),
}

pub struct ArmScaleSetsClient {
    client: Client,
    endpoint: String,
    subscription_id: String,
    access_token: String,
    api_version: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl ArmScaleSetsClient {
    pub fn new(settings: ArmClientSettings) -> Result<Self, ComputeError> {
        if !settings.endpoint.starts_with("http://") && !settings.endpoint.starts_with("https://")
        {
            return Err(ComputeError::ConfigError {
                message: format!(
                    "Invalid ARM endpoint: {}. Must start with http:// or https://",
                    settings.endpoint
                ),
            });
        }

        if settings.subscription_id.is_empty() {
            return Err(ComputeError::ConfigError {
                message: "subscription id is required".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ComputeError::ConfigError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            subscription_id: settings.subscription_id,
            access_token: settings.access_token,
            api_version: settings.api_version,
            poll_interval: settings.poll_interval,
            max_polls: settings.max_polls,
        })
    }

    fn collection_url(&self, resource_group: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachineScaleSets",
            self.endpoint, self.subscription_id, resource_group
        )
    }

    fn resource_url(&self, resource_group: &str, name: &str) -> String {
        format!("{}/{}", self.collection_url(resource_group), name)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ComputeError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ComputeError::RequestFailed {
                message: e.to_string(),
            })?;

        ensure_success(response).await
    }

    async fn wait_for_completion(
        &self,
        target: PollTarget,
        headers: &HeaderMap,
    ) -> Result<(), ComputeError> {
        let mut delay = retry_after(headers).unwrap_or(self.poll_interval);

        for poll in 1..=self.max_polls {
            tokio::time::sleep(delay).await;

            let url = match &target {
                PollTarget::AsyncOperation(url) | PollTarget::Location(url) => url,
            };
            let response = self.send(self.client.get(url)).await?;
            delay = retry_after(response.headers()).unwrap_or(self.poll_interval);

            match target {
                PollTarget::AsyncOperation(_) => {
                    let status: OperationStatus =
                        response
                            .json()
                            .await
                            .map_err(|e| ComputeError::InvalidResponse {
                                message: format!("operation status: {}", e),
                            })?;

                    match status.status.as_str() {
                        "Succeeded" => return Ok(()),
                        "Failed" | "Canceled" => {
                            return Err(ComputeError::OperationFailed {
                                message: status.error.unwrap_or_default().message,
                                status: status.status,
                            })
                        }
                        other => debug!(poll, status = %other, "Operation still running"),
                    }
                }
                PollTarget::Location(_) => {
                    if response.status() != StatusCode::ACCEPTED {
                        return Ok(());
                    }
                    debug!(poll, "Operation still running");
                }
            }
        }

        Err(ComputeError::OperationTimedOut {
            polls: self.max_polls,
        })
    }
}

#[async_trait]
impl ScaleSetsClient for ArmScaleSetsClient {
    async fn list(&self, resource_group: &str) -> Result<Vec<ScaleSet>, ComputeError> {
        let mut scale_sets = Vec::new();
        let mut next = Some(format!(
            "{}?api-version={}",
            self.collection_url(resource_group),
            self.api_version
        ));

        while let Some(url) = next {
            let response = self.send(self.client.get(&url)).await?;
            let page: ScaleSetListResult =
                response
                    .json()
                    .await
                    .map_err(|e| ComputeError::InvalidResponse {
                        message: format!("scale set list: {}", e),
                    })?;

            scale_sets.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        debug!(
            resource_group = %resource_group,
            count = scale_sets.len(),
            "Listed scale sets"
        );
        Ok(scale_sets)
    }

    async fn delete_and_wait(&self, resource_group: &str, name: &str) -> Result<(), ComputeError> {
        let request = self
            .client
            .delete(self.resource_url(resource_group, name))
            .query(&[("api-version", self.api_version.as_str())]);

        let response = self.send(request).await?;
        info!(
            resource_group = %resource_group,
            vmss = %name,
            status = %response.status(),
            "Scale set delete accepted"
        );

        if response.status() != StatusCode::ACCEPTED {
            return Ok(());
        }

        let target = async_operation(response.headers())
            .or_else(|| location(response.headers()))
            .ok_or_else(|| ComputeError::InvalidResponse {
                message: format!("delete of {} accepted without a status URL to poll", name),
            })?;
        self.wait_for_completion(target, response.headers()).await
    }

    async fn create_or_update_and_wait(
        &self,
        resource_group: &str,
        name: &str,
        scale_set: &ScaleSet,
    ) -> Result<(), ComputeError> {
        let request = self
            .client
            .put(self.resource_url(resource_group, name))
            .query(&[("api-version", self.api_version.as_str())])
            .json(scale_set);

        let response = self.send(request).await?;
        info!(
            resource_group = %resource_group,
            vmss = %name,
            status = %response.status(),
            "Scale set update accepted"
        );

        // PUT completes inline unless ARM hands back an async operation
        match async_operation(response.headers()) {
            Some(target) => self.wait_for_completion(target, response.headers()).await,
            None => Ok(()),
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, ComputeError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unable to read body>".to_string());

    let detail = serde_json::from_str::<ArmErrorResponse>(&body)
        .ok()
        .and_then(|parsed| parsed.error);

    Err(match detail {
        Some(detail) => ComputeError::Api {
            status,
            code: detail.code,
            message: detail.message,
        },
        None => ComputeError::Api {
            status,
            code: String::new(),
            message: body,
        },
    })
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn async_operation(headers: &HeaderMap) -> Option<PollTarget> {
    header_str(headers, AZURE_ASYNC_OPERATION).map(PollTarget::AsyncOperation)
}

fn location(headers: &HeaderMap) -> Option<PollTarget> {
    header_str(headers, LOCATION.as_str()).map(PollTarget::Location)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_str(headers, RETRY_AFTER.as_str())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
