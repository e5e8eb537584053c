//! Scale-set model and the compute client seam
//!
//! The cleaner only ever talks to a [`ScaleSetsClient`]. The model keeps the
//! handful of fields the cleaner reads or writes typed and carries everything
//! else through as raw JSON, so a listed scale set can be PUT back unchanged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("ARM request failed: {message}")]
    RequestFailed { message: String },

    #[error("ARM returned status {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid ARM response: {message}")]
    InvalidResponse { message: String },

    #[error("Long-running operation finished with status {status}: {message}")]
    OperationFailed { status: String, message: String },

    #[error("Long-running operation still running after {polls} polls")]
    OperationTimedOut { polls: u32 },

    #[error("ARM client configuration error: {message}")]
    ConfigError { message: String },
}

/// Reference to another ARM resource by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiEntityReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Load-balancer facing part of the VM profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_probe: Option<ApiEntityReference>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_profile: Option<NetworkProfile>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSetProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_machine_profile: Option<VirtualMachineProfile>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A virtual machine scale set as returned by the compute API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaleSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<ScaleSetProperties>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScaleSet {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn network_profile(&self) -> Option<&NetworkProfile> {
        self.properties
            .as_ref()?
            .virtual_machine_profile
            .as_ref()?
            .network_profile
            .as_ref()
    }

    /// Network profile, creating any missing intermediate levels
    pub fn network_profile_mut(&mut self) -> &mut NetworkProfile {
        self.properties
            .get_or_insert_with(Default::default)
            .virtual_machine_profile
            .get_or_insert_with(Default::default)
            .network_profile
            .get_or_insert_with(Default::default)
    }

    pub fn health_probe_id(&self) -> Option<&str> {
        self.network_profile()?
            .health_probe
            .as_ref()?
            .id
            .as_deref()
    }
}

/// One page of a scale-set listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSetListResult {
    #[serde(default)]
    pub value: Vec<ScaleSet>,
    #[serde(default)]
    pub next_link: Option<String>,
}

/// Compute operations the cleaner depends on
#[async_trait]
pub trait ScaleSetsClient: Send + Sync {
    /// List every scale set in the resource group
    async fn list(&self, resource_group: &str) -> Result<Vec<ScaleSet>, ComputeError>;

    /// Delete a scale set and wait for the operation to finish
    async fn delete_and_wait(&self, resource_group: &str, name: &str) -> Result<(), ComputeError>;

    /// Create or replace a scale set and wait for the operation to finish
    async fn create_or_update_and_wait(
        &self,
        resource_group: &str,
        name: &str,
        scale_set: &ScaleSet,
    ) -> Result<(), ComputeError>;
}
