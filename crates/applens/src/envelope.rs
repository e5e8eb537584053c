//! ARM-style envelopes around AppLens detector payloads

use crate::error::AppLensError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DETECTOR_RESOURCE_TYPE: &str = "Microsoft.RedHatOpenShift/openShiftClusters/detectors";

/// A single detector wrapped as an ARM resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessageEnvelope {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    /// Detector payload exactly as AppLens returned it
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,
}

/// A list of detectors in ARM list form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessageCollectionEnvelope {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<ResponseMessageEnvelope>,
}

impl ResponseMessageEnvelope {
    pub fn new(resource_id: &str, name: &str, location: &str, properties: Value) -> Self {
        Self {
            id: join_resource_path(&[resource_id, "detectors", name]),
            name: name.to_string(),
            resource_type: DETECTOR_RESOURCE_TYPE.to_string(),
            location: location.to_string(),
            properties,
        }
    }

    /// Wrap a raw detector response body
    pub fn from_json(
        resource_id: &str,
        name: &str,
        location: &str,
        body: &[u8],
    ) -> Result<Self, AppLensError> {
        let properties: Value = serde_json::from_slice(body)?;
        Ok(Self::new(resource_id, name, location, properties))
    }
}

impl ResponseMessageCollectionEnvelope {
    /// Wrap a raw detector list body.
    ///
    /// Entries without a `metadata.id` string are dropped.
    pub fn from_json(body: &[u8], resource_id: &str, location: &str) -> Result<Self, AppLensError> {
        let detectors: Option<Vec<Value>> = serde_json::from_slice(body)?;

        let value = detectors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|detector| {
                let id = detector_id(&detector)?.to_string();
                Some(ResponseMessageEnvelope::new(
                    resource_id,
                    &id,
                    location,
                    detector,
                ))
            })
            .collect();

        Ok(Self { value })
    }
}

fn detector_id(detector: &Value) -> Option<&str> {
    detector
        .get("metadata")?
        .get("id")?
        .as_str()
        .filter(|id| !id.is_empty())
}

/// Join slash-separated segments, collapsing empty, `.` and `..` elements
fn join_resource_path(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .copied()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        return String::new();
    }

    let rooted = joined.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let cleaned = segments.join("/");
    match (rooted, cleaned.is_empty()) {
        (true, _) => format!("/{}", cleaned),
        (false, true) => ".".to_string(),
        (false, false) => cleaned,
    }
}
