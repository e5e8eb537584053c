//! AppLens detector client
//!
//! Forwards detector queries to the Azure diagnostics service and reshapes
//! its responses into ARM-style detector envelopes.

pub mod client;
pub mod envelope;
pub mod error;
pub mod options;

pub use client::{AppLensClient, Client, ClientOptions};
pub use envelope::{
    ResponseMessageCollectionEnvelope, ResponseMessageEnvelope, DETECTOR_RESOURCE_TYPE,
};
pub use error::AppLensError;
pub use options::{GetDetectorOptions, ListDetectorsOptions};
