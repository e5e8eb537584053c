//! Scale-set cleaner - rolling-deployment housekeeping against Azure Resource Manager
//!
//! Removes the new scale set of a failed deployment and keeps gateway scale
//! sets pointed at the right load-balancer health probe. Each operation is a
//! single pass that reports an [`Outcome`]; polling is left to the caller.

pub mod arm;
pub mod cleaner;
pub mod compute;
pub mod config;

pub use arm::{ArmClientSettings, ArmScaleSetsClient};
pub use cleaner::{Cleaner, CleanerError, GatewayMatcher, Outcome, ProbeSpec};
pub use compute::{ComputeError, ScaleSet, ScaleSetsClient};
pub use config::{Command, Config};
