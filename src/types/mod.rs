//! Core types for the agent kernel.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Agent identity handles (`AgentId`)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Construction-time options for the kernel and observability

mod config;
mod errors;
mod ids;

pub use config::{Config, KernelConfig, ObservabilityConfig};
pub use errors::{Error, Result};
pub use ids::AgentId;
