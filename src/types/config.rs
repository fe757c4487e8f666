//! Configuration structures.
//!
//! Configuration is built from defaults, a JSON document, or environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::errors::Result;

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Scheduler options.
    #[serde(default)]
    pub kernel: KernelConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parse a JSON document; missing sections and fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Defaults overlaid with `AGENT_KERNEL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let kernel = &mut config.kernel;

        if let Some(v) = lookup("AGENT_KERNEL_DEBUG") {
            kernel.debug = parse_flag(&v);
        }
        if let Some(v) = lookup("AGENT_KERNEL_STEP") {
            kernel.step = parse_flag(&v);
        }
        if let Some(v) = lookup("AGENT_KERNEL_JOURNAL") {
            kernel.journal = parse_flag(&v);
        }
        if let Some(v) = lookup("AGENT_KERNEL_MAX_CYCLES") {
            match v.trim().parse::<u64>() {
                Ok(n) => kernel.max_cycles = Some(n),
                Err(_) => tracing::warn!(value = %v, "ignoring invalid AGENT_KERNEL_MAX_CYCLES"),
            }
        }
        if let Some(v) = lookup("AGENT_KERNEL_TRACE_DIR") {
            if !v.is_empty() {
                kernel.trace_dir = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = lookup("RUST_LOG") {
            config.observability.log_level = v;
        }

        config
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Construction-time scheduler options.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct KernelConfig {
    /// Enable the per-agent text trace.
    pub debug: bool,

    /// Pause for external confirmation before each cycle.
    pub step: bool,

    /// Keep a copy of every emitted message, in sequence order.
    pub journal: bool,

    /// Stop the run with `Error::CycleLimit` after this many cycles.
    pub max_cycles: Option<u64>,

    /// Write one trace file per agent here instead of stderr (debug only).
    pub trace_dir: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
