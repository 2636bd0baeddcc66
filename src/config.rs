//! Instrumentation configuration
//!
//! Loaded from TOML or built in code. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! # Example TOML
//! ```toml
//! enabled_by_default = true
//! collector_capacity = 4096
//! slow_call_threshold_us = 50000
//! capture_arguments = false
//!
//! [[target]]
//! type_name = "Calculator"
//! operation = "compute"
//! kind = "instance"
//! ```

use crate::operation::OperationKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Configuration for timing instrumentation
///
/// # Example
/// ```
/// use interpose::config::InstrumentationConfig;
///
/// let config = InstrumentationConfig::default();
/// assert!(config.enabled_by_default);
/// assert_eq!(config.collector_capacity, 8192);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Whether interceptors start enabled once installed
    pub enabled_by_default: bool,

    /// Maximum number of records buffered by a collector before new ones are dropped
    pub collector_capacity: usize,

    /// Calls at or above this duration (microseconds) are logged at warn level.
    ///
    /// 0 disables slow-call logging.
    pub slow_call_threshold_us: u64,

    /// Keep each call's arguments on its record (and in JSON output)
    pub capture_arguments: bool,

    /// Operations to time
    #[serde(rename = "target")]
    pub targets: Vec<OperationKey>,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            enabled_by_default: true,
            collector_capacity: 8192,
            slow_call_threshold_us: 100_000, // 100ms
            capture_arguments: false,
            targets: Vec::new(),
        }
    }
}

impl InstrumentationConfig {
    /// Create a strict configuration (every call recorded in detail)
    ///
    /// Use when debugging a specific operation: arguments are captured, the
    /// buffer is larger and calls over 10ms are reported.
    pub fn strict() -> Self {
        Self {
            enabled_by_default: true,
            collector_capacity: 65_536,
            slow_call_threshold_us: 10_000, // 10ms
            capture_arguments: true,
            targets: Vec::new(),
        }
    }

    /// Create a permissive configuration (lowest overhead)
    ///
    /// Use for always-on timing: no argument capture, no slow-call warnings.
    pub fn permissive() -> Self {
        Self {
            enabled_by_default: true,
            collector_capacity: 4096,
            slow_call_threshold_us: 0,
            capture_arguments: false,
            targets: Vec::new(),
        }
    }

    /// Load and validate a configuration file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read instrumentation config: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse instrumentation config")?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn with_target(mut self, key: OperationKey) -> Self {
        self.targets.push(key);
        self
    }

    /// Slow-call threshold, `None` when disabled
    pub fn slow_call_threshold_us(&self) -> Option<u64> {
        (self.slow_call_threshold_us > 0).then_some(self.slow_call_threshold_us)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.collector_capacity == 0 {
            return Err("collector_capacity must be > 0".to_string());
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.type_name.is_empty() || target.operation.is_empty() {
                return Err(format!("target {} has an empty type or operation name", target));
            }
            if !seen.insert(target) {
                return Err(format!("duplicate target {}", target));
            }
        }

        Ok(())
    }
}
