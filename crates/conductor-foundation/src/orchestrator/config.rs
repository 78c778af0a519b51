//! Orchestrator configuration
//!
//! Loaded from any format supported by [`conductor_kernel::config`]:
//!
//! ```yaml
//! max_concurrent_tasks: 4
//! default_timeout_ms: 60000
//! cycle_policy: fail_result
//! default_breaker:
//!   failure_threshold: 5
//! capabilities:
//!   - capability: security_evaluation
//!     retry: true
//!     call_timeout_ms: 10000
//!     breaker:
//!       failure_threshold: 3
//! ```

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::workflow::CapabilityPolicy;
use conductor_kernel::config::{self, ConfigFormat};
use conductor_kernel::{IntoKernelReport, KernelResult};
use error_stack::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What to do with a workflow whose dependency graph is unsatisfiable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Return a `failed` result with `errors["dependency"]`
    #[default]
    FailResult,
    /// Return `OrchestratorError::Dependency`
    Reject,
}

/// Per-capability overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityConfig {
    pub capability: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker: Option<CircuitBreakerConfig>,
    #[serde(default)]
    pub retry: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,
}

impl CapabilityConfig {
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            ..Default::default()
        }
    }

    pub fn with_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = Some(config);
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub(crate) fn policy(&self) -> CapabilityPolicy {
        CapabilityPolicy {
            breaker: self.breaker.clone(),
            retry: self.retry,
            call_timeout: self.call_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on tasks in flight across all running workflows
    pub max_concurrent_tasks: usize,
    /// Timeout for workflows that do not set their own
    pub default_timeout_ms: Option<u64>,
    pub cycle_policy: CyclePolicy,
    /// Breaker config for capabilities without an override
    pub default_breaker: CircuitBreakerConfig,
    pub capabilities: Vec<CapabilityConfig>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 10,
            default_timeout_ms: None,
            cycle_policy: CyclePolicy::default(),
            default_breaker: CircuitBreakerConfig::default(),
            capabilities: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Load from a config file, detecting the format from its extension
    pub fn from_file(path: impl AsRef<Path>) -> KernelResult<Self> {
        let path = path.as_ref();
        config::load_config(path)
            .into_report()
            .attach(format!("loading orchestrator config from {}", path.display()))
    }

    /// Parse from a string in the given format
    pub fn from_str_with_format(content: &str, format: ConfigFormat) -> KernelResult<Self> {
        config::from_str(content, format)
            .into_report()
            .attach("parsing orchestrator config")
    }

    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    pub fn with_default_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.default_breaker = config;
        self
    }

    /// Add or replace a capability override
    pub fn with_capability(mut self, capability: CapabilityConfig) -> Self {
        self.capabilities
            .retain(|c| c.capability != capability.capability);
        self.capabilities.push(capability);
        self
    }

    pub fn capability(&self, name: &str) -> Option<&CapabilityConfig> {
        self.capabilities.iter().find(|c| c.capability == name)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    /// Concurrency bound, never below one
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_tasks.max(1)
    }
}
