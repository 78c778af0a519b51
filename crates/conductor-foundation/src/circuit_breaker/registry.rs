//! Circuit Breaker Registry
//!
//! Keeps one breaker per named dependency. Orchestrators normally own a
//! private registry; [`CircuitBreakerRegistry::global`] exists for hosts that
//! want a single process-wide set.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::config::{BreakerHooks, CircuitBreakerConfig};
use super::metrics::CircuitBreakerMetricsSnapshot;
use super::state::CircuitBreaker;

static GLOBAL_REGISTRY: Lazy<CircuitBreakerRegistry> = Lazy::new(CircuitBreakerRegistry::new);

/// Named circuit breakers
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose implicitly created breakers use `config`
    pub fn with_default_config(config: CircuitBreakerConfig) -> Self {
        Self {
            default_config: config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static CircuitBreakerRegistry {
        &GLOBAL_REGISTRY
    }

    pub fn default_config(&self) -> &CircuitBreakerConfig {
        &self.default_config
    }

    /// Get the breaker for `name`, creating it with the default config
    pub fn get_instance(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create(name, self.default_config.clone())
    }

    /// Get the breaker for `name`, creating it with `config` on first use
    ///
    /// `config` is ignored when the breaker already exists.
    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        self.get_or_create_with(name, config, BreakerHooks::default())
    }

    /// Like [`get_or_create`](Self::get_or_create) with hooks for a new breaker
    pub fn get_or_create_with(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
        hooks: BreakerHooks,
    ) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().get(name) {
            return Arc::clone(existing);
        }

        let mut breakers = self.breakers.write();
        Arc::clone(breakers.entry(name.to_string()).or_insert_with(|| {
            debug!(breaker = %name, "Creating circuit breaker");
            CircuitBreaker::with_hooks(name, config, hooks)
        }))
    }

    /// Breaker preset for an HTTP-like dependency
    pub fn http(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create(name, CircuitBreakerConfig::http())
    }

    /// Breaker preset for a database-like dependency
    pub fn database(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create(name, CircuitBreakerConfig::database())
    }

    /// Breaker preset for a remote API dependency
    pub fn api(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create(name, CircuitBreakerConfig::api())
    }

    /// Look up an existing breaker without creating one
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(name).cloned()
    }

    /// Names of all registered breakers, sorted
    pub fn instance_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Metrics of every registered breaker
    pub fn all_metrics(&self) -> HashMap<String, CircuitBreakerMetricsSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> = self.breakers.read().values().cloned().collect();
        breakers
            .into_iter()
            .map(|b| (b.name().to_string(), b.metrics()))
            .collect()
    }

    /// Destroy and forget one breaker
    pub fn remove(&self, name: &str) -> bool {
        match self.breakers.write().remove(name) {
            Some(breaker) => {
                breaker.destroy();
                true
            }
            None => false,
        }
    }

    /// Destroy every breaker and empty the registry
    pub fn destroy_all(&self) {
        let drained: Vec<Arc<CircuitBreaker>> =
            self.breakers.write().drain().map(|(_, b)| b).collect();
        for breaker in &drained {
            breaker.destroy();
        }
        debug!(count = drained.len(), "Destroyed circuit breakers");
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }
}
