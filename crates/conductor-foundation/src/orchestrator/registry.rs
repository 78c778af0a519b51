//! Agent registry keyed by capability

use conductor_kernel::agent::Agent;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Registered agents, one per capability
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its capability, returning any agent it replaced
    pub fn register(&self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        let capability = agent.capability().to_string();
        let previous = self.agents.write().insert(capability.clone(), agent);
        if previous.is_some() {
            warn!(capability = %capability, "Replaced registered agent");
        } else {
            info!(capability = %capability, "Registered agent");
        }
        previous
    }

    pub fn unregister(&self, capability: &str) -> Option<Arc<dyn Agent>> {
        self.agents.write().remove(capability)
    }

    pub fn get(&self, capability: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().get(capability).cloned()
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.agents.read().contains_key(capability)
    }

    /// Registered capability names, sorted
    pub fn capabilities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
