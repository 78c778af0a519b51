//! Conductor Kernel
//!
//! Contracts shared by every layer of the workflow engine:
//!
//! - [`agent`]: the single polymorphic [`Agent`](agent::Agent) capability contract
//! - [`bus`]: typed lifecycle events and the [`EventBus`](bus::EventBus) contract
//! - [`workflow`]: run status / run metrics value types and the orchestrator error taxonomy
//! - [`error`]: the crate-level [`KernelError`](error::KernelError) with `error-stack` reports
//! - [`config`]: multi-format configuration loading (feature `config`)

// agent module
pub mod agent;
pub use agent::{Agent, AgentError, AgentResult};

// bus module
pub mod bus;
pub use bus::{BroadcastEventBus, BusError, EventBus, WorkflowEvent};

// workflow module
pub mod workflow;
pub use workflow::{OrchestratorError, OrchestratorResult, RunMetrics, RunStatus};

// error module
pub mod error;
pub use error::{IntoKernelReport, KernelError, KernelResult};

// config module
#[cfg(feature = "config")]
pub mod config;
