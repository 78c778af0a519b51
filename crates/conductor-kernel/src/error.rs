//! Crate-level error types for `conductor-kernel`.
//!
//! Provides a unified [`KernelError`] that composes errors from every
//! sub-module (agent, bus, orchestration, config, IO, serialization) together
//! with [`error_stack::Report`] for context-carrying error propagation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use conductor_kernel::error::{KernelError, KernelResult};
//! use error_stack::ResultExt;
//!
//! fn read_workflow_file(path: &str) -> KernelResult<String> {
//!     std::fs::read_to_string(path)
//!         .map_err(KernelError::from)
//!         .map_err(error_stack::Report::new)
//!         .attach(format!("reading {path}"))
//! }
//! ```

use crate::agent::AgentError;
use crate::bus::BusError;
use crate::workflow::OrchestratorError;
use thiserror::Error;

/// Crate-level error type for `conductor-kernel`.
///
/// Wraps each sub-module's typed error via `#[from]` so that the `?`
/// operator converts them automatically.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KernelError {
    /// An error originating from an agent.
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// An orchestration error.
    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// A lifecycle event bus error.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// A configuration-related error (requires the `config` feature).
    #[cfg(feature = "config")]
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal / untyped error described by a message string.
    #[error("{0}")]
    Internal(String),
}

/// Convenience result alias using [`error_stack::Report`].
///
/// Equivalent to `Result<T, error_stack::Report<KernelError>>`.
pub type KernelResult<T> = Result<T, error_stack::Report<KernelError>>;

/// Extension trait to convert any `Result<T, E>` with `E: Into<KernelError>`
/// into [`KernelResult<T>`].
pub trait IntoKernelReport<T> {
    /// Wrap the error in an `error_stack::Report`.
    fn into_report(self) -> KernelResult<T>;
}

impl<T, E> IntoKernelReport<T> for Result<T, E>
where
    E: Into<KernelError>,
{
    #[inline]
    fn into_report(self) -> KernelResult<T> {
        self.map_err(|e| error_stack::Report::new(e.into()))
    }
}
