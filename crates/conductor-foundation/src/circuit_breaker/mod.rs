//! Circuit Breaker Pattern Implementation
//!
//! Guards calls to a named dependency (an agent capability) and stops
//! invoking it once it keeps failing. It includes:
//! - Circuit breaker state machine (closed, open, half-open)
//! - Bounded retry with a fixed delay that never retries into an open circuit
//! - Preset configurations for common dependency classes
//! - Metrics snapshots and state transition history
//! - A registry holding one breaker per dependency name
//!
//! # Architecture
//!
//! ```text
//!     +---------+   failure threshold   +--------+
//!     | CLOSED  | --------------------> |  OPEN  | <------+
//!     +---------+                       +--------+        |
//!          ^                                 |            |
//!          |                   reset timeout |            | any failure
//!          |                                 v            |
//!          |  success threshold      +-------------+      |
//!          +------------------------ |  HALF-OPEN  | -----+
//!                                    +-------------+
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use conductor_foundation::circuit_breaker::{CircuitBreakerRegistry, CircuitBreakerConfig};
//!
//! let registry = CircuitBreakerRegistry::new();
//! let breaker = registry.get_or_create("code_analysis", CircuitBreakerConfig::api());
//!
//! let output = breaker.call_with_retry(|| agent.execute(input.clone())).await?;
//! ```

pub mod config;
pub mod metrics;
pub mod registry;
pub mod state;

pub use config::{BreakerHooks, CircuitBreakerConfig, ErrorFilter, StateChangeHook};
pub use metrics::{CircuitBreakerMetricsSnapshot, StateTransition};
pub use registry::CircuitBreakerRegistry;
pub use state::{CircuitBreaker, CircuitBreakerError, State};
