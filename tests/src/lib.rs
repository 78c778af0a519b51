//! Conductor Testing Framework
//!
//! Provides test doubles for agents and the event bus so that workflows can
//! be exercised deterministically without real capabilities behind them.

pub mod agent;
pub mod bus;

pub use agent::{MockAgent, MockOutcome};
pub use bus::RecordingEventBus;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber
///
/// Honors `RUST_LOG` and defaults to `warn`. Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
