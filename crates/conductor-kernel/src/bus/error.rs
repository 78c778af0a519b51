//! Typed errors for lifecycle event publishing.

use thiserror::Error;

/// Errors that can occur while publishing lifecycle events.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BusError {
    /// The event failed validation and was not published.
    #[error("Invalid event '{event_type}': {reason}")]
    InvalidEvent { event_type: String, reason: String },

    /// Sending the event through a bus channel failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
