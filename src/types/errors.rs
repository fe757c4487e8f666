//! Application error types.
//!
//! Routing misses and unmatched messages are never errors. What remains is
//! agent construction, the reserved state contract, and the optional cycle cap.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the agent kernel.
#[derive(Error, Debug)]
pub enum Error {
    /// An agent factory failed; nothing was registered.
    #[error("agent construction failed: {0}")]
    Construction(String),

    /// A client state reused one of the reserved names (`listen`, `halt`).
    #[error("reserved state name: {0}")]
    ReservedState(String),

    /// The run exceeded the configured `max_cycles`.
    #[error("cycle limit of {0} reached with agents still registered")]
    CycleLimit(u64),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl Error {
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    pub fn reserved_state(msg: impl Into<String>) -> Self {
        Self::ReservedState(msg.into())
    }
}
