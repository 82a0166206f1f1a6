//! Error types for racewatch core.

use racewatch_monitor::Violation;
use thiserror::Error;

/// Core error type for racewatch operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A conflicting concurrent access was detected.
    ///
    /// This is the monitor's designed output, not an internal failure:
    /// it propagates to the caller exactly like any other error.
    #[error(transparent)]
    Violation(#[from] Violation),

    /// Configuration could not be parsed or was invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Core result type for racewatch operations.
pub type Result<T> = std::result::Result<T, CoreError>;
