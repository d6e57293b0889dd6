//! Harness-level error taxonomy.
//!
//! Transport failures and session setup problems are hard scenario
//! failures; allow-listed HTTP statuses never appear here — they are data
//! for the invariant layer.

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::invariants::Violation;
use crate::session::SessionError;

/// Result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Transport-level failure (DNS, refused connection, timeout).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Session establishment or rotation failed outright.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An invariant was violated.
    #[error(transparent)]
    Invariant(#[from] Violation),

    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Scenario preconditions could not be established.
    #[error("scenario setup failed: {0}")]
    Setup(String),
}
