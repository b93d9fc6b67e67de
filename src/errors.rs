//! Controller Error Hierarchy
//!
//! Steady-state failures (reconcile errors, malformed notifications) are
//! contained inside the worker/queue retry cycle. Only startup cache-sync
//! failures and shutdown plumbing cross the [`Controller::run`] boundary.
//!
//! [`Controller::run`]: crate::Controller::run

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or parsing failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Semantically invalid configuration values
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Object identity could not be turned into a key
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Reconcile pass failed
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// The local cache never finished its initial listing
    #[error("Cache sync failed: {reason}")]
    CacheSyncFailed { reason: String },

    /// Event source run loop stopped with an error
    #[error("Event source failed: {0}")]
    SourceFailed(String),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("{0}")]
    SignalSenderClosed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Failures deriving a key from an object or parsing one back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("object has no name")]
    MissingName,

    #[error("unexpected key format: {0:?}")]
    InvalidKey(String),
}

/// Failures returned by a [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// Recoverable failure, retried with backoff
    #[error("reconcile failed: {0}")]
    Failed(String),

    /// Reconcile exceeded its deadline
    #[error("reconcile timed out after {0:?}")]
    Timeout(Duration),

    /// The reconcile future panicked; recovered at the worker boundary
    #[error("reconcile panicked: {0}")]
    Panicked(String),
}

impl ReconcileError {
    pub fn failed(msg: impl Into<String>) -> Self {
        ReconcileError::Failed(msg.into())
    }
}
