//! Error types for lock-controlled operations.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while acquiring or releasing a lock around an operation.
#[derive(Error, Debug, Clone)]
pub enum LockError {
    /// The lock for this subkey is held elsewhere and no poll interval is configured.
    ///
    /// The inner error is built once per wrapped operation and shared by every call.
    #[error(transparent)]
    Contention(Arc<dyn std::error::Error + Send + Sync>),

    /// The controller has started its shutdown drain; no more locks are handed out.
    #[error("process exiting")]
    ProcessExiting,

    /// `wrap` was called without a lock path.
    #[error("lock path must not be empty")]
    InvalidPath,

    /// Store connection or configuration failed.
    #[error("connection error: {0}")]
    Connection(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// A store command failed.
    #[error("backend error: {0}")]
    Backend(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl LockError {
    /// Wraps a store command failure.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }

    /// Wraps a store connection failure.
    pub fn connection(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Connection(Arc::new(err))
    }

    /// Returns true for [`LockError::Contention`].
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Contention(_))
    }

    /// Returns true for [`LockError::ProcessExiting`].
    pub fn is_exiting(&self) -> bool {
        matches!(self, Self::ProcessExiting)
    }

    /// Returns the shared contention error, if this is one.
    pub fn contention(&self) -> Option<&Arc<dyn std::error::Error + Send + Sync>> {
        match self {
            Self::Contention(err) => Some(err),
            _ => None,
        }
    }
}

/// The contention error produced by the default error factory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("operation `{path}` is already running (minimum hold {minimum_hold:?})")]
pub struct ContentionError {
    /// Lock path of the wrapped operation.
    pub path: String,
    /// Minimum hold configured for the wrapped operation.
    pub minimum_hold: Duration,
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
