//! Error types for the connection pool.

use std::fmt;
use std::time::Duration;

use dbpool_config::ConfigError;
use thiserror::Error;

/// Errors reported by a physical connection or by a lease forwarding to one.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection has been closed, either by shutdown or because the
    /// lease was already released.
    #[error("connection closed")]
    Closed,

    /// Establishing the connection failed.
    #[error("failed to connect to {target}: {reason}")]
    Connect {
        /// Connection target.
        target: String,
        /// Driver-supplied reason.
        reason: String,
    },

    /// A statement failed to execute.
    #[error("statement failed: {0}")]
    Statement(String),

    /// Beginning, committing or rolling back failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Closing the connection failed.
    #[error("close failed: {0}")]
    Close(String),

    /// IO error from the underlying transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Pool configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Opening the fixed set of connections failed.
    ///
    /// Every connection opened before the failure has been closed.
    #[error("pool initialization failed after opening {opened} of {capacity} connections: {source}")]
    Initialization {
        /// Connections successfully opened before the failure.
        opened: usize,
        /// Configured capacity.
        capacity: usize,
        /// The connect failure.
        #[source]
        source: ConnectionError,
    },

    /// The caller cancelled a waiting acquire.
    #[error("acquire interrupted")]
    Interrupted,

    /// No connection became available within the given time.
    #[error("timed out after {0:?} waiting for a connection")]
    Timeout(Duration),

    /// The pool has been shut down.
    #[error("pool is closed")]
    PoolClosed,
}

impl PoolError {
    /// Whether retrying the same operation on the same pool can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Interrupted | Self::Timeout(_))
    }
}

/// Failures collected while shutting the pool down.
///
/// Holds one entry per connection whose close failed, in connection order.
#[derive(Debug)]
pub struct AggregateCloseError {
    failures: Vec<(u64, ConnectionError)>,
}

impl AggregateCloseError {
    pub(crate) fn new(failures: Vec<(u64, ConnectionError)>) -> Self {
        Self { failures }
    }

    /// The individual failures as `(connection id, error)` pairs.
    #[must_use]
    pub fn failures(&self) -> &[(u64, ConnectionError)] {
        &self.failures
    }

    /// Number of connections that failed to close.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Whether no failures were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Consume the error, returning the individual failures.
    #[must_use]
    pub fn into_failures(self) -> Vec<(u64, ConnectionError)> {
        self.failures
    }
}

impl fmt::Display for AggregateCloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} connection(s) failed to close", self.failures.len())?;
        for (id, err) in &self.failures {
            write!(f, "; connection {id}: {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateCloseError {}

/// Result type for pool operations.
pub type Result<T, E = PoolError> = std::result::Result<T, E>;
