//! Connection pool implementation.
//!
//! The pool opens a fixed number of physical connections up front and never
//! opens more. Idle connections sit in the available set, a queue guarded by
//! a mutex and gated by a semaphore holding exactly one permit per queued
//! connection. Waiting on the semaphore is FIFO-fair, so every waiter is
//! eventually served while leases keep being released.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dbpool_config::PoolConfig;
use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;

use crate::connection::Connector;
use crate::error::{AggregateCloseError, ConnectionError, PoolError, Result};
use crate::lease::LeasedConnection;
use crate::lifecycle::PhysicalConnection;

/// A fixed-capacity connection pool.
///
/// `Pool` is a cheap handle; clones share the same connections. Pass it to
/// whatever needs database access and call [`close_all`](Pool::close_all)
/// once at shutdown.
///
/// # Example
///
/// ```rust,ignore
/// use dbpool::{Connection, Pool, PoolConfig};
///
/// let pool = Pool::open(config, &connector).await?;
///
/// let conn = pool.acquire().await?;
/// conn.execute("DELETE FROM ticket WHERE id = $1", &[42.into()]).await?;
/// conn.close().await?; // back to the pool, still open
///
/// pool.close_all().await?;
/// ```
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    /// Pool configuration.
    config: PoolConfig,

    /// Every physical connection, in open order. Used only for shutdown.
    connections: Vec<Arc<PhysicalConnection>>,

    /// Connections not currently leased.
    available: Mutex<VecDeque<Arc<PhysicalConnection>>>,

    /// One permit per entry in `available`.
    permits: Semaphore,

    /// Leases handed out and not yet returned.
    leased: AtomicUsize,

    /// Whether shutdown has started.
    closed: AtomicBool,

    /// When the pool was opened.
    created_at: Instant,

    /// Pool metrics.
    metrics: Mutex<PoolMetricsInner>,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    /// Physical connections opened.
    connections_opened: u64,
    /// Physical connections closed by shutdown.
    connections_closed: u64,
    /// Successful checkouts.
    checkouts_successful: u64,
    /// Checkouts that gave up (interrupted, timed out, pool closed).
    checkouts_failed: u64,
    /// Leases returned to the available set.
    releases: u64,
    /// Leases released after shutdown started.
    releases_after_close: u64,
}

impl Pool {
    /// Open the pool, establishing `config.capacity` connections.
    ///
    /// Connections are opened one after another. If any attempt fails, the
    /// connections opened so far are closed and
    /// [`PoolError::Initialization`] is returned.
    pub async fn open<C>(config: PoolConfig, connector: &C) -> Result<Self>
    where
        C: Connector + ?Sized,
    {
        config.validate()?;
        let capacity = config.capacity;

        let mut connections = Vec::with_capacity(capacity);
        for index in 0..capacity {
            match connector.connect(&config.target, &config.credentials).await {
                Ok(conn) => {
                    let id = index as u64 + 1;
                    tracing::trace!(connection_id = id, "opened physical connection");
                    connections.push(Arc::new(PhysicalConnection::new(id, conn)));
                }
                Err(source) => {
                    let opened = connections.len();
                    tracing::debug!(
                        url = %config.target,
                        opened,
                        capacity,
                        error = %source,
                        "pool initialization failed, closing opened connections"
                    );
                    close_connections(&connections).await;
                    return Err(PoolError::Initialization {
                        opened,
                        capacity,
                        source,
                    });
                }
            }
        }

        let inner = Arc::new(PoolInner {
            available: Mutex::new(connections.iter().cloned().collect()),
            permits: Semaphore::new(capacity),
            leased: AtomicUsize::new(0),
            connections,
            closed: AtomicBool::new(false),
            created_at: Instant::now(),
            metrics: Mutex::new(PoolMetricsInner {
                connections_opened: capacity as u64,
                ..PoolMetricsInner::default()
            }),
            config,
        });

        tracing::info!(
            url = %inner.config.target,
            capacity,
            "connection pool opened"
        );

        Ok(Self { inner })
    }

    /// Lease a connection, waiting until one is available.
    ///
    /// Dropping the returned future before it completes takes nothing from
    /// the pool. Fails with [`PoolError::PoolClosed`] once shutdown starts,
    /// including for callers that are already waiting.
    pub async fn acquire(&self) -> Result<LeasedConnection> {
        tracing::trace!("acquiring connection from pool");

        match self.inner.permits.acquire().await {
            Ok(permit) => self.inner.checkout(permit),
            Err(_) => {
                self.inner.metrics.lock().checkouts_failed += 1;
                Err(PoolError::PoolClosed)
            }
        }
    }

    /// Lease a connection unless `cancel` fires first.
    ///
    /// On cancellation this returns [`PoolError::Interrupted`] and the
    /// available set is left untouched.
    pub async fn acquire_cancellable(&self, cancel: &CancellationToken) -> Result<LeasedConnection> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.inner.metrics.lock().checkouts_failed += 1;
                tracing::trace!("acquire interrupted");
                Err(PoolError::Interrupted)
            }
            lease = self.acquire() => lease,
        }
    }

    /// Lease a connection, giving up after `timeout`.
    ///
    /// On timeout this returns [`PoolError::Timeout`] and the available set
    /// is left untouched.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<LeasedConnection> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(lease) => lease,
            Err(_) => {
                self.inner.metrics.lock().checkouts_failed += 1;
                tracing::trace!(timeout = ?timeout, "acquire timed out");
                Err(PoolError::Timeout(timeout))
            }
        }
    }

    /// Lease a connection without waiting.
    ///
    /// Returns `None` if no connection is immediately available.
    pub fn try_acquire(&self) -> Result<Option<LeasedConnection>> {
        match self.inner.permits.try_acquire() {
            Ok(permit) => self.inner.checkout(permit).map(Some),
            Err(tokio::sync::TryAcquireError::NoPermits) => Ok(None),
            Err(tokio::sync::TryAcquireError::Closed) => Err(PoolError::PoolClosed),
        }
    }

    /// Close every physical connection the pool owns.
    ///
    /// Leased connections are closed too; their later release is ignored
    /// and operations forwarded through them fail with
    /// [`ConnectionError::Closed`]. Every connection is attempted even if
    /// some fail, and all failures are returned together. Calling this again
    /// does nothing.
    pub async fn close_all(&self) -> std::result::Result<(), AggregateCloseError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.inner.permits.close();
        self.inner.available.lock().clear();

        let failures = close_connections(&self.inner.connections).await;
        let closed = self.inner.connections.len() - failures.len();
        self.inner.metrics.lock().connections_closed += closed as u64;

        tracing::info!(
            closed,
            failed = failures.len(),
            "connection pool closed"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateCloseError::new(failures))
        }
    }

    /// Whether shutdown has started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let capacity = self.inner.config.capacity;
        let closed = self.is_closed();
        let available = self.inner.available.lock().len();
        let leased = self.inner.leased.load(Ordering::Acquire);

        PoolStatus {
            available,
            leased,
            capacity,
            closed,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            connections_opened: inner.connections_opened,
            connections_closed: inner.connections_closed,
            checkouts_successful: inner.checkouts_successful,
            checkouts_failed: inner.checkouts_failed,
            releases: inner.releases,
            releases_after_close: inner.releases_after_close,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("target", &self.inner.config.target)
            .field("status", &self.status())
            .finish()
    }
}

impl PoolInner {
    /// Take one connection from the available set under a held permit.
    fn checkout(self: &Arc<Self>, permit: SemaphorePermit<'_>) -> Result<LeasedConnection> {
        let physical = self.available.lock().pop_front();

        let Some(physical) = physical else {
            // Permits never outnumber queued connections, except while
            // shutdown is clearing the queue.
            self.metrics.lock().checkouts_failed += 1;
            return Err(PoolError::PoolClosed);
        };

        // The permit now travels with the lease and is restored on release.
        permit.forget();
        physical.mark_leased();
        self.leased.fetch_add(1, Ordering::AcqRel);
        self.metrics.lock().checkouts_successful += 1;

        tracing::trace!(connection_id = physical.id(), "leased connection");
        Ok(LeasedConnection::new(physical, Arc::clone(self)))
    }

    /// Put a released connection back into the available set.
    pub(crate) fn release(&self, physical: Arc<PhysicalConnection>) {
        self.leased.fetch_sub(1, Ordering::AcqRel);

        if self.closed.load(Ordering::Acquire) {
            self.metrics.lock().releases_after_close += 1;
            tracing::trace!(
                connection_id = physical.id(),
                "ignoring release after pool shutdown"
            );
            return;
        }

        physical.mark_available();
        let id = physical.id();
        {
            let mut available = self.available.lock();
            // Shutdown may have begun since the check above; `close_all`
            // clears the queue under this lock after setting `closed`.
            if self.closed.load(Ordering::Acquire) {
                drop(available);
                self.metrics.lock().releases_after_close += 1;
                return;
            }
            available.push_back(physical);
        }
        self.permits.add_permits(1);
        self.metrics.lock().releases += 1;

        tracing::trace!(connection_id = id, "returned connection to pool");
    }
}

/// Close connections concurrently, returning every failure.
async fn close_connections(connections: &[Arc<PhysicalConnection>]) -> Vec<(u64, ConnectionError)> {
    let results = join_all(connections.iter().map(|conn| async move {
        (conn.id(), conn.close().await)
    }))
    .await;

    results
        .into_iter()
        .filter_map(|(id, result)| match result {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(connection_id = id, error = %err, "failed to close connection");
                Some((id, err))
            }
        })
        .collect()
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections in the available set.
    pub available: usize,
    /// Leases handed out and not yet released. Counted separately from
    /// `available`, and still reported after shutdown.
    pub leased: usize,
    /// Configured capacity.
    pub capacity: usize,
    /// Whether shutdown has started.
    pub closed: bool,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.leased as f64 / self.capacity as f64) * 100.0
    }

    /// Check if every connection is leased.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.available == 0
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Physical connections opened.
    pub connections_opened: u64,
    /// Physical connections closed by shutdown.
    pub connections_closed: u64,
    /// Successful checkouts.
    pub checkouts_successful: u64,
    /// Failed checkouts (interrupted, timed out, pool closed).
    pub checkouts_failed: u64,
    /// Leases returned to the available set.
    pub releases: u64,
    /// Leases released after shutdown started.
    pub releases_after_close: u64,
    /// Time since the pool was opened.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_status_utilization() {
        let status = PoolStatus {
            available: 5,
            leased: 5,
            capacity: 10,
            closed: false,
        };
        assert!((status.utilization() - 50.0).abs() < f64::EPSILON);
        assert!(!status.is_exhausted());
    }

    #[test]
    fn test_pool_status_exhausted() {
        let status = PoolStatus {
            available: 0,
            leased: 4,
            capacity: 4,
            closed: false,
        };
        assert!(status.is_exhausted());
        assert!((status.utilization() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pool_metrics_success_rate() {
        let metrics = PoolMetrics {
            connections_opened: 10,
            connections_closed: 0,
            checkouts_successful: 90,
            checkouts_failed: 10,
            releases: 88,
            releases_after_close: 0,
            uptime: Duration::from_secs(3600),
        };
        assert!((metrics.checkout_success_rate() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pool_metrics_no_checkouts() {
        let metrics = PoolMetrics {
            connections_opened: 1,
            connections_closed: 0,
            checkouts_successful: 0,
            checkouts_failed: 0,
            releases: 0,
            releases_after_close: 0,
            uptime: Duration::ZERO,
        };
        assert!((metrics.checkout_success_rate() - 1.0).abs() < f64::EPSILON);
    }
}
