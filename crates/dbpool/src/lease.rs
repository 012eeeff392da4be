//! Leased connections.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::connection::{Connection, ConnectionResult};
use crate::error::ConnectionError;
use crate::lifecycle::{ConnectionMetadata, ConnectionState, PhysicalConnection};
use crate::pool::PoolInner;
use crate::types::{Row, Value};

/// A connection leased from the pool.
///
/// Implements [`Connection`] by forwarding to the physical connection,
/// except for [`close`](Connection::close), which hands the physical
/// connection back to the pool instead of closing it. Calling
/// [`release`](LeasedConnection::release) or dropping the lease does the
/// same.
///
/// A lease is single-use. After release every forwarded operation fails
/// with [`ConnectionError::Closed`] and further releases do nothing.
///
/// Releasing does not wait for operations already forwarded through the
/// lease. When a lease is shared (for example behind an `Arc`), the caller
/// must not close it while another task still has an operation in flight
/// on it: the physical connection may be leased to someone else before
/// that operation finishes.
pub struct LeasedConnection {
    physical: Mutex<Option<Arc<PhysicalConnection>>>,
    pool: Arc<PoolInner>,
}

impl LeasedConnection {
    pub(crate) fn new(physical: Arc<PhysicalConnection>, pool: Arc<PoolInner>) -> Self {
        Self {
            physical: Mutex::new(Some(physical)),
            pool,
        }
    }

    /// Id of the physical connection behind this lease.
    ///
    /// Returns `None` once the lease has been released.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.physical.lock().as_ref().map(|p| p.id())
    }

    /// Metadata of the physical connection behind this lease.
    #[must_use]
    pub fn metadata(&self) -> Option<ConnectionMetadata> {
        self.physical.lock().as_ref().map(|p| p.metadata())
    }

    /// How many times the physical connection has been leased, this lease
    /// included.
    #[must_use]
    pub fn lease_count(&self) -> Option<u64> {
        self.physical.lock().as_ref().map(|p| p.lease_count())
    }

    /// Lifecycle state of the physical connection behind this lease.
    ///
    /// Reads [`ConnectionState::Leased`] while the lease is held and
    /// [`ConnectionState::Closed`] once shutdown has closed the connection.
    /// Returns `None` once the lease has been released.
    #[must_use]
    pub fn state(&self) -> Option<ConnectionState> {
        self.physical.lock().as_ref().map(|p| p.state())
    }

    /// Whether this lease has already been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.physical.lock().is_none()
    }

    /// Return the connection to the pool.
    pub fn release(self) {
        // Drop does the work.
    }

    fn handle(&self) -> ConnectionResult<Arc<PhysicalConnection>> {
        self.physical.lock().clone().ok_or(ConnectionError::Closed)
    }

    fn return_to_pool(&self) {
        let physical = self.physical.lock().take();
        if let Some(physical) = physical {
            self.pool.release(physical);
        }
    }
}

#[async_trait]
impl Connection for LeasedConnection {
    async fn execute(&self, sql: &str, params: &[Value]) -> ConnectionResult<u64> {
        self.handle()?.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> ConnectionResult<Vec<Row>> {
        self.handle()?.query(sql, params).await
    }

    async fn begin(&self) -> ConnectionResult<()> {
        self.handle()?.begin().await
    }

    async fn commit(&self) -> ConnectionResult<()> {
        self.handle()?.commit().await
    }

    async fn rollback(&self) -> ConnectionResult<()> {
        self.handle()?.rollback().await
    }

    /// Return the physical connection to the pool. It stays open.
    async fn close(&self) -> ConnectionResult<()> {
        self.return_to_pool();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.physical
            .lock()
            .as_ref()
            .is_none_or(|p| p.is_closed())
    }
}

impl Drop for LeasedConnection {
    fn drop(&mut self) {
        self.return_to_pool();
    }
}

impl std::fmt::Debug for LeasedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeasedConnection")
            .field("physical", &*self.physical.lock())
            .finish()
    }
}
