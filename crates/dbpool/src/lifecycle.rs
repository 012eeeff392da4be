//! Lifecycle of a physical connection.
//!
//! Each physical connection moves through
//! `Available → Leased → Available → … → Closed`. `Closed` is terminal: once
//! shutdown has closed a connection, every forwarded operation fails with
//! [`ConnectionError::Closed`].

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Instant;

use crate::connection::{Connection, ConnectionResult};
use crate::error::ConnectionError;
use crate::types::{Row, Value};

/// State of a physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// In the available set, ready to be leased.
    Available,
    /// Leased to exactly one caller.
    Leased,
    /// Closed by the pool. Terminal.
    Closed,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Available => 0,
            Self::Leased => 1,
            Self::Closed => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Available,
            1 => Self::Leased,
            _ => Self::Closed,
        }
    }
}

/// Identity and bookkeeping for a physical connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionMetadata {
    /// Pool-unique id, assigned in open order starting at 1.
    pub id: u64,
    /// When the physical connection was opened.
    pub created_at: Instant,
}

/// A physical connection owned by the pool.
///
/// Only the pool closes it for real. Leases reach the driver handle through
/// [`PhysicalConnection::open_handle`], which refuses once closed.
pub(crate) struct PhysicalConnection {
    metadata: ConnectionMetadata,
    state: AtomicU8,
    lease_count: AtomicU64,
    conn: Box<dyn Connection>,
}

impl PhysicalConnection {
    pub(crate) fn new(id: u64, conn: Box<dyn Connection>) -> Self {
        Self {
            metadata: ConnectionMetadata {
                id,
                created_at: Instant::now(),
            },
            state: AtomicU8::new(ConnectionState::Available.as_u8()),
            lease_count: AtomicU64::new(0),
            conn,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.metadata.id
    }

    pub(crate) fn metadata(&self) -> ConnectionMetadata {
        self.metadata
    }

    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn lease_count(&self) -> u64 {
        self.lease_count.load(Ordering::Relaxed)
    }

    /// Move `from → to` unless the connection is already closed.
    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn mark_leased(&self) -> bool {
        let leased = self.transition(ConnectionState::Available, ConnectionState::Leased);
        if leased {
            self.lease_count.fetch_add(1, Ordering::Relaxed);
        }
        leased
    }

    pub(crate) fn mark_available(&self) -> bool {
        self.transition(ConnectionState::Leased, ConnectionState::Available)
    }

    /// The driver handle, if the connection has not been closed.
    pub(crate) fn open_handle(&self) -> ConnectionResult<&dyn Connection> {
        if self.state() == ConnectionState::Closed {
            return Err(ConnectionError::Closed);
        }
        Ok(self.conn.as_ref())
    }

    /// Close the driver handle. A second call is a no-op.
    pub(crate) async fn close(&self) -> ConnectionResult<()> {
        let previous = self
            .state
            .swap(ConnectionState::Closed.as_u8(), Ordering::AcqRel);
        if ConnectionState::from_u8(previous) == ConnectionState::Closed {
            return Ok(());
        }
        self.conn.close().await
    }

    pub(crate) async fn execute(&self, sql: &str, params: &[Value]) -> ConnectionResult<u64> {
        self.open_handle()?.execute(sql, params).await
    }

    pub(crate) async fn query(&self, sql: &str, params: &[Value]) -> ConnectionResult<Vec<Row>> {
        self.open_handle()?.query(sql, params).await
    }

    pub(crate) async fn begin(&self) -> ConnectionResult<()> {
        self.open_handle()?.begin().await
    }

    pub(crate) async fn commit(&self) -> ConnectionResult<()> {
        self.open_handle()?.commit().await
    }

    pub(crate) async fn rollback(&self) -> ConnectionResult<()> {
        self.open_handle()?.rollback().await
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed || self.conn.is_closed()
    }
}

impl std::fmt::Debug for PhysicalConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalConnection")
            .field("id", &self.metadata.id)
            .field("state", &self.state())
            .field("lease_count", &self.lease_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;

    struct CountingConnection {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connection for CountingConnection {
        async fn execute(&self, _sql: &str, _params: &[Value]) -> ConnectionResult<u64> {
            Ok(1)
        }

        async fn query(&self, _sql: &str, _params: &[Value]) -> ConnectionResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn begin(&self) -> ConnectionResult<()> {
            Ok(())
        }

        async fn commit(&self) -> ConnectionResult<()> {
            Ok(())
        }

        async fn rollback(&self) -> ConnectionResult<()> {
            Ok(())
        }

        async fn close(&self) -> ConnectionResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    fn physical() -> (PhysicalConnection, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let conn = CountingConnection {
            closes: Arc::clone(&closes),
        };
        (PhysicalConnection::new(1, Box::new(conn)), closes)
    }

    #[test]
    fn test_state_transitions() {
        let (conn, _) = physical();
        assert_eq!(conn.state(), ConnectionState::Available);

        assert!(conn.mark_leased());
        assert!(!conn.mark_leased());
        assert_eq!(conn.state(), ConnectionState::Leased);
        assert_eq!(conn.lease_count(), 1);

        assert!(conn.mark_available());
        assert!(!conn.mark_available());
        assert_eq!(conn.state(), ConnectionState::Available);
    }

    #[tokio::test]
    async fn test_closed_is_terminal() {
        let (conn, closes) = physical();
        assert_eq!(conn.execute("UPDATE seat SET x = 1", &[]).await.unwrap(), 1);

        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        assert!(conn.is_closed());
        assert!(!conn.mark_leased());
        assert!(!conn.mark_available());
        assert!(matches!(
            conn.execute("SELECT 1", &[]).await,
            Err(ConnectionError::Closed)
        ));
        assert!(matches!(conn.commit().await, Err(ConnectionError::Closed)));
    }
}
