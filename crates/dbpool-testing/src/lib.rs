//! # dbpool-testing
//!
//! Test infrastructure for the connection pool.
//!
//! Provides an in-memory driver: [`MockConnector`] opens [`MockConnection`]s
//! and keeps a handle to each one so tests can inspect what the pool did
//! with them (statements forwarded, close calls, closed state). Failures can
//! be injected for a given connect attempt or for closing a given
//! connection.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbpool::Pool;
//! use dbpool_testing::{MockConnector, test_config};
//!
//! let connector = MockConnector::new().fail_close_of(2);
//! let pool = Pool::open(test_config(3), &connector).await?;
//! let err = pool.close_all().await.unwrap_err();
//! assert_eq!(err.len(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dbpool::{
    Connection, ConnectionError, ConnectionResult, Connector, Credentials, PoolConfig, Row, Value,
};
use parking_lot::Mutex;

/// Statement prefix that makes [`MockConnection::execute`] and
/// [`MockConnection::query`] fail.
pub const FAILING_STATEMENT: &str = "FAIL";

/// Target used by [`test_config`].
pub const TEST_TARGET: &str = "mock://localhost:5432/flights";

/// Build a pool configuration pointing at the mock driver.
#[must_use]
pub fn test_config(capacity: usize) -> PoolConfig {
    PoolConfig::new(TEST_TARGET, Credentials::new("test", "test")).capacity(capacity)
}

/// Install a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// An in-memory connection.
#[derive(Debug)]
pub struct MockConnection {
    id: usize,
    target: String,
    login: String,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    fail_close: bool,
    statements: Mutex<Vec<String>>,
}

impl MockConnection {
    fn new(id: usize, target: &str, login: &str, fail_close: bool) -> Self {
        Self {
            id,
            target: target.to_string(),
            login: login.to_string(),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            fail_close,
            statements: Mutex::new(Vec::new()),
        }
    }

    /// Open order, starting at 1. Matches the pool's connection id.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Target the connection was opened against.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Login the connection was opened with.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// How many times `close` reached this connection.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Every statement this connection has run, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    fn record(&self, statement: &str) -> ConnectionResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }
        self.statements.lock().push(statement.to_string());
        if statement.starts_with(FAILING_STATEMENT) {
            return Err(ConnectionError::Statement(format!(
                "mock failure on connection {}",
                self.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&self, sql: &str, params: &[Value]) -> ConnectionResult<u64> {
        tokio::task::yield_now().await;
        self.record(sql)?;
        Ok(params.len() as u64)
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> ConnectionResult<Vec<Row>> {
        tokio::task::yield_now().await;
        self.record(sql)?;
        Ok(vec![Row::new(
            vec!["connection_id".into()],
            vec![Value::Int(self.id as i64)],
        )])
    }

    async fn begin(&self) -> ConnectionResult<()> {
        self.record("BEGIN")
    }

    async fn commit(&self) -> ConnectionResult<()> {
        self.record("COMMIT")
    }

    async fn rollback(&self) -> ConnectionResult<()> {
        self.record("ROLLBACK")
    }

    async fn close(&self) -> ConnectionResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(ConnectionError::Close(format!(
                "mock close failure on connection {}",
                self.id
            )));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connector that opens [`MockConnection`]s.
#[derive(Debug, Default)]
pub struct MockConnector {
    attempts: AtomicUsize,
    fail_connect_at: Option<usize>,
    fail_close: HashSet<usize>,
    opened: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockConnector {
    /// Create a connector that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given connect attempt fail (1-based).
    #[must_use]
    pub fn fail_connect_at(mut self, attempt: usize) -> Self {
        self.fail_connect_at = Some(attempt);
        self
    }

    /// Make closing the given connection fail (1-based open order).
    #[must_use]
    pub fn fail_close_of(mut self, connection: usize) -> Self {
        self.fail_close.insert(connection);
        self
    }

    /// Number of connect attempts so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Every connection opened so far, in open order.
    #[must_use]
    pub fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.opened.lock().clone()
    }

    /// Look up an opened connection by id.
    #[must_use]
    pub fn connection(&self, id: usize) -> Option<Arc<MockConnection>> {
        self.opened.lock().iter().find(|c| c.id == id).cloned()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        target: &str,
        credentials: &Credentials,
    ) -> ConnectionResult<Box<dyn Connection>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_connect_at == Some(attempt) {
            tracing::debug!(attempt, "mock connect failure");
            return Err(ConnectionError::Connect {
                target: target.to_string(),
                reason: format!("mock refused attempt {attempt}"),
            });
        }

        let mut opened = self.opened.lock();
        let id = opened.len() + 1;
        let conn = Arc::new(MockConnection::new(
            id,
            target,
            credentials.login(),
            self.fail_close.contains(&id),
        ));
        opened.push(Arc::clone(&conn));
        Ok(Box::new(conn))
    }
}
