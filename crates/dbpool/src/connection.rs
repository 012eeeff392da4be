//! Connection capability and connector seam.
//!
//! [`Connection`] is the capability set of a physical connection. A driver
//! implements it for its own handle, and [`LeasedConnection`] implements it
//! too, forwarding every call except [`Connection::close`].
//!
//! [`LeasedConnection`]: crate::LeasedConnection

use std::sync::Arc;

use async_trait::async_trait;
use dbpool_config::Credentials;

use crate::error::ConnectionError;
use crate::types::{Row, Value};

/// Result type for connection operations.
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// Operations available on an open database connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a statement that does not return rows.
    ///
    /// Returns the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> ConnectionResult<u64>;

    /// Execute a query and return its rows.
    async fn query(&self, sql: &str, params: &[Value]) -> ConnectionResult<Vec<Row>>;

    /// Begin a transaction.
    async fn begin(&self) -> ConnectionResult<()>;

    /// Commit the current transaction.
    async fn commit(&self) -> ConnectionResult<()>;

    /// Roll back the current transaction.
    async fn rollback(&self) -> ConnectionResult<()>;

    /// Close the connection.
    async fn close(&self) -> ConnectionResult<()>;

    /// Whether the connection has been closed.
    fn is_closed(&self) -> bool;
}

#[async_trait]
impl<T: Connection + ?Sized> Connection for Arc<T> {
    async fn execute(&self, sql: &str, params: &[Value]) -> ConnectionResult<u64> {
        (**self).execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> ConnectionResult<Vec<Row>> {
        (**self).query(sql, params).await
    }

    async fn begin(&self) -> ConnectionResult<()> {
        (**self).begin().await
    }

    async fn commit(&self) -> ConnectionResult<()> {
        (**self).commit().await
    }

    async fn rollback(&self) -> ConnectionResult<()> {
        (**self).rollback().await
    }

    async fn close(&self) -> ConnectionResult<()> {
        (**self).close().await
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// Factory for physical connections.
///
/// The pool calls [`connect`](Connector::connect) exactly `capacity` times
/// while opening and never afterwards.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new physical connection.
    async fn connect(
        &self,
        target: &str,
        credentials: &Credentials,
    ) -> ConnectionResult<Box<dyn Connection>>;
}

#[async_trait]
impl<T: Connector + ?Sized> Connector for Arc<T> {
    async fn connect(
        &self,
        target: &str,
        credentials: &Credentials,
    ) -> ConnectionResult<Box<dyn Connection>> {
        (**self).connect(target, credentials).await
    }
}
