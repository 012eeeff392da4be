//! # dbpool
//!
//! Fixed-capacity connection pool with transparent release.
//!
//! The pool opens exactly `capacity` physical connections when it is
//! created and keeps them for its whole life. Callers lease a connection,
//! use it through the [`Connection`] trait, and call
//! [`close`](Connection::close) when done. On a lease that call puts the
//! physical connection back into the pool instead of closing it, so code
//! written against a plain connection works unchanged with a pooled one.
//! Only [`Pool::close_all`] closes physical connections for real.
//!
//! ## Features
//!
//! - All connections opened up front; open is all-or-nothing
//! - FIFO-fair waiting when every connection is leased
//! - Cancellation via `CancellationToken`, timeouts, and non-blocking acquire
//! - Shutdown that closes leased connections too and reports every failure
//! - Status snapshot and checkout metrics
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbpool::{Connection, Pool, PoolConfig, Properties};
//!
//! let properties = Properties::load("application.properties")?;
//! let pool = Pool::open(PoolConfig::from_properties(&properties)?, &connector).await?;
//!
//! let conn = pool.acquire().await?;
//! let rows = conn.query("SELECT id, model FROM aircraft", &[]).await?;
//! conn.close().await?;
//!
//! let status = pool.status();
//! println!("{} of {} connections leased", status.leased, status.capacity);
//!
//! pool.close_all().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod connection;
pub mod error;
pub mod lease;
pub mod lifecycle;
pub mod pool;
pub mod types;

// Configuration
pub use dbpool_config::{ConfigError, Credentials, DEFAULT_CAPACITY, PoolConfig, Properties};

// Connection capability
pub use connection::{Connection, ConnectionResult, Connector};

// Error types
pub use error::{AggregateCloseError, ConnectionError, PoolError};

// Pool types
pub use lease::LeasedConnection;
pub use pool::{Pool, PoolMetrics, PoolStatus};

// Lifecycle
pub use lifecycle::{ConnectionMetadata, ConnectionState};

// Values
pub use types::{Row, Value};

// Cancellation handle accepted by `Pool::acquire_cancellable`
pub use tokio_util::sync::CancellationToken;
