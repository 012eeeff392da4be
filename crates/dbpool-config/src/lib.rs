//! # dbpool-config
//!
//! Static configuration source for the connection pool.
//!
//! Configuration is read once at startup from a Java-style properties file
//! and turned into an immutable [`PoolConfig`]. Three keys are required and
//! one is optional:
//!
//! | key         | meaning                                     |
//! |-------------|---------------------------------------------|
//! | `url`       | connection target handed to the connector   |
//! | `login`     | login name                                  |
//! | `password`  | password                                    |
//! | `pool.size` | pool capacity (default 10)                  |
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbpool_config::{PoolConfig, Properties};
//!
//! let properties = Properties::load("application.properties")?;
//! let config = PoolConfig::from_properties(&properties)?;
//! println!("opening {} connections to {}", config.capacity, config.target);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod properties;

pub use config::{DEFAULT_CAPACITY, PoolConfig, keys};
pub use credentials::Credentials;
pub use error::ConfigError;
pub use properties::Properties;
