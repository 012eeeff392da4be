//! Pool configuration.

use crate::credentials::Credentials;
use crate::error::ConfigError;
use crate::properties::Properties;

/// Capacity used when `pool.size` is absent or unusable.
pub const DEFAULT_CAPACITY: usize = 10;

/// Property keys read by [`PoolConfig::from_properties`].
pub mod keys {
    /// Connection target.
    pub const URL: &str = "url";
    /// Login name.
    pub const LOGIN: &str = "login";
    /// Password.
    pub const PASSWORD: &str = "password";
    /// Pool capacity.
    pub const POOL_SIZE: &str = "pool.size";
}

/// Configuration for a fixed-capacity connection pool.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connection target (URL or address understood by the connector).
    pub target: String,

    /// Credentials used for every physical connection.
    pub credentials: Credentials,

    /// Number of physical connections the pool opens and keeps.
    pub capacity: usize,
}

impl PoolConfig {
    /// Create a configuration with the default capacity.
    pub fn new(target: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            target: target.into(),
            credentials,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Build a configuration from properties.
    ///
    /// `url`, `login` and `password` are required. `pool.size` falls back to
    /// [`DEFAULT_CAPACITY`] when it is absent, not a number, or zero.
    pub fn from_properties(properties: &Properties) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            properties
                .get(key)
                .map(str::to_string)
                .ok_or(ConfigError::MissingKey(key))
        };

        let target = required(keys::URL)?;
        let login = required(keys::LOGIN)?;
        let password = required(keys::PASSWORD)?;

        let config = Self::new(target, Credentials::new(login, password))
            .capacity(parse_capacity(properties.get(keys::POOL_SIZE)));
        config.validate()?;
        Ok(config)
    }

    /// Set the pool capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Check that the configuration can back a pool.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: keys::URL,
                reason: "target must not be empty".into(),
            });
        }
        if self.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: keys::POOL_SIZE,
                reason: "capacity must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

fn parse_capacity(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        return DEFAULT_CAPACITY;
    };

    match raw.trim().parse::<usize>() {
        Ok(size) if size > 0 => size,
        _ => {
            tracing::debug!(
                value = raw,
                default = DEFAULT_CAPACITY,
                "unusable pool.size, using default capacity"
            );
            DEFAULT_CAPACITY
        }
    }
}
