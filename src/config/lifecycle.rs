//! Pool and shutdown configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of resources a pool holds.
pub const DEFAULT_CAPACITY: usize = 10;
/// Default bound on waiting for an idle resource.
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
/// Default period of the background health monitor.
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 30_000;
/// Default deadline for running shutdown hooks.
pub const DEFAULT_SHUTDOWN_DEADLINE_MS: u64 = 30_000;

/// Resource pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of resources the pool holds, idle and leased together.
    pub capacity: usize,
    /// Default acquire timeout in milliseconds, used by `get`/`get_async`.
    pub acquire_timeout_ms: u64,
    /// Period of the background health monitor in milliseconds.
    pub monitor_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            monitor_interval_ms: DEFAULT_MONITOR_INTERVAL_MS,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the default acquire timeout.
    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Set the monitor period.
    #[must_use]
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval_ms = duration_to_ms(interval);
        self
    }

    /// Default acquire timeout.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Monitor period.
    #[must_use]
    pub const fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than 0".into());
        }
        if self.acquire_timeout_ms == 0 {
            return Err("acquire_timeout_ms must be greater than 0".into());
        }
        if self.monitor_interval_ms == 0 {
            return Err("monitor_interval_ms must be greater than 0".into());
        }
        Ok(())
    }
}

/// Shutdown coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Deadline for all hooks to finish, in milliseconds.
    pub deadline_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_SHUTDOWN_DEADLINE_MS,
        }
    }
}

impl ShutdownConfig {
    /// Configuration with the given deadline.
    #[must_use]
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline_ms: duration_to_ms(deadline),
        }
    }

    /// Hook deadline.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Validate shutdown configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.deadline_ms == 0 {
            return Err("deadline_ms must be greater than 0".into());
        }
        Ok(())
    }
}

/// Root configuration for a pool and its shutdown coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Resource pool settings.
    pub pool: PoolConfig,
    /// Shutdown settings.
    pub shutdown: ShutdownConfig,
}

impl LifecycleConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns a description prefixed with the failing section.
    pub fn validate(&self) -> Result<(), String> {
        self.pool.validate().map_err(|e| format!("pool invalid: {e}"))?;
        self.shutdown
            .validate()
            .map_err(|e| format!("shutdown invalid: {e}"))?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_defaults() {
        let cfg = PoolConfig::default();
        assert_eq!(cfg.capacity, 10);
        assert_eq!(cfg.acquire_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.monitor_interval(), Duration::from_secs(30));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_pool_config_builder() {
        let cfg = PoolConfig::new()
            .with_capacity(2)
            .with_acquire_timeout(Duration::from_millis(100))
            .with_monitor_interval(Duration::from_millis(250));
        assert_eq!(cfg.capacity, 2);
        assert_eq!(cfg.acquire_timeout_ms, 100);
        assert_eq!(cfg.monitor_interval_ms, 250);
    }

    #[test]
    fn test_pool_config_invalid_capacity() {
        let cfg = PoolConfig::new().with_capacity(0);
        assert_eq!(cfg.validate().unwrap_err(), "capacity must be greater than 0");
    }

    #[test]
    fn test_pool_config_invalid_timeouts() {
        let cfg = PoolConfig::new().with_acquire_timeout(Duration::ZERO);
        assert!(cfg.validate().is_err());

        let cfg = PoolConfig::new().with_monitor_interval(Duration::ZERO);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_shutdown_config() {
        assert_eq!(ShutdownConfig::default().deadline(), Duration::from_secs(30));
        assert!(ShutdownConfig::with_deadline(Duration::from_secs(2)).validate().is_ok());
        assert!(ShutdownConfig::with_deadline(Duration::ZERO).validate().is_err());
    }

    #[test]
    fn test_lifecycle_config_from_json() {
        let json = r#"{
            "pool": { "capacity": 4, "acquire_timeout_ms": 250 },
            "shutdown": { "deadline_ms": 2000 }
        }"#;

        let cfg = LifecycleConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.pool.capacity, 4);
        assert_eq!(cfg.pool.acquire_timeout_ms, 250);
        assert_eq!(cfg.pool.monitor_interval_ms, DEFAULT_MONITOR_INTERVAL_MS);
        assert_eq!(cfg.shutdown.deadline(), Duration::from_secs(2));
    }

    #[test]
    fn test_lifecycle_config_empty_json_uses_defaults() {
        let cfg = LifecycleConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, LifecycleConfig::default());
    }

    #[test]
    fn test_lifecycle_config_rejects_invalid_section() {
        let err = LifecycleConfig::from_json_str(r#"{ "pool": { "capacity": 0 } }"#).unwrap_err();
        assert!(err.starts_with("pool invalid:"), "{err}");

        let err = LifecycleConfig::from_json_str("not json").unwrap_err();
        assert!(err.starts_with("parse error:"), "{err}");
    }
}
