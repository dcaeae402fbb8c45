//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};

/// Represents the complete grader configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    /// Root directory for persisted solution reports and logs.
    pub storage_root: String,
    /// Program that bridges the JSON-lines kernel protocol to a real interpreter.
    pub kernel_bridge: String,
    /// Default per-request reply timeout.
    pub kernel_timeout_secs: u64,
    /// How long to wait for the `busy` status after a request.
    pub kernel_busy_timeout_ms: u64,
    /// Poll timeout for each event while draining to `idle`.
    pub kernel_poll_timeout_ms: u64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

/// Parse a numeric variable, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Every key has a default, so loading never fails.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "nbgrade".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "nbgrade.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "true".into()) == "true",
            storage_root: env::var("STORAGE_ROOT").unwrap_or_else(|_| "data".into()),
            kernel_bridge: env::var("KERNEL_BRIDGE").unwrap_or_else(|_| "kernel-bridge".into()),
            kernel_timeout_secs: env_or("KERNEL_TIMEOUT_SECS", 15),
            kernel_busy_timeout_ms: env_or("KERNEL_BUSY_TIMEOUT_MS", 1_000),
            kernel_poll_timeout_ms: env_or("KERNEL_POLL_TIMEOUT_MS", 500),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().expect("Failed to acquire AppConfig write lock");
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_storage_root(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.storage_root = value.into());
    }

    pub fn set_kernel_bridge(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.kernel_bridge = value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_numeric_keys_fall_back_on_garbage() {
        unsafe {
            env::set_var("KERNEL_TIMEOUT_SECS", "not-a-number");
            env::set_var("KERNEL_POLL_TIMEOUT_MS", " 250 ");
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.kernel_timeout_secs, 15);
        assert_eq!(cfg.kernel_poll_timeout_ms, 250);
        unsafe {
            env::remove_var("KERNEL_TIMEOUT_SECS");
            env::remove_var("KERNEL_POLL_TIMEOUT_MS");
        }
    }

    #[test]
    #[serial]
    fn test_setter_overrides_global() {
        AppConfig::set_kernel_bridge("/opt/bridge");
        assert_eq!(AppConfig::global().kernel_bridge, "/opt/bridge");
        AppConfig::reset();
        assert_ne!(AppConfig::global().kernel_bridge, "/opt/bridge");
    }
}
