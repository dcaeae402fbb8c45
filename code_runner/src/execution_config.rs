use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};
use util::config::AppConfig;
use util::languages::KernelLanguage;

/// Limits and launch settings for kernel sessions.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutionConfig {
    pub timeout_secs: u64,    // Max wait for an execute reply
    pub busy_timeout_ms: u64, // Max wait for the busy status after a request
    pub poll_timeout_ms: u64, // Max wait for each event while draining to idle
    pub bridge: String,       // Interpreter bridge program speaking the JSON-lines protocol
    #[serde(default)]
    pub bridge_args: Vec<String>, // Extra arguments placed before `--kernel <name>`
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            busy_timeout_ms: 1_000,
            poll_timeout_ms: 500,
            bridge: "kernel-bridge".to_string(),
            bridge_args: Vec::new(),
        }
    }
}

impl ExecutionConfig {
    /// Build from the global `AppConfig` (environment / `.env`).
    pub fn from_app_config() -> Self {
        let cfg = AppConfig::global();
        Self {
            timeout_secs: cfg.kernel_timeout_secs,
            busy_timeout_ms: cfg.kernel_busy_timeout_ms,
            poll_timeout_ms: cfg.kernel_poll_timeout_ms,
            bridge: cfg.kernel_bridge.clone(),
            bridge_args: Vec::new(),
        }
    }

    /// Attempts to load a config from a JSON file.
    /// Returns `None` if the file does not exist or cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        let file_contents = fs::read_to_string(path).ok()?;
        serde_json::from_str(&file_contents).ok()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Program and arguments that start an interpreter for `language`.
    pub fn command_for(&self, language: KernelLanguage) -> (String, Vec<String>) {
        let mut args = self.bridge_args.clone();
        args.push("--kernel".to_string());
        args.push(language.kernel_name().to_string());
        (self.bridge.clone(), args)
    }
}
