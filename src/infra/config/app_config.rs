use serde::{Deserialize, Serialize};

use crate::usecases::inbox::DEFAULT_FRESHNESS_WINDOW_MS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub notifications: NotificationConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Messages older than this at observation time are treated as replayed
    /// history and never notify.
    pub freshness_window_ms: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            freshness_window_ms: DEFAULT_FRESHNESS_WINDOW_MS,
        }
    }
}

/// Accounts provisioned on the in-process backend at startup, so a local
/// run has a roster to talk to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SandboxConfig {
    pub users: Vec<SandboxUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SandboxUser {
    pub name: String,
    pub email: String,
    pub password: String,
}
