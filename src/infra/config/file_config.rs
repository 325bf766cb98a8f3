use serde::Deserialize;

use crate::infra::config::{AppConfig, LogConfig, NotificationConfig, SandboxUser};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub notifications: Option<FileNotificationConfig>,
    pub sandbox: Option<FileSandboxConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(notifications) = self.notifications {
            notifications.merge_into(&mut config.notifications);
        }

        if let Some(sandbox) = self.sandbox {
            if let Some(users) = sandbox.users {
                config.sandbox.users = users;
            }
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileNotificationConfig {
    pub freshness_window_ms: Option<i64>,
}

impl FileNotificationConfig {
    fn merge_into(self, config: &mut NotificationConfig) {
        if let Some(window_ms) = self.freshness_window_ms {
            config.freshness_window_ms = window_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileSandboxConfig {
    pub users: Option<Vec<SandboxUser>>,
}
