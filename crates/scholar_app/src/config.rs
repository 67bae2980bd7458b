//! Optional `scholar.ron` configuration, merged with command-line overrides
//! into the engine's [`ClientSettings`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use engine_logging::engine_warn;
use log::LevelFilter;
use scholar_engine::{ClientSettings, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Every field is optional; missing ones keep the engine defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsOverrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
}

/// Reads the configuration file; a missing file is an empty configuration.
pub fn load_config(path: &Path) -> anyhow::Result<FileConfig> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(FileConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    ron::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

impl FileConfig {
    pub fn client_settings(&self, overrides: &SettingsOverrides) -> ClientSettings {
        let defaults = ClientSettings::default();
        let retry_defaults = RetryPolicy::default();
        ClientSettings {
            base_url: overrides
                .base_url
                .clone()
                .or_else(|| self.base_url.clone())
                .unwrap_or(defaults.base_url),
            username: overrides
                .username
                .clone()
                .or_else(|| self.username.clone())
                .filter(|user| !user.trim().is_empty()),
            connect_timeout: self
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            request_timeout: self
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts.unwrap_or(retry_defaults.max_attempts),
                delay: self
                    .retry_delay_ms
                    .map_or(retry_defaults.delay, Duration::from_millis),
            },
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        let Some(level) = self.log_level.as_deref() else {
            return LevelFilter::Info;
        };
        level.parse().unwrap_or_else(|_| {
            engine_warn!("Unknown log level {:?}, using info", level);
            LevelFilter::Info
        })
    }
}
