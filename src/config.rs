// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{DEFAULT_SOURCE, snapshot, timing};
use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source opened when none is given on the command line
    pub default_source: String,
    /// Log filter used when `RUST_LOG` is not set (e.g. "warn", "frame_capture=debug")
    pub log_filter: String,
    /// Key polling interval between displayed frames
    pub poll_interval_ms: u64,
    /// Upper bound on how long a read waits for a pushed frame (None = wait)
    pub read_timeout_ms: Option<u64>,
    /// Directory for PNG snapshots
    pub snapshot_dir: PathBuf,
    /// Log a progress line every N frames in headless mode (0 = never)
    pub headless_log_interval: u64,
    /// Mirror the viewer horizontally
    pub mirror_preview: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_source: DEFAULT_SOURCE.to_string(),
            log_filter: "warn".to_string(),
            poll_interval_ms: timing::DEFAULT_POLL_INTERVAL_MS,
            read_timeout_ms: None,
            snapshot_dir: PathBuf::from(snapshot::DEFAULT_DIR),
            headless_log_interval: timing::FRAME_LOG_INTERVAL,
            mirror_preview: false,
        }
    }
}

impl Config {
    /// Load a JSON configuration file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, AppError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config("poll_interval_ms must be positive".into()));
        }
        if self.read_timeout_ms == Some(0) {
            return Err(AppError::Config(
                "read_timeout_ms must be positive or null".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "default_source": "0" }"#).unwrap();
        assert_eq!(config.default_source, "0");
        assert_eq!(config.poll_interval_ms, timing::DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.read_timeout(), None);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(
            Config::from_json(r#"{ "read_timeout_ms": 0 }"#),
            Err(AppError::Config(_))
        ));
        assert!(Config::from_json(r#"{ "poll_interval_ms": 0 }"#).is_err());
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(
            Config::from_json("{ not json"),
            Err(AppError::Config(_))
        ));
    }
}
