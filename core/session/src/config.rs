//! Runtime configuration for the session core.
//!
//! The only genuinely tunable value is the inactivity timeout; the poll
//! ceiling bounds how coarse the recheck cadence may get. Both load from a
//! TOML file with serde defaults, so a missing file means stock settings.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SessionError};

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".onyx-delivery/config.toml";

/// Default inactivity timeout: two minutes without interaction expires the
/// session.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Ceiling on the delay between expiration rechecks while monitoring.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Settings consumed by the expiration monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub inactivity_timeout: Duration,
    pub max_poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionConfigFile {
    #[serde(default)]
    session: SessionSection,
}

#[derive(Debug, Deserialize, Default)]
struct SessionSection {
    #[serde(default)]
    inactivity_timeout_secs: Option<u64>,
    #[serde(default)]
    max_poll_interval_secs: Option<u64>,
}

pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(SessionError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

/// Loads the session configuration, falling back to defaults when the file
/// does not exist. A present-but-malformed file is an error rather than a
/// silent fallback, so a typo cannot quietly shorten every driver's session.
pub fn load_config(path: Option<PathBuf>) -> Result<SessionConfig> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(SessionConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|err| SessionError::Io {
        context: format!("Failed to read config {}", config_path.display()),
        source: err,
    })?;
    let file: SessionConfigFile =
        toml::from_str(&content).map_err(|err| SessionError::ConfigMalformed {
            path: config_path.clone(),
            details: err.to_string(),
        })?;

    let defaults = SessionConfig::default();
    let config = SessionConfig {
        inactivity_timeout: file
            .session
            .inactivity_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.inactivity_timeout),
        max_poll_interval: file
            .session
            .max_poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.max_poll_interval),
    };

    if config.inactivity_timeout.is_zero() {
        return Err(SessionError::ConfigMalformed {
            path: config_path,
            details: "inactivity_timeout_secs must be positive".to_string(),
        });
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("missing.toml");
        let config = load_config(Some(path)).expect("load");
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.inactivity_timeout, Duration::from_secs(120));
        assert_eq!(config.max_poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn reads_timeout_from_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[session]\ninactivity_timeout_secs = 300\n").expect("write");

        let config = load_config(Some(path)).expect("load");
        assert_eq!(config.inactivity_timeout, Duration::from_secs(300));
        assert_eq!(config.max_poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[session\n").expect("write");

        let err = load_config(Some(path)).expect_err("should fail");
        assert!(matches!(err, SessionError::ConfigMalformed { .. }));
    }

    #[test]
    fn zero_timeout_rejected() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[session]\ninactivity_timeout_secs = 0\n").expect("write");

        let err = load_config(Some(path)).expect_err("should fail");
        assert!(matches!(err, SessionError::ConfigMalformed { .. }));
    }
}
