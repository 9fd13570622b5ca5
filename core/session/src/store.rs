//! Single source of truth for "is a driver logged in, and who".
//!
//! State is persisted as a small JSON file so a login survives process
//! restarts, written atomically (temp file + rename). Loading degrades
//! gracefully: a missing or corrupt file means logged out, never an error.
//!
//! Observers get a push stream: the current value is delivered immediately on
//! subscription, then every subsequent change. `clear_session` is idempotent
//! in effect but still publishes, so observers may key off the event itself.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::DriverInfo;
use crate::error::{Result, SessionError};

/// Current version of the persisted session format.
pub const SESSION_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSession {
    version: u32,
    #[serde(default)]
    driver: Option<DriverInfo>,
    /// RFC 3339 timestamp of the last save, for diagnostics only.
    #[serde(default)]
    saved_at: String,
}

impl Default for PersistedSession {
    fn default() -> Self {
        Self {
            version: SESSION_FILE_VERSION,
            driver: None,
            saved_at: String::new(),
        }
    }
}

pub struct SessionStore {
    path: PathBuf,
    driver: Mutex<Option<DriverInfo>>,
    login_subscribers: Mutex<Vec<Sender<bool>>>,
    driver_subscribers: Mutex<Vec<Sender<Option<DriverInfo>>>>,
}

impl SessionStore {
    /// Opens the store, restoring any persisted session.
    ///
    /// A future-versioned, unreadable, or corrupt file loads as logged out.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let persisted = load_persisted(&path);
        if persisted.driver.is_some() {
            info!(path = %path.display(), "Restored persisted session");
        }
        Self {
            path,
            driver: Mutex::new(persisted.driver),
            login_subscribers: Mutex::new(Vec::new()),
            driver_subscribers: Mutex::new(Vec::new()),
        }
    }

    /// True iff a driver is currently logged in.
    pub fn is_logged_in(&self) -> bool {
        self.driver.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Snapshot of the logged-in driver, if any.
    pub fn current_driver(&self) -> Option<DriverInfo> {
        self.driver.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Persists the driver identity and marks the session as logged in.
    ///
    /// Both fields are set atomically: observers never see a logged-in state
    /// without a driver.
    pub fn save_session(&self, driver_info: DriverInfo) -> Result<()> {
        self.persist(Some(&driver_info))?;
        {
            let mut driver = self.driver.lock().unwrap_or_else(|e| e.into_inner());
            *driver = Some(driver_info.clone());
        }
        info!(delivery_id = %driver_info.delivery_id, "Session saved");
        self.publish(Some(driver_info));
        Ok(())
    }

    /// Removes the persisted identity and marks the session as logged out.
    ///
    /// Idempotent in effect; the change is still published to observers even
    /// when the store was already logged out.
    pub fn clear_session(&self) -> Result<()> {
        self.persist(None)?;
        {
            let mut driver = self.driver.lock().unwrap_or_else(|e| e.into_inner());
            *driver = None;
        }
        info!("Session cleared");
        self.publish(None);
        Ok(())
    }

    /// Push stream of login state: the current value immediately, then every
    /// change. The stream ends when the store or the receiver is dropped.
    pub fn observe_login_state(&self) -> Receiver<bool> {
        let (tx, rx) = channel();
        let current = self.is_logged_in();
        let _ = tx.send(current);
        self.login_subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Push stream of the driver identity, same contract as
    /// [`observe_login_state`](Self::observe_login_state).
    pub fn observe_driver_info(&self) -> Receiver<Option<DriverInfo>> {
        let (tx, rx) = channel();
        let current = self.current_driver();
        let _ = tx.send(current);
        self.driver_subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    fn publish(&self, driver: Option<DriverInfo>) {
        let logged_in = driver.is_some();
        {
            let mut subs = self
                .login_subscribers
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            subs.retain(|tx| tx.send(logged_in).is_ok());
            debug!(logged_in, observers = subs.len(), "Login state published");
        }
        {
            let mut subs = self
                .driver_subscribers
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            subs.retain(|tx| tx.send(driver.clone()).is_ok());
        }
    }

    /// Writes the session file atomically (temp file + rename).
    fn persist(&self, driver: Option<&DriverInfo>) -> Result<()> {
        use std::io::Write;

        let persisted = PersistedSession {
            version: SESSION_FILE_VERSION,
            driver: driver.cloned(),
            saved_at: Utc::now().to_rfc3339(),
        };
        let content = serde_json::to_string_pretty(&persisted).map_err(|e| SessionError::Json {
            context: "Failed to serialize session".to_string(),
            source: e,
        })?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs_err::create_dir_all(dir).map_err(|e| SessionError::Io {
            context: format!("Failed to create session directory {}", dir.display()),
            source: e,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| SessionError::Io {
            context: "Failed to create temp session file".to_string(),
            source: e,
        })?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| SessionError::Io {
                context: "Failed to write temp session file".to_string(),
                source: e,
            })?;
        tmp.flush().map_err(|e| SessionError::Io {
            context: "Failed to flush temp session file".to_string(),
            source: e,
        })?;
        tmp.persist(&self.path).map_err(|e| SessionError::Io {
            context: format!("Failed to persist session file {}", self.path.display()),
            source: e.error,
        })?;

        Ok(())
    }
}

fn load_persisted(path: &Path) -> PersistedSession {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return PersistedSession::default(),
    };

    match serde_json::from_str::<PersistedSession>(&content) {
        Ok(persisted) if persisted.version <= SESSION_FILE_VERSION => persisted,
        Ok(persisted) => {
            // Future format; do not guess at its meaning.
            warn!(
                path = %path.display(),
                version = persisted.version,
                "Session file has a newer format; treating as logged out"
            );
            PersistedSession::default()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Session file corrupt; treating as logged out");
            PersistedSession::default()
        }
    }
}
