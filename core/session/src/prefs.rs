//! Persisted app preferences: the driver's chosen language.
//!
//! Same file idiom and observer contract as the session store. Translation
//! storage and locale resources belong to the host UI layer; only the code
//! itself lives here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Result, SessionError};

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedPrefs {
    #[serde(default)]
    language: String,
}

impl Default for PersistedPrefs {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

pub struct LanguagePreferences {
    path: PathBuf,
    language: Mutex<String>,
    subscribers: Mutex<Vec<Sender<String>>>,
}

impl LanguagePreferences {
    /// Opens the preference file; missing or corrupt files mean the default
    /// language.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let persisted = load_persisted(&path);
        Self {
            path,
            language: Mutex::new(persisted.language),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn language(&self) -> String {
        self.language
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Persists a new language code and publishes it to observers. An empty
    /// code falls back to the default.
    pub fn set_language(&self, code: &str) -> Result<()> {
        let code = if code.trim().is_empty() {
            DEFAULT_LANGUAGE
        } else {
            code.trim()
        };

        self.persist(code)?;
        {
            let mut language = self.language.lock().unwrap_or_else(|e| e.into_inner());
            *language = code.to_string();
        }
        info!(language = code, "Language preference saved");

        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|tx| tx.send(code.to_string()).is_ok());
        Ok(())
    }

    /// Push stream of the language code: current value immediately, then
    /// every change.
    pub fn observe_language(&self) -> Receiver<String> {
        let (tx, rx) = channel();
        let _ = tx.send(self.language());
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    fn persist(&self, code: &str) -> Result<()> {
        use std::io::Write;

        let content = serde_json::to_string_pretty(&PersistedPrefs {
            language: code.to_string(),
        })
        .map_err(|e| SessionError::Json {
            context: "Failed to serialize preferences".to_string(),
            source: e,
        })?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs_err::create_dir_all(dir).map_err(|e| SessionError::Io {
            context: format!("Failed to create preferences directory {}", dir.display()),
            source: e,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| SessionError::Io {
            context: "Failed to create temp preferences file".to_string(),
            source: e,
        })?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| SessionError::Io {
                context: "Failed to write temp preferences file".to_string(),
                source: e,
            })?;
        tmp.persist(&self.path).map_err(|e| SessionError::Io {
            context: format!("Failed to persist preferences file {}", self.path.display()),
            source: e.error,
        })?;
        Ok(())
    }
}

fn load_persisted(path: &Path) -> PersistedPrefs {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return PersistedPrefs::default(),
    };
    match serde_json::from_str(&content) {
        Ok(persisted) => persisted,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Preferences file corrupt; using defaults");
            PersistedPrefs::default()
        }
    }
}
