//! # onyx-session
//!
//! Session core for the Onyx delivery driver app: login state, inactivity
//! tracking, and automatic session expiration.
//!
//! ## Design principles
//!
//! - **Single writer**: the [`ExpirationMonitor`] worker thread owns every
//!   expiration decision, so the expiration notification fires at most once
//!   per monitoring episode.
//! - **Single source of truth**: [`SessionStore`] is the only mutator of
//!   login state; everything else observes.
//! - **Graceful degradation**: missing or corrupt state files load as
//!   logged-out defaults, never errors.
//! - **No async runtime**: plain threads and a condvar; hosts wrap with
//!   whatever executor they already run.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use onyx_session::{DriverInfo, ExpirationMonitor, SessionConfig, SessionStore};
//!
//! let store = Arc::new(SessionStore::open("/tmp/onyx/session.json"));
//! let monitor = ExpirationMonitor::start(SessionConfig::default(), Arc::clone(&store));
//! monitor.set_expiration_listener(|| println!("back to login"));
//!
//! store.save_session(DriverInfo::new("D-100", "Sami"))?;
//! monitor.on_app_foregrounded();
//! # Ok::<(), onyx_session::SessionError>(())
//! ```

pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod inactivity;
pub mod lifecycle;
pub mod monitor;
pub mod prefs;
pub mod store;

pub use cache::{CacheRegistry, Clearable};
pub use config::{load_config, SessionConfig};
pub use driver::DriverInfo;
pub use error::{Result, SessionError};
pub use inactivity::InactivityTracker;
pub use lifecycle::{InputEvent, LifecycleObserver};
pub use monitor::{ExpirationMonitor, MonitorPhase, MonitorSnapshot};
pub use prefs::LanguagePreferences;
pub use store::SessionStore;
