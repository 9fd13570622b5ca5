//! Automatic session expiration after a period of inactivity.
//!
//! The monitor is a small state machine (`Idle` / `Monitoring` /
//! `Suspended`) driven by one dedicated worker thread. Event entry points
//! (`mark_interaction`, `on_app_foregrounded`, `on_app_backgrounded`, the
//! store's login stream, `shutdown`) only mutate state under one mutex and
//! nudge the condvar; the worker alone evaluates deadlines and transitions
//! into expiration. Single-writer expiration is what makes the notification
//! at-most-once per episode even when a foreground recheck and a
//! background-return check line up on the same instant.
//!
//! Background time counts toward the timeout in full: returning to
//! foreground rewinds the inactivity clock to the backgrounding instant, so
//! a stay of `D` leaves `timeout - D`, and `D >= timeout` expires on the
//! worker's immediate wake-up.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheRegistry, Clearable};
use crate::config::SessionConfig;
use crate::inactivity::InactivityTracker;
use crate::store::SessionStore;

/// Callback invoked on the monitor worker thread after a session expires.
pub type ExpirationListener = Arc<dyn Fn() + Send + Sync>;

const LOGIN_WATCH_POLL: Duration = Duration::from_millis(250);

/// Phase of the expiration state machine, as exposed in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    /// No active session, or nothing left to do after expiration.
    Idle,
    /// Foregrounded with an active session; a recheck is scheduled.
    Monitoring,
    /// Backgrounded with an active session; the backgrounding instant is
    /// recorded.
    Suspended,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Monitoring,
    Suspended { since: Instant },
}

struct MonitorState {
    phase: Phase,
    in_foreground: bool,
    /// Bumped whenever a new monitoring episode begins; a new episode always
    /// supersedes whatever wait the worker was in.
    episode: u64,
    /// Latched when a background stay already exceeded the timeout, so a
    /// resume callback marking an interaction right after foregrounding
    /// cannot un-expire the session.
    expire_now: bool,
    shutdown: bool,
}

struct MonitorInner {
    config: SessionConfig,
    store: Arc<SessionStore>,
    tracker: InactivityTracker,
    caches: CacheRegistry,
    state: Mutex<MonitorState>,
    wake: Condvar,
    listener: Mutex<Option<ExpirationListener>>,
}

/// Diagnostic view of the monitor, for health output and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub phase: MonitorPhase,
    pub in_foreground: bool,
    pub episode: u64,
}

pub struct ExpirationMonitor {
    inner: Arc<MonitorInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
    login_watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ExpirationMonitor {
    /// Starts the monitor: spawns the worker thread and subscribes to the
    /// store's login stream so an external logout cancels monitoring
    /// promptly instead of at the next poll.
    pub fn start(config: SessionConfig, store: Arc<SessionStore>) -> Self {
        let inner = Arc::new(MonitorInner {
            config,
            store,
            tracker: InactivityTracker::new(),
            caches: CacheRegistry::new(),
            state: Mutex::new(MonitorState {
                phase: Phase::Idle,
                in_foreground: false,
                episode: 0,
                expire_now: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
            listener: Mutex::new(None),
        });

        info!(
            timeout_secs = inner.config.inactivity_timeout.as_secs(),
            "Expiration monitor started"
        );

        let worker = {
            let inner = Arc::clone(&inner);
            thread::spawn(move || inner.run_worker())
        };
        let login_watcher = {
            let inner = Arc::clone(&inner);
            let rx = inner.store.observe_login_state();
            thread::spawn(move || loop {
                match rx.recv_timeout(LOGIN_WATCH_POLL) {
                    Ok(logged_in) => inner.handle_login_change(logged_in),
                    Err(RecvTimeoutError::Timeout) => {
                        if inner.is_shut_down() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            })
        };

        Self {
            inner,
            worker: Mutex::new(Some(worker)),
            login_watcher: Mutex::new(Some(login_watcher)),
        }
    }

    /// Registers the expiration callback. Single listener; a new registration
    /// replaces the previous one (last wins). The callback fires on the
    /// monitor worker thread, after `clear_session` is observable.
    pub fn set_expiration_listener(&self, listener: impl Fn() + Send + Sync + 'static) {
        let mut slot = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            debug!("Replacing expiration listener");
        }
        *slot = Some(Arc::new(listener));
    }

    /// Registers a cache to be invalidated whenever the session expires.
    pub fn register_clearable(&self, cache: Arc<dyn Clearable>) {
        self.inner.caches.register(cache);
    }

    /// Records a user interaction. O(1) and non-blocking; safe from any
    /// thread at input-event frequency. Does not change the monitor phase;
    /// the next evaluation recomputes from the fresh timestamp.
    pub fn mark_interaction(&self) {
        self.inner.tracker.mark_interaction();
    }

    /// The app entered the foreground. Exactly one call per true transition
    /// is expected; repeated calls are ignored.
    pub fn on_app_foregrounded(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.in_foreground {
            return;
        }
        state.in_foreground = true;

        if !inner.store.is_logged_in() {
            state.phase = Phase::Idle;
            return;
        }

        match state.phase {
            Phase::Suspended { since } => {
                // Background time counts as inactivity: rewind the clock to
                // the backgrounding instant and let the worker decide.
                let background_for = since.elapsed();
                debug!(
                    background_secs = background_for.as_secs(),
                    "Foregrounded after background stay"
                );
                inner.tracker.mark_interaction_at(since);
                if background_for >= inner.config.inactivity_timeout {
                    state.expire_now = true;
                }
            }
            _ => inner.tracker.mark_interaction(),
        }

        state.phase = Phase::Monitoring;
        state.episode += 1;
        debug!(episode = state.episode, "Monitoring episode started");
        inner.wake.notify_all();
    }

    /// The app left the foreground. Cancels the pending recheck and records
    /// the backgrounding instant. Repeated calls are ignored.
    pub fn on_app_backgrounded(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.in_foreground {
            return;
        }
        state.in_foreground = false;

        if matches!(state.phase, Phase::Monitoring) {
            state.phase = Phase::Suspended {
                since: Instant::now(),
            };
            debug!("Monitoring suspended; app backgrounded");
        }
        inner.wake.notify_all();
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        MonitorSnapshot {
            phase: match state.phase {
                Phase::Idle => MonitorPhase::Idle,
                Phase::Monitoring => MonitorPhase::Monitoring,
                Phase::Suspended { .. } => MonitorPhase::Suspended,
            },
            in_foreground: state.in_foreground,
            episode: state.episode,
        }
    }

    /// Stops the worker and the login watcher. Idempotent and unconditional;
    /// never blocks on a sleeping wait.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.shutdown {
                state.shutdown = true;
                info!("Expiration monitor shutting down");
            }
            self.inner.wake.notify_all();
        }
        if let Some(handle) = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = handle.join();
        }
        if let Some(handle) = self
            .login_watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for ExpirationMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl MonitorInner {
    fn is_shut_down(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .shutdown
    }

    /// Store login stream: a login while foregrounded starts an episode; any
    /// logout (ours or an explicit one elsewhere) returns to `Idle` without
    /// a notification.
    fn handle_login_change(&self, logged_in: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if logged_in {
            if state.in_foreground && matches!(state.phase, Phase::Idle) {
                self.tracker.mark_interaction();
                state.phase = Phase::Monitoring;
                state.episode += 1;
                debug!(episode = state.episode, "Monitoring episode started on login");
                self.wake.notify_all();
            }
        } else if !matches!(state.phase, Phase::Idle) {
            state.phase = Phase::Idle;
            state.expire_now = false;
            debug!("Monitoring cancelled; session cleared externally");
            self.wake.notify_all();
        }
    }

    fn run_worker(self: Arc<Self>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if state.shutdown {
                return;
            }
            match state.phase {
                Phase::Idle | Phase::Suspended { .. } => {
                    state = self
                        .wake
                        .wait(state)
                        .unwrap_or_else(|e| e.into_inner());
                }
                Phase::Monitoring => {
                    // Missing session at check time: cleared between
                    // scheduling and firing. Go idle without re-clearing.
                    if !self.store.is_logged_in() {
                        state.phase = Phase::Idle;
                        state.expire_now = false;
                        continue;
                    }

                    let idle = self.tracker.idle_duration_at(Instant::now());
                    if state.expire_now || idle >= self.config.inactivity_timeout {
                        state.phase = Phase::Idle;
                        state.expire_now = false;
                        // Clearing while still serialized under the state
                        // lock: a superseding episode cannot observe a
                        // half-expired session.
                        if let Err(err) = self.store.clear_session() {
                            warn!(error = %err, "Failed to persist session clear on expiration");
                        }
                        self.caches.clear_all();
                        drop(state);

                        info!(
                            idle_secs = idle.as_secs(),
                            "Session expired after inactivity"
                        );
                        self.notify_listener();

                        state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                    } else {
                        let delay = next_check_delay(idle, &self.config);
                        let (guard, _) = self
                            .wake
                            .wait_timeout(state, delay)
                            .unwrap_or_else(|e| e.into_inner());
                        state = guard;
                    }
                }
            }
        }
    }

    fn notify_listener(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match listener {
            Some(callback) => {
                if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                    error!("Expiration listener panicked; session remains cleared");
                }
            }
            None => debug!("Session expired with no listener registered"),
        }
    }
}

/// Delay until the next expiration recheck: the remaining time, capped by
/// the poll ceiling.
fn next_check_delay(idle: Duration, config: &SessionConfig) -> Duration {
    config
        .inactivity_timeout
        .saturating_sub(idle)
        .min(config.max_poll_interval)
}
