//! End-to-end tests for the expiration monitor, driven through the public
//! surface with short timeouts. Waits are generous relative to the
//! configured timeouts so slow CI machines do not flake.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use onyx_session::{
    Clearable, DriverInfo, ExpirationMonitor, MonitorPhase, SessionConfig, SessionStore,
};

const TIMEOUT: Duration = Duration::from_millis(300);
const POLL: Duration = Duration::from_millis(50);
const GENEROUS: Duration = Duration::from_secs(3);

fn fast_config() -> SessionConfig {
    SessionConfig {
        inactivity_timeout: TIMEOUT,
        max_poll_interval: POLL,
    }
}

struct Harness {
    _temp_dir: tempfile::TempDir,
    store: Arc<SessionStore>,
    monitor: ExpirationMonitor,
    /// Receives `is_logged_in` as observed inside the listener.
    expirations: Receiver<bool>,
}

fn logged_in_harness() -> Harness {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(SessionStore::open(temp_dir.path().join("session.json")));
    store
        .save_session(DriverInfo::new("D-100", "Sami"))
        .expect("save session");

    let monitor = ExpirationMonitor::start(fast_config(), Arc::clone(&store));
    let (tx, rx) = channel();
    let listener_store = Arc::clone(&store);
    monitor.set_expiration_listener(move || {
        let _ = tx.send(listener_store.is_logged_in());
    });

    Harness {
        _temp_dir: temp_dir,
        store,
        monitor,
        expirations: rx,
    }
}

fn assert_no_expiration(rx: &Receiver<bool>, within: Duration) {
    match rx.recv_timeout(within) {
        Err(RecvTimeoutError::Timeout) => {}
        other => panic!("unexpected expiration event: {:?}", other),
    }
}

#[test]
fn expires_once_after_inactivity_gap() {
    // A gap >= timeout while foregrounded and logged in yields exactly one
    // notification, with the session already cleared when it fires.
    let harness = logged_in_harness();
    harness.monitor.on_app_foregrounded();

    let logged_in_at_notification = harness
        .expirations
        .recv_timeout(GENEROUS)
        .expect("expiration notification");
    assert!(!logged_in_at_notification);
    assert!(!harness.store.is_logged_in());

    // No duplicate follows.
    assert_no_expiration(&harness.expirations, TIMEOUT * 3);
    assert_eq!(harness.monitor.snapshot().phase, MonitorPhase::Idle);

    harness.monitor.shutdown();
}

#[test]
fn interactions_keep_session_alive() {
    // Gaps < timeout never expire; the deadline moves forward from each
    // interaction.
    let harness = logged_in_harness();
    harness.monitor.on_app_foregrounded();

    // Keep interacting well past the timeout's original deadline.
    for _ in 0..6 {
        sleep(TIMEOUT / 3);
        harness.monitor.mark_interaction();
        assert!(harness.store.is_logged_in());
    }
    assert_no_expiration(&harness.expirations, Duration::from_millis(0));

    // Stop interacting; now it expires.
    assert!(!harness
        .expirations
        .recv_timeout(GENEROUS)
        .expect("expiration after interactions stop"));

    harness.monitor.shutdown();
}

#[test]
fn long_background_stay_expires_on_return() {
    // A background stay longer than the timeout expires immediately on
    // foregrounding, with no additional wait.
    let harness = logged_in_harness();
    harness.monitor.on_app_foregrounded();
    harness.monitor.on_app_backgrounded();

    sleep(TIMEOUT + TIMEOUT / 2);
    assert_no_expiration(&harness.expirations, Duration::from_millis(0));
    assert!(harness.store.is_logged_in());

    harness.monitor.on_app_foregrounded();
    assert!(!harness
        .expirations
        .recv_timeout(Duration::from_secs(1))
        .expect("expiration on foreground"));

    // Exactly one, even though a scheduled recheck and the background
    // accounting both pointed at the same instant.
    assert_no_expiration(&harness.expirations, TIMEOUT * 3);

    harness.monitor.shutdown();
}

#[test]
fn short_background_stay_counts_toward_timeout() {
    // A background stay of D < timeout leaves timeout - D remaining after
    // foregrounding.
    let harness = logged_in_harness();
    harness.monitor.on_app_foregrounded();
    harness.monitor.on_app_backgrounded();

    sleep(TIMEOUT / 3);
    harness.monitor.on_app_foregrounded();

    // Roughly 2/3 of the timeout should remain; nothing fires right away.
    assert_no_expiration(&harness.expirations, TIMEOUT / 4);

    assert!(!harness
        .expirations
        .recv_timeout(GENEROUS)
        .expect("expiration after remaining time"));

    harness.monitor.shutdown();
}

#[test]
fn external_logout_cancels_without_notification() {
    // An explicit logout while monitoring goes Idle and never fires the
    // expiration notification.
    let harness = logged_in_harness();
    harness.monitor.on_app_foregrounded();

    sleep(TIMEOUT / 3);
    harness.store.clear_session().expect("external logout");

    assert_no_expiration(&harness.expirations, TIMEOUT * 3);
    assert_eq!(harness.monitor.snapshot().phase, MonitorPhase::Idle);

    harness.monitor.shutdown();
}

#[test]
fn panicking_listener_does_not_break_next_episode() {
    // A listener that panics leaves the session cleared and the monitor
    // able to run the next episode normally.
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(SessionStore::open(temp_dir.path().join("session.json")));
    store
        .save_session(DriverInfo::new("D-100", "Sami"))
        .expect("save session");

    let monitor = ExpirationMonitor::start(fast_config(), Arc::clone(&store));
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);
    monitor.set_expiration_listener(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        panic!("listener failure");
    });

    monitor.on_app_foregrounded();
    wait_for(|| invocations.load(Ordering::SeqCst) == 1);
    assert!(!store.is_logged_in());

    // New login, new episode: the monitor must function normally.
    store
        .save_session(DriverInfo::new("D-100", "Sami"))
        .expect("second login");
    wait_for(|| invocations.load(Ordering::SeqCst) == 2);
    assert!(!store.is_logged_in());

    monitor.shutdown();
}

#[test]
fn expiration_clears_registered_caches() {
    struct FlagCache(AtomicUsize);

    impl Clearable for FlagCache {
        fn name(&self) -> &str {
            "orders"
        }
        fn clear(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let harness = logged_in_harness();
    let cache = Arc::new(FlagCache(AtomicUsize::new(0)));
    harness.monitor.register_clearable(cache.clone());

    harness.monitor.on_app_foregrounded();
    harness
        .expirations
        .recv_timeout(GENEROUS)
        .expect("expiration");

    assert_eq!(cache.0.load(Ordering::SeqCst), 1);

    harness.monitor.shutdown();
}

#[test]
fn login_while_foregrounded_starts_monitoring() {
    // The app can sit on the login screen (foregrounded, logged out); a
    // successful login must start an episode without a lifecycle event.
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(SessionStore::open(temp_dir.path().join("session.json")));
    let monitor = ExpirationMonitor::start(fast_config(), Arc::clone(&store));
    let (tx, rx) = channel();
    monitor.set_expiration_listener(move || {
        let _ = tx.send(true);
    });

    monitor.on_app_foregrounded();
    assert_eq!(monitor.snapshot().phase, MonitorPhase::Idle);

    store
        .save_session(DriverInfo::new("D-100", "Sami"))
        .expect("login");

    rx.recv_timeout(GENEROUS).expect("expiration after login");
    assert!(!store.is_logged_in());

    monitor.shutdown();
}

fn wait_for(predicate: impl Fn() -> bool) {
    let deadline = std::time::Instant::now() + GENEROUS;
    while std::time::Instant::now() < deadline {
        if predicate() {
            return;
        }
        sleep(Duration::from_millis(10));
    }
    panic!("condition not reached within {:?}", GENEROUS);
}
