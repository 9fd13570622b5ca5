//! Last-interaction clock read by the expiration monitor.
//!
//! `mark_interaction` is called from whatever thread the UI layer dispatches
//! input events on, potentially at touch-move frequency, so it must be O(1)
//! and non-blocking: the clock is a single atomic offset from a fixed origin.
//! `fetch_max` keeps it monotonically non-decreasing within an episode.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

pub struct InactivityTracker {
    origin: Instant,
    /// Milliseconds since `origin` of the last interaction.
    last_interaction_ms: AtomicU64,
}

impl InactivityTracker {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_interaction_ms: AtomicU64::new(0),
        }
    }

    /// Records "now" as the last-known user-activity instant.
    pub fn mark_interaction(&self) {
        self.mark_interaction_at(Instant::now());
    }

    /// Records a specific instant as the last interaction. The clock only
    /// moves forward; an instant older than the current value is a no-op.
    pub(crate) fn mark_interaction_at(&self, at: Instant) {
        let ms = self.millis_since_origin(at);
        self.last_interaction_ms.fetch_max(ms, Ordering::SeqCst);
        trace!(offset_ms = ms, "Inactivity clock reset");
    }

    /// Time elapsed since the last interaction, as of `now`.
    pub fn idle_duration_at(&self, now: Instant) -> Duration {
        let last_ms = self.last_interaction_ms.load(Ordering::SeqCst);
        let now_ms = self.millis_since_origin(now);
        Duration::from_millis(now_ms.saturating_sub(last_ms))
    }

    /// Time elapsed since the last interaction.
    pub fn idle_duration(&self) -> Duration {
        self.idle_duration_at(Instant::now())
    }

    fn millis_since_origin(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.origin).as_millis() as u64
    }
}

impl Default for InactivityTracker {
    fn default() -> Self {
        Self::new()
    }
}
