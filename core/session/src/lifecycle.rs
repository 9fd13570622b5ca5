//! Adapter from host activity/input callbacks to the monitor's three
//! semantic calls.
//!
//! Hosts report per-activity start/resume/stop; with overlapping activities
//! (one starting while another stops) the raw callbacks fire several times
//! per true app transition. A started-activity count debounces them: only the
//! 0 -> 1 and 1 -> 0 edges reach the monitor, so `on_app_foregrounded` /
//! `on_app_backgrounded` are called exactly once per transition.

use std::sync::Arc;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::monitor::ExpirationMonitor;

/// Raw input events reported by the host UI layer. Forwarding them is O(1);
/// they may arrive at touch-move frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    TouchDown,
    TouchMove,
    FocusGained,
}

pub struct LifecycleObserver {
    monitor: Arc<ExpirationMonitor>,
    started_activities: Mutex<usize>,
}

impl LifecycleObserver {
    pub fn new(monitor: Arc<ExpirationMonitor>) -> Self {
        Self {
            monitor,
            started_activities: Mutex::new(0),
        }
    }

    /// An activity became visible. The first one foregrounds the app.
    pub fn on_activity_started(&self) {
        let mut count = self
            .started_activities
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *count += 1;
        if *count == 1 {
            debug!("App foregrounded");
            self.monitor.on_app_foregrounded();
        }
    }

    /// An activity came to the front; counts as a user interaction.
    pub fn on_activity_resumed(&self) {
        self.monitor.mark_interaction();
    }

    /// An activity stopped. When the last one stops, the app is backgrounded.
    pub fn on_activity_stopped(&self) {
        let mut count = self
            .started_activities
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match *count {
            0 => warn!("Activity stop without matching start; ignoring"),
            1 => {
                *count = 0;
                debug!("App backgrounded");
                self.monitor.on_app_backgrounded();
            }
            _ => *count -= 1,
        }
    }

    /// Raw input from the host; every variant resets the inactivity clock.
    pub fn on_input_event(&self, event: InputEvent) {
        let _ = event;
        self.monitor.mark_interaction();
    }
}
