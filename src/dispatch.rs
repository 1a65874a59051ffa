//! State-change notification. One subscriber slot; last set wins.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use crate::state::DesktopState;

pub type StateCallback = Arc<dyn Fn(DesktopState) + Send + Sync>;

pub(crate) struct CallbackSlot {
    slot: Mutex<Option<StateCallback>>,
}

impl CallbackSlot {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Replaces the current subscriber. `None` disables notification without
    /// affecting enforcement.
    pub(crate) fn set(&self, callback: Option<StateCallback>) {
        *self.slot.lock().unwrap() = callback;
    }

    pub(crate) fn clear(&self) {
        self.set(None);
    }

    /// Invokes the subscriber synchronously on the calling (detector)
    /// thread. A panicking subscriber is contained here; it must never
    /// unwind into the hook machinery.
    pub(crate) fn notify(&self, state: DesktopState) {
        let cb = self.slot.lock().unwrap().clone();
        if let Some(cb) = cb {
            if catch_unwind(AssertUnwindSafe(|| cb(state))).is_err() {
                tracing::error!(state = state.as_raw(), "state callback panicked");
            }
        }
    }
}
