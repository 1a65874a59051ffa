//! Fake window system for driving the engine without an OS.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use zdesk::error::{Error, Result};
use zdesk::system::Poke;
use zdesk::{DesktopState, EngineConfig, WindowId, WindowSystem};

#[derive(Default)]
struct Inner {
    visits: Vec<(WindowId, DesktopState)>,
    dead: Vec<WindowId>,
    failing: Vec<WindowId>,
    poke: Option<Poke>,
}

/// Scriptable desktop: tests set the sampled state, flip windows dead, and
/// pulse the hook; every directive the engine issues is recorded in order.
pub struct FakeSystem {
    sample: AtomicI32,
    hooked: AtomicBool,
    directives: AtomicUsize,
    inner: Mutex<Inner>,
}

impl FakeSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sample: AtomicI32::new(DesktopState::ShowingWindows.as_raw()),
            hooked: AtomicBool::new(false),
            directives: AtomicUsize::new(0),
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Sets what the next probe reports.
    pub fn set_desktop(&self, state: DesktopState) {
        self.sample.store(state.as_raw(), Ordering::SeqCst);
    }

    /// Fires the installed hook, as the OS would on a shell event. Harmless
    /// when nothing is installed.
    pub fn pulse(&self) {
        let inner = self.inner.lock().unwrap();
        if let Some(poke) = inner.poke.as_ref() {
            poke();
        }
    }

    pub fn hooked(&self) -> bool {
        self.hooked.load(Ordering::SeqCst)
    }

    /// Marks the window as destroyed; later liveness checks fail.
    pub fn kill(&self, id: WindowId) {
        self.inner.lock().unwrap().dead.push(id);
    }

    /// Makes directives against this window fail (access denied style).
    pub fn fail_on(&self, id: WindowId) {
        self.inner.lock().unwrap().failing.push(id);
    }

    pub fn visits(&self) -> Vec<(WindowId, DesktopState)> {
        self.inner.lock().unwrap().visits.clone()
    }

    pub fn visited_ids(&self) -> Vec<WindowId> {
        self.visits().into_iter().map(|(id, _)| id).collect()
    }

    pub fn directive_count(&self) -> usize {
        self.directives.load(Ordering::SeqCst)
    }

    pub fn clear_visits(&self) {
        self.inner.lock().unwrap().visits.clear();
    }
}

impl WindowSystem for FakeSystem {
    fn install_hook(&self, poke: Poke) -> Result<()> {
        self.inner.lock().unwrap().poke = Some(poke);
        self.hooked.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn remove_hook(&self) {
        self.inner.lock().unwrap().poke = None;
        self.hooked.store(false, Ordering::SeqCst);
    }

    fn sample_desktop(&self) -> DesktopState {
        DesktopState::from_raw(self.sample.load(Ordering::SeqCst))
            .unwrap_or(DesktopState::ShowingWindows)
    }

    fn window_alive(&self, id: WindowId) -> bool {
        !self.inner.lock().unwrap().dead.contains(&id)
    }

    fn enforce(&self, id: WindowId, state: DesktopState) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.visits.push((id, state));
        self.directives.fetch_add(1, Ordering::SeqCst);
        if inner.failing.contains(&id) {
            return Err(Error::Os("access denied".into()));
        }
        Ok(())
    }
}

/// Fast-poll config with the drift tick disabled, so directive counts are
/// deterministic.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_interval_ms: 10,
        safety_tick_ms: 0,
        foreground_hook: false,
    }
}

/// Polls `pred` until it holds or the timeout lapses.
pub fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    pred()
}

pub fn win(raw: usize) -> WindowId {
    WindowId::from_raw(raw)
}
