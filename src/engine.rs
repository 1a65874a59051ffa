//! Core engine: lifecycle, detector thread, and the public operations.
//!
//! All registry reads/writes and the enforcement iteration share one lock,
//! so a registration cannot race an in-progress pass. The current desktop
//! state lives in a separate atomic cell and is always readable without
//! waiting on enforcement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::dispatch::{CallbackSlot, StateCallback};
use crate::enforce;
use crate::error::{Error, Result};
use crate::registry::{RegisterOutcome, Registry, WindowId};
use crate::state::{DesktopState, EdgeTracker, StateCell};
use crate::system::WindowSystem;

enum Ctrl {
    Poke,
    Stop,
}

struct Shared {
    registry: Mutex<Registry>,
    state: StateCell,
    callback: CallbackSlot,
    running: AtomicBool,
}

struct Worker {
    ctrl: mpsc::Sender<Ctrl>,
    handle: thread::JoinHandle<()>,
}

/// Desktop z-order manager. One instance owns the OS hook for its process;
/// construct against a fake [`WindowSystem`] to drive it in tests.
pub struct Engine {
    system: Arc<dyn WindowSystem>,
    config: EngineConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl Engine {
    /// Engine over the platform's window system.
    pub fn new(config: EngineConfig) -> Self {
        #[cfg(windows)]
        let system: Arc<dyn WindowSystem> =
            Arc::new(crate::win32::Win32System::new(config.foreground_hook));
        #[cfg(not(windows))]
        let system: Arc<dyn WindowSystem> = Arc::new(crate::stub::StubSystem::new());
        Self::with_system(system, config)
    }

    /// Composition root: engine over an arbitrary window system.
    pub fn with_system(system: Arc<dyn WindowSystem>, config: EngineConfig) -> Self {
        Self {
            system,
            config,
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::new()),
                state: StateCell::new(DesktopState::ShowingWindows),
                callback: CallbackSlot::new(),
                running: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Installs the detection hook and starts the detector thread. Fails
    /// fast if already initialized; a hook-install failure leaves the
    /// process unmanaged but otherwise unharmed.
    pub fn initialize(&self) -> Result<()> {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let (tx, rx) = mpsc::channel::<Ctrl>();
        let poke_tx = tx.clone();
        self.system.install_hook(Box::new(move || {
            let _ = poke_tx.send(Ctrl::Poke);
        }))?;

        // Seed the state cell before anything can observe it. The seeding
        // sample is not a transition and fires no callback.
        let initial = self.system.sample_desktop();
        self.shared.state.set(initial);
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = self.shared.clone();
        let system = self.system.clone();
        let poll = self.config.poll_interval();
        let safety_ticks = self.config.safety_ticks();
        let mut tracker = EdgeTracker::new();
        tracker.seed(initial);

        let handle = match thread::Builder::new()
            .name("zdesk-detector".into())
            .spawn(move || detector_loop(shared, system, rx, poll, safety_ticks, tracker))
        {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                self.system.remove_hook();
                return Err(Error::Os(format!("spawn detector thread: {e}")));
            }
        };

        *worker = Some(Worker { ctrl: tx, handle });
        tracing::info!(state = initial.as_raw(), "engine initialized");
        Ok(())
    }

    /// Stops the detector (joining it, so no pass runs after this returns),
    /// removes the hook, and clears all registrations and the subscriber.
    /// Safe to call repeatedly or when never initialized.
    pub fn shutdown(&self) {
        let worker = self.worker.lock().unwrap().take();
        let Some(worker) = worker else {
            return;
        };
        self.shared.running.store(false, Ordering::SeqCst);
        let _ = worker.ctrl.send(Ctrl::Stop);
        if worker.handle.join().is_err() {
            tracing::error!("detector thread panicked");
        }
        self.system.remove_hook();
        self.shared.registry.lock().unwrap().clear();
        self.shared.callback.clear();
        self.shared.state.set(DesktopState::ShowingWindows);
        tracing::info!("engine shut down");
    }

    /// Adds `id` to the managed set. Re-registering is an idempotent
    /// success. If the desktop is currently revealed the new window is
    /// corrected immediately rather than waiting for the next transition.
    pub fn register_window(&self, id: WindowId) -> Result<RegisterOutcome> {
        self.ensure_running()?;
        if id.is_null() {
            return Err(Error::InvalidWindow);
        }
        let mut registry = self.shared.registry.lock().unwrap();
        let outcome = registry.insert(id);
        tracing::debug!(window = id.raw(), ?outcome, "register window");
        if outcome == RegisterOutcome::Added
            && self.shared.state.get() == DesktopState::ShowingDesktop
        {
            enforce::run_pass(
                &mut registry,
                DesktopState::ShowingDesktop,
                self.system.as_ref(),
            );
        }
        Ok(outcome)
    }

    /// Removes `id` from the managed set. Unregistering an absent id is a
    /// quiet success so window-close paths can clean up defensively.
    pub fn unregister_window(&self, id: WindowId) -> Result<()> {
        self.ensure_running()?;
        if id.is_null() {
            return Err(Error::InvalidWindow);
        }
        let removed = self.shared.registry.lock().unwrap().remove(id);
        tracing::debug!(window = id.raw(), removed, "unregister window");
        Ok(())
    }

    /// Pure lookup. The null sentinel and an uninitialized engine both
    /// answer false.
    pub fn is_window_registered(&self, id: WindowId) -> bool {
        if !self.shared.running.load(Ordering::SeqCst) {
            return false;
        }
        self.shared.registry.lock().unwrap().contains(id)
    }

    /// Most recently detected desktop state. Lock-free; never blocks on the
    /// hook mechanism or an in-flight pass.
    pub fn desktop_state(&self) -> DesktopState {
        self.shared.state.get()
    }

    /// Replaces the transition subscriber (one slot, last set wins; `None`
    /// disables). Invoked on the detector thread after enforcement.
    pub fn set_desktop_state_callback(&self, callback: Option<StateCallback>) -> Result<()> {
        self.ensure_running()?;
        self.shared.callback.set(callback);
        Ok(())
    }

    /// Synchronous enforcement pass on the caller thread with the current
    /// state. Per-window failures are absorbed.
    pub fn refresh_window_positions(&self) -> Result<()> {
        self.ensure_running()?;
        let state = self.shared.state.get();
        let mut registry = self.shared.registry.lock().unwrap();
        let stats = enforce::run_pass(&mut registry, state, self.system.as_ref());
        tracing::debug!(
            enforced = stats.enforced,
            purged = stats.purged,
            "explicit refresh"
        );
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shared.running.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn detector_loop(
    shared: Arc<Shared>,
    system: Arc<dyn WindowSystem>,
    rx: mpsc::Receiver<Ctrl>,
    poll: Duration,
    safety_ticks: Option<u64>,
    mut tracker: EdgeTracker,
) {
    let mut ticks_since_pass: u64 = 0;
    loop {
        match rx.recv_timeout(poll) {
            Ok(Ctrl::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(Ctrl::Poke) | Err(RecvTimeoutError::Timeout) => {}
        }

        let sample = system.sample_desktop();
        if tracker.observe(sample) {
            tracing::info!(state = sample.as_raw(), "desktop state transition");
            // Publish first so poll-path readers never see a stale value,
            // then enforce, then notify: subscribers observe a corrected
            // desktop.
            shared.state.set(sample);
            {
                let mut registry = shared.registry.lock().unwrap();
                enforce::run_pass(&mut registry, sample, system.as_ref());
            }
            shared.callback.notify(sample);
            ticks_since_pass = 0;
        } else if let Some(every) = safety_ticks {
            // Low-frequency reassertion to undo drift caused by other
            // window-management software.
            ticks_since_pass += 1;
            if ticks_since_pass >= every {
                ticks_since_pass = 0;
                let mut registry = shared.registry.lock().unwrap();
                if !registry.is_empty() {
                    enforce::run_pass(&mut registry, sample, system.as_ref());
                }
            }
        }
    }
    tracing::debug!("detector loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubSystem;

    #[test]
    fn operations_fail_before_initialize() {
        let engine = Engine::with_system(Arc::new(StubSystem::new()), EngineConfig::default());
        let w = WindowId::from_raw(42);
        assert!(matches!(
            engine.register_window(w),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            engine.unregister_window(w),
            Err(Error::NotInitialized)
        ));
        assert!(!engine.is_window_registered(w));
        assert!(matches!(
            engine.refresh_window_positions(),
            Err(Error::NotInitialized)
        ));
        assert_eq!(engine.desktop_state(), DesktopState::ShowingWindows);
    }

    #[test]
    fn stub_hook_failure_surfaces_from_initialize() {
        let engine = Engine::with_system(Arc::new(StubSystem::new()), EngineConfig::default());
        assert!(matches!(engine.initialize(), Err(Error::HookInstall(_))));
        // Process continues unmanaged; shutdown stays a no-op.
        engine.shutdown();
    }
}
