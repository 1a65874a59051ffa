//! Stable C surface. One process-wide engine instance behind these exports;
//! failures flatten to `false`/no-op and nothing unwinds across the
//! boundary.

use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

use crate::config::EngineConfig;
use crate::dispatch::StateCallback;
use crate::engine::Engine;
use crate::registry::WindowId;

/// State-change callback as seen from C: receives 0 (windows shown) or
/// 1 (desktop shown).
pub type RawStateCallback = extern "system" fn(state: i32);

static ENGINE: Lazy<Mutex<Option<Engine>>> = Lazy::new(|| Mutex::new(None));

fn engine_slot() -> MutexGuard<'static, Option<Engine>> {
    ENGINE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Creates the process engine and installs the detection hook. The module
/// context is accepted for ABI compatibility and unused; scope is the
/// calling process. Returns false when already initialized or when the hook
/// cannot be installed.
#[unsafe(no_mangle)]
pub extern "system" fn zdesk_initialize(_module: *mut c_void) -> bool {
    let mut slot = engine_slot();
    if slot.is_some() {
        return false;
    }
    let engine = Engine::new(EngineConfig::default());
    match engine.initialize() {
        Ok(()) => {
            *slot = Some(engine);
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "initialize failed");
            false
        }
    }
}

/// Tears the engine down. Idempotent; safe to call without a prior
/// successful initialize.
#[unsafe(no_mangle)]
pub extern "system" fn zdesk_finalize() {
    if let Some(engine) = engine_slot().take() {
        engine.shutdown();
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn zdesk_register_window(hwnd: *mut c_void) -> bool {
    let slot = engine_slot();
    match slot.as_ref() {
        Some(engine) => engine.register_window(WindowId::from_raw(hwnd as usize)).is_ok(),
        None => false,
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn zdesk_unregister_window(hwnd: *mut c_void) -> bool {
    let slot = engine_slot();
    match slot.as_ref() {
        Some(engine) => engine.unregister_window(WindowId::from_raw(hwnd as usize)).is_ok(),
        None => false,
    }
}

/// 0 = showing windows, 1 = showing desktop. Reports 0 while uninitialized.
#[unsafe(no_mangle)]
pub extern "system" fn zdesk_get_desktop_state() -> i32 {
    let slot = engine_slot();
    slot.as_ref().map_or(0, |e| e.desktop_state().as_raw())
}

/// Replaces the process-wide state callback; pass null to disable. The
/// callback runs on the detector thread after enforcement.
#[unsafe(no_mangle)]
pub extern "system" fn zdesk_set_desktop_state_callback(callback: Option<RawStateCallback>) {
    let slot = engine_slot();
    if let Some(engine) = slot.as_ref() {
        let mapped: Option<StateCallback> =
            callback.map(|f| Arc::new(move |state: crate::DesktopState| f(state.as_raw())) as _);
        let _ = engine.set_desktop_state_callback(mapped);
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn zdesk_refresh_window_positions() {
    let slot = engine_slot();
    if let Some(engine) = slot.as_ref() {
        let _ = engine.refresh_window_positions();
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn zdesk_is_window_registered(hwnd: *mut c_void) -> bool {
    let slot = engine_slot();
    slot.as_ref()
        .is_some_and(|e| e.is_window_registered(WindowId::from_raw(hwnd as usize)))
}
