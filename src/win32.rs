//! Win32 window system: shell probing, sentinel banding, and z-order
//! directives.
//!
//! Detection works off a zero-sized sentinel window parked at the very
//! bottom of the z-order. When the shell reveals the desktop it raises the
//! desktop-icons host above everything normal, which puts the host above
//! the sentinel; observing the sentinel below the host is therefore the
//! "desktop revealed" signal. While revealed, the sentinel is re-banded
//! just under the topmost band so that dismissing the desktop drops the
//! host back below it and the signal clears.

use std::ffi::c_void;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use once_cell::sync::{Lazy, OnceCell};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};
use windows::Win32::UI::Accessibility::{HWINEVENTHOOK, SetWinEventHook, UnhookWinEvent};
use windows::Win32::UI::WindowsAndMessaging::*;
use windows::core::{PCWSTR, s, w};

use crate::error::{Error, Result};
use crate::registry::WindowId;
use crate::state::DesktopState;
use crate::system::{Poke, WindowSystem};

const SENTINEL_CLASS: PCWSTR = w!("ZdeskSentinel");

// Z-order only: never move, size, activate, or chase owner windows. Our own
// repositions also skip WM_WINDOWPOSCHANGING so the sentinel's wndproc
// guard below does not cancel them.
const ZORDER_ONLY: SET_WINDOW_POS_FLAGS = SET_WINDOW_POS_FLAGS(
    SWP_NOMOVE.0 | SWP_NOSIZE.0 | SWP_NOOWNERZORDER.0 | SWP_NOACTIVATE.0 | SWP_NOSENDCHANGING.0,
);

// The hook proc and the sentinel wndproc cannot capture state; the shell
// hook is singleton per process anyway, so one slot suffices.
static POKE: Lazy<Mutex<Option<Poke>>> = Lazy::new(|| Mutex::new(None));

fn poke_detector() {
    if let Ok(slot) = POKE.lock() {
        if let Some(poke) = slot.as_ref() {
            poke();
        }
    }
}

/// Production [`WindowSystem`] backed by the Win32 shell.
pub struct Win32System {
    use_foreground_hook: bool,
    sentinel: Arc<AtomicUsize>,
    banded: AtomicI32,
    hook_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Win32System {
    pub fn new(use_foreground_hook: bool) -> Self {
        Self {
            use_foreground_hook,
            sentinel: Arc::new(AtomicUsize::new(0)),
            banded: AtomicI32::new(DesktopState::ShowingWindows.as_raw()),
            hook_thread: Mutex::new(None),
        }
    }

    fn sentinel_hwnd(&self) -> Option<HWND> {
        let raw = self.sentinel.load(Ordering::SeqCst);
        if raw == 0 {
            None
        } else {
            Some(HWND(raw as *mut c_void))
        }
    }
}

impl WindowSystem for Win32System {
    fn install_hook(&self, poke: Poke) -> Result<()> {
        let mut guard = self.hook_thread.lock().unwrap();
        if guard.is_some() {
            return Err(Error::HookInstall("hook already installed".into()));
        }
        *POKE.lock().unwrap() = Some(poke);

        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let sentinel = self.sentinel.clone();
        let with_fg_hook = self.use_foreground_hook;
        let handle = thread::Builder::new()
            .name("zdesk-hook".into())
            .spawn(move || hook_thread_main(sentinel, with_fg_hook, ready_tx))
            .map_err(|e| Error::HookInstall(format!("spawn hook thread: {e}")))?;

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {
                *guard = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                *POKE.lock().unwrap() = None;
                Err(e)
            }
            Err(_) => {
                *POKE.lock().unwrap() = None;
                Err(Error::HookInstall("hook thread did not come up".into()))
            }
        }
    }

    fn remove_hook(&self) {
        let handle = self.hook_thread.lock().unwrap().take();
        let Some(handle) = handle else {
            return;
        };
        if let Some(sentinel) = self.sentinel_hwnd() {
            unsafe {
                let _ = PostMessageW(sentinel, WM_CLOSE, WPARAM(0), LPARAM(0));
            }
        }
        if handle.join().is_err() {
            tracing::error!("hook thread panicked");
        }
        *POKE.lock().unwrap() = None;
    }

    fn sample_desktop(&self) -> DesktopState {
        let Some(sentinel) = self.sentinel_hwnd() else {
            return DesktopState::ShowingWindows;
        };
        let state = if desktop_revealed(sentinel) {
            DesktopState::ShowingDesktop
        } else {
            DesktopState::ShowingWindows
        };
        // Re-band only on a probe edge; repeated identical samples leave the
        // sentinel alone.
        if self.banded.swap(state.as_raw(), Ordering::SeqCst) != state.as_raw() {
            band_sentinel(sentinel, state);
        }
        state
    }

    fn window_alive(&self, id: WindowId) -> bool {
        unsafe { IsWindow(HWND(id.raw() as *mut c_void)).as_bool() }
    }

    fn enforce(&self, id: WindowId, state: DesktopState) -> Result<()> {
        let hwnd = HWND(id.raw() as *mut c_void);
        let insert_after = if state == DesktopState::ShowingDesktop {
            HWND_TOPMOST
        } else {
            HWND_NOTOPMOST
        };
        unsafe { SetWindowPos(hwnd, insert_after, 0, 0, 0, 0, ZORDER_ONLY) }
            .map_err(|e| Error::Os(format!("SetWindowPos on {:#x}: {e}", id.raw())))
    }
}

fn hook_thread_main(
    sentinel: Arc<AtomicUsize>,
    with_fg_hook: bool,
    ready_tx: mpsc::Sender<Result<()>>,
) {
    unsafe {
        let hinst = match GetModuleHandleW(None) {
            Ok(h) => h,
            Err(e) => {
                let _ = ready_tx.send(Err(Error::HookInstall(format!("GetModuleHandleW: {e}"))));
                return;
            }
        };
        let wc = WNDCLASSW {
            lpfnWndProc: Some(sentinel_proc),
            hInstance: hinst.into(),
            lpszClassName: SENTINEL_CLASS,
            ..Default::default()
        };
        // Registration fails harmlessly once the class exists.
        RegisterClassW(&wc);

        let hwnd = match CreateWindowExW(
            WS_EX_TOOLWINDOW,
            SENTINEL_CLASS,
            SENTINEL_CLASS,
            WS_POPUP | WS_DISABLED,
            0,
            0,
            0,
            0,
            None,
            None,
            hinst,
            None,
        ) {
            Ok(h) => h,
            Err(e) => {
                let _ = ready_tx.send(Err(Error::HookInstall(format!("create sentinel: {e}"))));
                return;
            }
        };
        let _ = SetWindowPos(hwnd, HWND_BOTTOM, 0, 0, 0, 0, ZORDER_ONLY);
        sentinel.store(hwnd.0 as usize, Ordering::SeqCst);

        let mut fg_hook = HWINEVENTHOOK::default();
        if with_fg_hook {
            fg_hook = SetWinEventHook(
                EVENT_SYSTEM_FOREGROUND,
                EVENT_SYSTEM_FOREGROUND,
                None,
                Some(foreground_proc),
                0,
                0,
                WINEVENT_OUTOFCONTEXT | WINEVENT_SKIPOWNPROCESS,
            );
            if fg_hook.is_invalid() {
                sentinel.store(0, Ordering::SeqCst);
                let _ = DestroyWindow(hwnd);
                let _ = ready_tx.send(Err(Error::HookInstall(
                    "SetWinEventHook(EVENT_SYSTEM_FOREGROUND) failed".into(),
                )));
                return;
            }
        }

        let _ = ready_tx.send(Ok(()));
        tracing::debug!(sentinel = hwnd.0 as usize, "hook thread up");

        let mut msg = MSG::default();
        while GetMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        if !fg_hook.is_invalid() {
            let _ = UnhookWinEvent(fg_hook);
        }
        sentinel.store(0, Ordering::SeqCst);
        tracing::debug!("hook thread down");
    }
}

unsafe extern "system" fn sentinel_proc(hwnd: HWND, msg: u32, w: WPARAM, l: LPARAM) -> LRESULT {
    unsafe {
        match msg {
            WM_WINDOWPOSCHANGING => {
                // Outside parties must not move the sentinel in z; our own
                // calls carry SWP_NOSENDCHANGING and never land here.
                let pos = l.0 as *mut WINDOWPOS;
                if !pos.is_null() {
                    (*pos).flags |= SWP_NOZORDER;
                }
                LRESULT(0)
            }
            WM_DISPLAYCHANGE | WM_SETTINGCHANGE => {
                // Desktop layout may have shifted under the managed windows.
                poke_detector();
                LRESULT(0)
            }
            WM_CLOSE => {
                let _ = DestroyWindow(hwnd);
                LRESULT(0)
            }
            WM_DESTROY => {
                PostQuitMessage(0);
                LRESULT(0)
            }
            _ => DefWindowProcW(hwnd, msg, w, l),
        }
    }
}

unsafe extern "system" fn foreground_proc(
    _hook: HWINEVENTHOOK,
    event: u32,
    _hwnd: HWND,
    _id_object: i32,
    _id_child: i32,
    _id_thread: u32,
    _time: u32,
) {
    // "Show desktop" always moves the foreground to the shell, so a
    // foreground change is the cue to resample ahead of the next poll. The
    // detector coalesces, so over-poking is harmless.
    if event == EVENT_SYSTEM_FOREGROUND {
        poke_detector();
    }
}

/// True while the desktop-icons host sits above our sentinel in the
/// z-order.
fn desktop_revealed(sentinel: HWND) -> bool {
    unsafe {
        let Some(host) = desktop_icons_host() else {
            return false;
        };
        if !IsWindowVisible(host).as_bool() {
            return false;
        }
        // Walk top-level windows below the host looking for the sentinel.
        let mut below = host;
        loop {
            match FindWindowExW(None, below, SENTINEL_CLASS, SENTINEL_CLASS) {
                Ok(found) if !found.is_invalid() => {
                    if found == sentinel {
                        return true;
                    }
                    below = found;
                }
                _ => return false,
            }
        }
    }
}

/// The window hosting the desktop icons: `Progman` itself on shells that
/// parent `SHELLDLL_DefView` there (Windows 11 24H2+ and some classic
/// setups), otherwise the visible `WorkerW` sibling owning the DefView.
unsafe fn desktop_icons_host() -> Option<HWND> {
    unsafe {
        let shell = default_shell_window()?;
        if FindWindowExW(shell, None, w!("SHELLDLL_DefView"), PCWSTR::null()).is_ok() {
            return Some(shell);
        }
        if use_shell_window_as_icons_host() {
            // Newer shells keep the DefView under Progman; if it is not
            // there yet the desktop is not hosted anywhere we can track.
            return None;
        }
        let mut worker = HWND::default();
        loop {
            worker = match FindWindowExW(None, worker, w!("WorkerW"), PCWSTR::null()) {
                Ok(h) if !h.is_invalid() => h,
                _ => return None,
            };
            if IsWindowVisible(worker).as_bool()
                && same_process(shell, worker)
                && FindWindowExW(worker, None, w!("SHELLDLL_DefView"), PCWSTR::null()).is_ok()
            {
                return Some(worker);
            }
        }
    }
}

unsafe fn default_shell_window() -> Option<HWND> {
    unsafe {
        let shell = GetShellWindow();
        if shell.is_invalid() {
            return None;
        }
        let mut class = [0u16; 16];
        let len = GetClassNameW(shell, &mut class);
        if len > 0 && String::from_utf16_lossy(&class[..len as usize]) == "Progman" {
            Some(shell)
        } else {
            None
        }
    }
}

/// Windows 11 24H2 moved the desktop icons host; probe user32 for an export
/// introduced alongside that change.
fn use_shell_window_as_icons_host() -> bool {
    static CHECKED: OnceCell<bool> = OnceCell::new();
    *CHECKED.get_or_init(|| unsafe {
        GetModuleHandleW(w!("user32"))
            .ok()
            .and_then(|user32| GetProcAddress(user32, s!("GetCurrentMonitorTopologyId")))
            .is_some()
    })
}

fn same_process(a: HWND, b: HWND) -> bool {
    unsafe {
        let mut pid_a = 0u32;
        let mut pid_b = 0u32;
        GetWindowThreadProcessId(a, Some(&mut pid_a));
        GetWindowThreadProcessId(b, Some(&mut pid_b));
        pid_a != 0 && pid_a == pid_b
    }
}

/// Repositions the sentinel for the new state: just under the backmost
/// topmost window while the desktop is revealed, back to the very bottom
/// otherwise.
fn band_sentinel(sentinel: HWND, state: DesktopState) {
    unsafe {
        if state == DesktopState::ShowingDesktop {
            let Some(host) = desktop_icons_host() else {
                return;
            };
            let _ = SetWindowPos(sentinel, HWND_TOPMOST, 0, 0, 0, 0, ZORDER_ONLY);
            let mut hwnd = host;
            loop {
                hwnd = match GetWindow(hwnd, GW_HWNDPREV) {
                    Ok(h) if !h.is_invalid() => h,
                    _ => break,
                };
                if (GetWindowLongPtrW(hwnd, GWL_EXSTYLE) as u32) & WS_EX_TOPMOST.0 != 0
                    && SetWindowPos(sentinel, hwnd, 0, 0, 0, 0, ZORDER_ONLY).is_ok()
                {
                    return;
                }
            }
        } else {
            let _ = SetWindowPos(sentinel, HWND_BOTTOM, 0, 0, 0, 0, ZORDER_ONLY);
        }
    }
}
