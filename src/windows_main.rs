// Windows-only module compiled via cfg in the binary's main.rs
//
// Manual test harness for the engine: puts up a small window, registers it,
// and logs every desktop state transition. Press Win+D and the window
// should stay put.

use anyhow::{Context, Result};
use std::sync::Arc;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::*;
use windows::core::w;

use zdesk::{Engine, WindowId, config};

extern "system" fn wndproc(hwnd: HWND, msg: u32, w: WPARAM, l: LPARAM) -> LRESULT {
    match msg {
        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, w, l) },
    }
}

pub fn main() -> Result<()> {
    let (cfg, _paths) = config::load_or_default()?;
    let engine = Engine::new(cfg);
    engine
        .initialize()
        .context("initialize desktop manager")?;
    engine.set_desktop_state_callback(Some(Arc::new(|state| {
        tracing::info!(state = state.as_raw(), "desktop state changed");
    })))?;

    unsafe {
        let class_name = w!("ZdeskMonWndClass");
        let hinst = GetModuleHandleW(None)?;
        let wc = WNDCLASSW {
            lpfnWndProc: Some(wndproc),
            hInstance: hinst.into(),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            lpszClassName: class_name,
            ..Default::default()
        };
        RegisterClassW(&wc);

        let hwnd = CreateWindowExW(
            WS_EX_TOOLWINDOW,
            class_name,
            w!("zdesk monitor"),
            WS_OVERLAPPEDWINDOW,
            80,
            80,
            320,
            120,
            None,
            None,
            hinst,
            None,
        )?;
        let _ = ShowWindow(hwnd, SW_SHOW);

        let id = WindowId::from_raw(hwnd.0 as usize);
        engine
            .register_window(id)
            .context("register monitor window")?;
        tracing::info!(window = id.raw(), "monitor window registered");

        let mut msg = MSG::default();
        while GetMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    engine.shutdown();
    Ok(())
}
