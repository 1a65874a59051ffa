//! Placeholder window system for platforms without a desktop shell hook.
//! `initialize` fails cleanly through it; the host process just runs
//! unmanaged.

use crate::error::{Error, Result};
use crate::registry::WindowId;
use crate::state::DesktopState;
use crate::system::{Poke, WindowSystem};

pub struct StubSystem;

impl StubSystem {
    pub fn new() -> Self {
        StubSystem
    }
}

impl Default for StubSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowSystem for StubSystem {
    fn install_hook(&self, _poke: Poke) -> Result<()> {
        Err(Error::HookInstall(
            "desktop state hooks are not available on this platform".into(),
        ))
    }

    fn remove_hook(&self) {}

    fn sample_desktop(&self) -> DesktopState {
        DesktopState::ShowingWindows
    }

    fn window_alive(&self, _id: WindowId) -> bool {
        false
    }

    fn enforce(&self, id: WindowId, _state: DesktopState) -> Result<()> {
        Err(Error::Os(format!(
            "no window system to enforce on (window {})",
            id.raw()
        )))
    }
}
