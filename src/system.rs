use crate::error::Result;
use crate::registry::WindowId;
use crate::state::DesktopState;

/// Callback the OS side invokes to request an immediate state resample
/// (shell event arrived, display layout changed).
pub type Poke = Box<dyn Fn() + Send + Sync>;

/// The single seam between the engine and the operating system. The Win32
/// implementation probes the shell and issues z-order directives; tests
/// substitute a fake.
pub trait WindowSystem: Send + Sync {
    /// Install the OS-level detection mechanism. Called once per
    /// initialization; a failure here fails `Engine::initialize`.
    fn install_hook(&self, poke: Poke) -> Result<()>;

    /// Tear the detection mechanism back down. Must be safe to call when
    /// nothing is installed.
    fn remove_hook(&self);

    /// One probe of the current desktop state. Must not block on the hook
    /// machinery.
    fn sample_desktop(&self) -> DesktopState;

    /// Whether the window behind `id` still exists. Registered windows can
    /// die at any time; the registry does not own their lifetime.
    fn window_alive(&self, id: WindowId) -> bool;

    /// Apply the z-order directive for one window: above the desktop layer
    /// while it is revealed, back to the normal band otherwise. Never moves,
    /// resizes, or activates the window.
    fn enforce(&self, id: WindowId, state: DesktopState) -> Result<()>;
}
