//! One enforcement pass over the registry.

use crate::registry::{Registry, WindowId};
use crate::state::DesktopState;
use crate::system::WindowSystem;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassStats {
    pub enforced: usize,
    pub purged: usize,
}

/// Visits live entries in registration order and applies the directive for
/// `state`. A failing directive is logged and skipped; the pass never aborts
/// for one bad window. Entries found dead are purged after the sweep.
///
/// Caller holds the registry lock for the whole pass, so registrations
/// cannot interleave with the iteration.
pub(crate) fn run_pass(
    registry: &mut Registry,
    state: DesktopState,
    system: &dyn WindowSystem,
) -> PassStats {
    if registry.is_empty() {
        return PassStats::default();
    }

    let mut dead: Vec<WindowId> = Vec::new();
    let mut enforced = 0usize;
    for entry in registry.iter() {
        if !system.window_alive(entry.id) {
            dead.push(entry.id);
            continue;
        }
        match system.enforce(entry.id, state) {
            Ok(()) => enforced += 1,
            Err(e) => {
                tracing::warn!(window = entry.id.raw(), error = %e, "enforce directive failed");
            }
        }
    }

    let purged = dead.len();
    if purged > 0 {
        tracing::debug!(count = purged, "purging dead windows");
        registry.purge(&dead);
    }
    PassStats { enforced, purged }
}
