use std::sync::atomic::{AtomicI32, Ordering};

/// Whether the shell is currently revealing the desktop. The raw values are
/// part of the C surface and must not change.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopState {
    ShowingWindows = 0,
    ShowingDesktop = 1,
}

impl DesktopState {
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(DesktopState::ShowingWindows),
            1 => Some(DesktopState::ShowingDesktop),
            _ => None,
        }
    }
}

/// Atomically readable current state. Kept outside the registry lock so a
/// state read never waits behind an enforcement pass.
pub(crate) struct StateCell(AtomicI32);

impl StateCell {
    pub(crate) fn new(initial: DesktopState) -> Self {
        Self(AtomicI32::new(initial.as_raw()))
    }

    pub(crate) fn get(&self) -> DesktopState {
        DesktopState::from_raw(self.0.load(Ordering::SeqCst)).unwrap_or(DesktopState::ShowingWindows)
    }

    pub(crate) fn set(&self, state: DesktopState) {
        self.0.store(state.as_raw(), Ordering::SeqCst);
    }
}

/// Edge-trigger filter over repeated samples. The shell fires the same
/// semantic event in bursts; only a changed sample counts as a transition.
pub(crate) struct EdgeTracker {
    last: Option<DesktopState>,
}

impl EdgeTracker {
    pub(crate) fn new() -> Self {
        Self { last: None }
    }

    /// Seed the tracker without reporting a transition.
    pub(crate) fn seed(&mut self, state: DesktopState) {
        self.last = Some(state);
    }

    /// Returns true when `sample` differs from the last observed value.
    pub(crate) fn observe(&mut self, sample: DesktopState) -> bool {
        let changed = self.last != Some(sample);
        self.last = Some(sample);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_are_stable() {
        assert_eq!(DesktopState::ShowingWindows.as_raw(), 0);
        assert_eq!(DesktopState::ShowingDesktop.as_raw(), 1);
        assert_eq!(DesktopState::from_raw(1), Some(DesktopState::ShowingDesktop));
        assert_eq!(DesktopState::from_raw(7), None);
    }

    #[test]
    fn identical_samples_coalesce() {
        let mut t = EdgeTracker::new();
        t.seed(DesktopState::ShowingWindows);
        assert!(!t.observe(DesktopState::ShowingWindows));
        assert!(t.observe(DesktopState::ShowingDesktop));
        assert!(!t.observe(DesktopState::ShowingDesktop));
        assert!(!t.observe(DesktopState::ShowingDesktop));
        assert!(t.observe(DesktopState::ShowingWindows));
    }

    #[test]
    fn seed_is_not_a_transition() {
        let mut t = EdgeTracker::new();
        t.seed(DesktopState::ShowingDesktop);
        assert!(!t.observe(DesktopState::ShowingDesktop));
    }

    #[test]
    fn cell_read_back() {
        let c = StateCell::new(DesktopState::ShowingWindows);
        assert_eq!(c.get(), DesktopState::ShowingWindows);
        c.set(DesktopState::ShowingDesktop);
        assert_eq!(c.get(), DesktopState::ShowingDesktop);
    }
}
