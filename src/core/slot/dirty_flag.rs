use crate::core::context::PassVersion;
use std::cell::Cell;

/// Validity of a slot's cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// Must recompute on the next pull.
    Dirty,
    /// Cached value is trustworthy for the stamped pass.
    Valid(PassVersion),
    /// Recomputes on every pull; invalidation and validation leave it untouched.
    AlwaysDirty,
}

/// Per-slot validity marker.
#[derive(Debug)]
pub struct DirtyFlag {
    state: Cell<DirtyState>,
}

impl Default for DirtyFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtyFlag {
    pub fn new() -> Self {
        DirtyFlag {
            state: Cell::new(DirtyState::Dirty),
        }
    }

    pub fn always_dirty() -> Self {
        DirtyFlag {
            state: Cell::new(DirtyState::AlwaysDirty),
        }
    }

    pub fn state(&self) -> DirtyState {
        self.state.get()
    }

    /// Forces recomputation on the next pull.
    pub fn invalidate(&self) {
        if self.state.get() != DirtyState::AlwaysDirty {
            self.state.set(DirtyState::Dirty);
        }
    }

    /// Whether a pull in `pass` has to recompute.
    pub fn is_dirty_for(&self, pass: PassVersion) -> bool {
        match self.state.get() {
            DirtyState::Dirty | DirtyState::AlwaysDirty => true,
            DirtyState::Valid(stamped) => stamped != pass,
        }
    }

    pub fn mark_valid(&self, pass: PassVersion) {
        if self.state.get() != DirtyState::AlwaysDirty {
            self.state.set(DirtyState::Valid(pass));
        }
    }

    pub fn is_always_dirty(&self) -> bool {
        self.state.get() == DirtyState::AlwaysDirty
    }

    /// Switches between the always-dirty mode and regular invalidation.
    ///
    /// Leaving always-dirty mode starts out `Dirty`.
    pub fn set_always_dirty(&self, always: bool) {
        if always {
            self.state.set(DirtyState::AlwaysDirty);
        } else if self.is_always_dirty() {
            self.state.set(DirtyState::Dirty);
        }
    }
}
