//! Tracking of host signals: viewport, visibility, pointer and motion
//! preference.

use backdrop_core::{EnvironmentState, Vec2, Viewport};

/// What the engine can query from its host at construction.
pub trait HostSignals {
    fn viewport(&self) -> Viewport;
    fn is_hidden(&self) -> bool;
    fn prefers_reduced_motion(&self) -> bool;
}

/// Fixed signals, handy for hosts without live queries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StaticSignals {
    pub viewport: Viewport,
    pub hidden: bool,
    pub reduced_motion: bool,
}

impl HostSignals for StaticSignals {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion
    }
}

/// Change produced by a host event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvironmentChange {
    Resized { from: Viewport, to: Viewport },
    Hidden,
    Visible,
    Unchanged,
}

/// Holds the latest [`EnvironmentState`] and folds host events into it.
#[derive(Debug, Clone)]
pub struct EnvironmentReactor {
    state: EnvironmentState,
}

impl EnvironmentReactor {
    /// Snapshot the host once. `reduced_motion_override` wins over the
    /// host preference when set; the result never changes afterwards.
    pub fn new(signals: &impl HostSignals, reduced_motion_override: Option<bool>) -> Self {
        Self {
            state: EnvironmentState {
                viewport: signals.viewport(),
                hidden: signals.is_hidden(),
                reduced_motion: reduced_motion_override
                    .unwrap_or_else(|| signals.prefers_reduced_motion()),
                pointer: None,
            },
        }
    }

    pub fn state(&self) -> &EnvironmentState {
        &self.state
    }

    pub fn resize(&mut self, viewport: Viewport) -> EnvironmentChange {
        let from = self.state.viewport;
        if from == viewport {
            return EnvironmentChange::Unchanged;
        }
        self.state.viewport = viewport;
        EnvironmentChange::Resized { from, to: viewport }
    }

    pub fn set_hidden(&mut self, hidden: bool) -> EnvironmentChange {
        if self.state.hidden == hidden {
            return EnvironmentChange::Unchanged;
        }
        self.state.hidden = hidden;
        if hidden {
            EnvironmentChange::Hidden
        } else {
            EnvironmentChange::Visible
        }
    }

    pub fn pointer_moved(&mut self, at: Vec2) {
        self.state.pointer = Some(at);
    }

    pub fn pointer_left(&mut self) {
        self.state.pointer = None;
    }
}
