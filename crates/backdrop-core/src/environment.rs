//! Observed host environment.

use crate::geometry::{Vec2, Viewport};

/// Snapshot of the signals the engine adapts to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvironmentState {
    /// Current viewport size.
    pub viewport: Viewport,
    /// Whether the page/screen is currently hidden.
    pub hidden: bool,
    /// Reduced-motion preference, resolved once at construction.
    pub reduced_motion: bool,
    /// Last pointer position in viewport pixels, if the pointer is inside.
    pub pointer: Option<Vec2>,
}
