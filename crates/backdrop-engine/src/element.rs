//! Visual elements and the render handles they own.

use std::fmt;
use std::time::Duration;

use backdrop_core::{BubbleVariant, ElementKind, Rgba, Vec2, Vec3};

use crate::renderer::NodeId;

/// Unique, monotonically increasing element identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Resource backing an element's presentation.
///
/// Deliberately neither `Clone` nor `Copy`: a handle is moved out of its
/// element and consumed by [`Renderer::unmount`](crate::Renderer::unmount),
/// so it can only ever be released once.
#[derive(Debug, PartialEq, Eq)]
pub enum RenderHandle {
    /// A node in a display tree.
    Node(NodeId),
    /// A fixed slot in a shared point buffer.
    Slot(usize),
    /// A particle record on a 2D canvas.
    Particle(ElementId),
}

/// Where an element sits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    /// Viewport pixels, y down.
    Plane(Vec2),
    /// Scene units around the origin.
    Space(Vec3),
}

impl Position {
    pub fn plane(self) -> Option<Vec2> {
        match self {
            Position::Plane(p) => Some(p),
            Position::Space(_) => None,
        }
    }

    pub fn space(self) -> Option<Vec3> {
        match self {
            Position::Space(p) => Some(p),
            Position::Plane(_) => None,
        }
    }
}

/// One spawned animated primitive.
#[derive(Debug)]
pub struct VisualElement {
    pub id: ElementId,
    pub kind: ElementKind,
    pub position: Position,
    pub velocity: Option<Vec2>,
    pub size: f32,
    pub color: Rgba,
    /// Clock reading at spawn.
    pub born_at: Duration,
    /// Age at which the element retires; `None` lives until evicted.
    pub lifetime: Option<Duration>,
    /// Declared animation duration (bubbles).
    pub duration: Duration,
    /// Declared animation start delay (bubbles).
    pub delay: Duration,
    pub variant: BubbleVariant,
    handle: Option<RenderHandle>,
}

impl VisualElement {
    /// A fresh, unmounted element.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ElementId,
        kind: ElementKind,
        position: Position,
        velocity: Option<Vec2>,
        size: f32,
        color: Rgba,
        born_at: Duration,
        lifetime: Option<Duration>,
    ) -> Self {
        Self {
            id,
            kind,
            position,
            velocity,
            size,
            color,
            born_at,
            lifetime,
            duration: Duration::ZERO,
            delay: Duration::ZERO,
            variant: BubbleVariant::default(),
            handle: None,
        }
    }

    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.born_at)
    }

    /// `now - born_at >= lifetime`.
    pub fn is_expired(&self, now: Duration) -> bool {
        self.lifetime.is_some_and(|lifetime| self.age(now) >= lifetime)
    }

    pub fn handle(&self) -> Option<&RenderHandle> {
        self.handle.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn attach(&mut self, handle: RenderHandle) {
        debug_assert!(self.handle.is_none(), "element {} mounted twice", self.id);
        self.handle = Some(handle);
    }

    pub(crate) fn take_handle(&mut self) -> Option<RenderHandle> {
        self.handle.take()
    }
}
