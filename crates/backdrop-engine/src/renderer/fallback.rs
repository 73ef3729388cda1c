//! Static gradient shown when no animated backend is usable.

use backdrop_core::{ElementKind, Rgba, RendererKind, Vec2, Viewport};

use super::{CanvasHost, RenderFault, Renderer};
use crate::element::{RenderHandle, VisualElement};

/// One radial gradient layer: `color` at `center`, fading to transparent at
/// `radius`. Center and radius are fractions of the canvas size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub center: Vec2,
    pub radius: f32,
    pub color: Rgba,
}

/// Three soft blue glows layered over the canvas.
pub const STATIC_GRADIENT: [GradientStop; 3] = [
    GradientStop {
        center: Vec2::new(0.2, 0.8),
        radius: 0.5,
        color: Rgba::rgba(78, 203, 255, 0.15),
    },
    GradientStop {
        center: Vec2::new(0.8, 0.2),
        radius: 0.4,
        color: Rgba::rgba(0, 119, 255, 0.1),
    },
    GradientStop {
        center: Vec2::new(0.5, 0.5),
        radius: 0.6,
        color: Rgba::rgba(0, 212, 255, 0.05),
    },
];

/// Paints [`STATIC_GRADIENT`] once and never animates.
pub struct StaticGradientRenderer {
    host: Box<dyn CanvasHost>,
}

impl StaticGradientRenderer {
    /// Paints immediately.
    pub fn new(mut host: Box<dyn CanvasHost>) -> Self {
        host.paint_static_gradient(&STATIC_GRADIENT);
        Self { host }
    }
}

impl Renderer for StaticGradientRenderer {
    fn name(&self) -> &'static str {
        "static"
    }

    fn mode(&self) -> Option<RendererKind> {
        None
    }

    fn spawns(&self) -> Option<ElementKind> {
        None
    }

    fn animates(&self) -> bool {
        false
    }

    fn mount(&mut self, _element: &VisualElement) -> Result<RenderHandle, RenderFault> {
        Err(RenderFault::Unsupported("static"))
    }

    fn unmount(&mut self, _handle: RenderHandle) {}

    fn resize(&mut self, _viewport: Viewport) {
        self.host.paint_static_gradient(&STATIC_GRADIENT);
    }
}
