//! 2D particle field with proximity connections and pointer attraction.

use backdrop_core::{
    ElementKind, EngineConfig, EnvironmentState, ForceSettings, Rect, Rgba, RendererKind, Vec2,
    Viewport,
};

use super::{RenderFault, Renderer};
use crate::element::{Position, RenderHandle, VisualElement};

/// Population above which the quadratic connection pass gets expensive.
pub const CONNECTION_POPULATION_CEILING: usize = 300;

/// Immediate-mode 2D drawing context.
pub trait Canvas2d {
    fn fill_rect(&mut self, rect: Rect, color: Rgba);
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba);
    fn stroke_line(&mut self, from: Vec2, to: Vec2, color: Rgba, width: f32);
}

/// Visit every pair `i < j` closer than `max_distance`, passing the
/// connection opacity `1 - d / max_distance`.
pub fn for_each_connection(
    positions: &[Vec2],
    max_distance: f32,
    mut visit: impl FnMut(usize, usize, f32),
) {
    if !(max_distance > 0.0) {
        return;
    }
    for (i, a) in positions.iter().enumerate() {
        for (j, b) in positions.iter().enumerate().skip(i + 1) {
            let d = a.distance(*b);
            if d < max_distance {
                visit(i, j, 1.0 - d / max_distance);
            }
        }
    }
}

/// Wrap a coordinate into `[0, extent)`.
fn wrap(value: f32, extent: f32) -> f32 {
    if extent > 0.0 {
        // Tiny negative inputs round up to `extent` itself.
        let wrapped = value.rem_euclid(extent);
        if wrapped >= extent { 0.0 } else { wrapped }
    } else {
        0.0
    }
}

/// Renderer drawing particles onto a [`Canvas2d`].
pub struct ForceRenderer {
    canvas: Box<dyn Canvas2d>,
    viewport: Viewport,
    settings: ForceSettings,
    connection_distance: f32,
    positions: Vec<Vec2>,
    warned_ceiling: bool,
}

impl ForceRenderer {
    pub fn new(canvas: Box<dyn Canvas2d>, config: &EngineConfig, viewport: Viewport) -> Self {
        Self {
            canvas,
            viewport,
            settings: config.force,
            connection_distance: config.connection_distance,
            positions: Vec::with_capacity(config.max_count),
            warned_ceiling: false,
        }
    }

    fn attract(&self, position: Vec2, velocity: Vec2, pointer: Vec2, dt: f32) -> Vec2 {
        let radius = self.settings.attraction_radius;
        let offset = pointer - position;
        let distance = offset.length();
        if radius <= 0.0 || distance >= radius || distance <= f32::EPSILON {
            return velocity;
        }
        let falloff = (radius - distance) / radius;
        let accel = self.settings.attraction_strength * falloff * dt;
        velocity + offset * (accel / distance)
    }
}

impl Renderer for ForceRenderer {
    fn name(&self) -> &'static str {
        "particles"
    }

    fn mode(&self) -> Option<RendererKind> {
        Some(RendererKind::Particles)
    }

    fn spawns(&self) -> Option<ElementKind> {
        Some(ElementKind::Particle)
    }

    fn seeds_population(&self) -> bool {
        true
    }

    fn mount(&mut self, element: &VisualElement) -> Result<RenderHandle, RenderFault> {
        match (element.kind, element.position) {
            (ElementKind::Particle, Position::Plane(_)) => {
                Ok(RenderHandle::Particle(element.id))
            }
            (kind, _) => Err(RenderFault::WrongKind {
                renderer: "particles",
                kind,
            }),
        }
    }

    fn update(
        &mut self,
        element: &mut VisualElement,
        dt: f32,
        env: &EnvironmentState,
    ) -> Result<(), RenderFault> {
        let Some(position) = element.position.plane() else {
            return Err(RenderFault::WrongKind {
                renderer: "particles",
                kind: element.kind,
            });
        };
        let mut velocity = element.velocity.unwrap_or(Vec2::ZERO);

        if let Some(pointer) = env.pointer {
            velocity = self.attract(position, velocity, pointer, dt);
        }
        velocity = velocity.clamp_length(self.settings.max_speed);

        let moved = position + velocity * dt;
        if !moved.is_finite() || !velocity.is_finite() {
            return Err(RenderFault::NonFinite(element.id));
        }
        let wrapped = Vec2::new(
            wrap(moved.x, self.viewport.width),
            wrap(moved.y, self.viewport.height),
        );

        element.velocity = Some(velocity);
        element.position = Position::Plane(wrapped);
        self.canvas
            .fill_circle(wrapped, element.size, element.color);
        Ok(())
    }

    fn unmount(&mut self, _handle: RenderHandle) {}

    fn begin_frame(&mut self, _dt: f32, _env: &EnvironmentState) {
        let fade = self
            .settings
            .background
            .with_alpha(self.settings.fade_alpha);
        self.canvas.fill_rect(self.viewport.rect(), fade);
    }

    fn end_frame(&mut self, elements: &[VisualElement], _env: &EnvironmentState) {
        if elements.len() > CONNECTION_POPULATION_CEILING && !self.warned_ceiling {
            tracing::warn!(
                population = elements.len(),
                ceiling = CONNECTION_POPULATION_CEILING,
                "particle population is large for the pairwise connection pass"
            );
            self.warned_ceiling = true;
        }

        self.positions.clear();
        self.positions
            .extend(elements.iter().filter_map(|e| e.position.plane()));

        let line = self.settings.line_color;
        let canvas = &mut self.canvas;
        let positions = &self.positions;
        for_each_connection(positions, self.connection_distance, |i, j, opacity| {
            canvas.stroke_line(
                positions[i],
                positions[j],
                line.with_alpha(line.a * opacity),
                1.0,
            );
        });
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn configure(&mut self, config: &EngineConfig) {
        self.settings = config.force;
        self.connection_distance = config.connection_distance;
    }
}
