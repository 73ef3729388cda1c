//! Terminal cell grid the host capabilities draw into.
//!
//! Engine coordinates are pixels; one cell is [`CELL_WIDTH`] x
//! [`CELL_HEIGHT`] pixels.

use std::time::Duration;

use backdrop_core::{Rgba, Vec2, Vec3, Viewport};
use backdrop_engine::{BubbleNode, GradientStop, NodeId, PointBuffer, Rotation};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

pub const CELL_WIDTH: f32 = 8.0;
pub const CELL_HEIGHT: f32 = 16.0;

/// Backdrop behind everything else.
const BACKGROUND: Rgba = Rgba::rgb(10, 14, 26);

/// How far a bubble travels, in percent of the height, over its animation.
const BUBBLE_RISE: f32 = 120.0;

/// Camera distance and vertical field of view of the point field.
const CAMERA_Z: f32 = 50.0;
const CAMERA_FOV_DEG: f32 = 75.0;

/// Trail ink below this is treated as empty.
const INK_EPSILON: f32 = 0.04;

/// Viewport in pixels for a grid of `cols` x `rows` cells.
pub fn viewport_for(cols: u16, rows: u16) -> Viewport {
    Viewport::new(cols as f32 * CELL_WIDTH, rows as f32 * CELL_HEIGHT)
}

/// Pixel position at the centre of a cell.
pub fn cell_center(col: u16, row: u16) -> Vec2 {
    Vec2::new(
        (col as f32 + 0.5) * CELL_WIDTH,
        (row as f32 + 0.5) * CELL_HEIGHT,
    )
}

#[derive(Debug, Clone)]
struct PlacedBubble {
    id: NodeId,
    node: BubbleNode,
    appended_at: Duration,
}

#[derive(Debug, Clone, Copy)]
struct TrailCell {
    glyph: char,
    color: Rgba,
    ink: f32,
}

impl Default for TrailCell {
    fn default() -> Self {
        Self {
            glyph: ' ',
            color: BACKGROUND,
            ink: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct PointField {
    buffer: PointBuffer,
    rotation: Rotation,
}

/// Everything currently on screen.
#[derive(Debug, Default)]
pub struct Scene {
    cols: u16,
    rows: u16,
    bubbles: Vec<PlacedBubble>,
    trails: Vec<TrailCell>,
    points: Option<PointField>,
    gradient: Option<Vec<GradientStop>>,
    point_load_requested: bool,
}

impl Scene {
    pub fn new(cols: u16, rows: u16) -> Self {
        let mut scene = Self::default();
        scene.resize(cols, rows);
        scene
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        self.trails = vec![TrailCell::default(); cols as usize * rows as usize];
    }

    /// Grid size as `(cols, rows)`.
    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Drop every layer, e.g. before another engine takes over.
    pub fn clear(&mut self) {
        self.bubbles.clear();
        self.trails.fill(TrailCell::default());
        self.points = None;
        self.gradient = None;
        self.point_load_requested = false;
    }

    pub fn add_bubble(&mut self, id: NodeId, node: BubbleNode, now: Duration) {
        self.bubbles.push(PlacedBubble {
            id,
            node,
            appended_at: now,
        });
    }

    pub fn remove_bubble(&mut self, id: NodeId) -> bool {
        let before = self.bubbles.len();
        self.bubbles.retain(|b| b.id != id);
        self.bubbles.len() != before
    }

    pub fn bubble_count(&self) -> usize {
        self.bubbles.len()
    }

    pub fn request_point_load(&mut self) {
        self.point_load_requested = true;
    }

    /// Whether a point backend load is waiting to be completed.
    pub fn take_point_request(&mut self) -> bool {
        std::mem::take(&mut self.point_load_requested)
    }

    pub fn set_points(&mut self, buffer: &PointBuffer) {
        self.points.get_or_insert_with(PointField::default).buffer = buffer.clone();
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.points.get_or_insert_with(PointField::default).rotation = rotation;
    }

    pub fn set_gradient(&mut self, stops: &[GradientStop]) {
        self.gradient = Some(stops.to_vec());
    }

    fn cell_of(&self, p: Vec2) -> Option<usize> {
        if !(p.x >= 0.0 && p.y >= 0.0) {
            return None;
        }
        let col = (p.x / CELL_WIDTH) as usize;
        let row = (p.y / CELL_HEIGHT) as usize;
        (col < self.cols as usize && row < self.rows as usize)
            .then(|| row * self.cols as usize + col)
    }

    /// Blend every trail cell toward `color` by its alpha.
    pub fn fade(&mut self, color: Rgba) {
        let keep = 1.0 - color.a;
        for cell in &mut self.trails {
            cell.ink *= keep;
            cell.color = cell.color.lerp(color.with_alpha(1.0), color.a);
            if cell.ink < INK_EPSILON {
                *cell = TrailCell::default();
            }
        }
    }

    pub fn plot(&mut self, at: Vec2, glyph: char, color: Rgba) {
        if let Some(index) = self.cell_of(at) {
            let cell = &mut self.trails[index];
            if color.a >= cell.ink {
                *cell = TrailCell {
                    glyph,
                    color: color.with_alpha(1.0),
                    ink: color.a,
                };
            }
        }
    }

    /// Bresenham over cells between two pixel positions.
    pub fn line(&mut self, from: Vec2, to: Vec2, color: Rgba) {
        let (mut x0, mut y0) = ((from.x / CELL_WIDTH) as i32, (from.y / CELL_HEIGHT) as i32);
        let (x1, y1) = ((to.x / CELL_WIDTH) as i32, (to.y / CELL_HEIGHT) as i32);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            let p = cell_center(x0.max(0) as u16, y0.max(0) as u16);
            if x0 >= 0 && y0 >= 0 {
                self.plot(p, '·', color);
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// Render every layer into styled lines, back to front.
    pub fn lines(&self, now: Duration) -> Vec<Line<'static>> {
        let cols = self.cols as usize;
        let mut cells: Vec<(char, Style)> =
            vec![(' ', Style::new().bg(to_color(BACKGROUND))); cols * self.rows as usize];

        if let Some(stops) = &self.gradient {
            self.paint_gradient(&mut cells, stops);
        }
        self.paint_trails(&mut cells);
        if let Some(field) = &self.points {
            self.paint_points(&mut cells, field);
        }
        self.paint_bubbles(&mut cells, now);

        cells
            .chunks(cols.max(1))
            .map(|row| {
                let spans: Vec<Span<'static>> = row
                    .iter()
                    .map(|(ch, style)| Span::styled(ch.to_string(), *style))
                    .collect();
                Line::from(spans)
            })
            .collect()
    }

    fn paint_gradient(&self, cells: &mut [(char, Style)], stops: &[GradientStop]) {
        let (cols, rows) = (self.cols.max(1) as f32, self.rows.max(1) as f32);
        for (index, cell) in cells.iter_mut().enumerate() {
            let x = (index % self.cols as usize) as f32 / cols;
            let y = (index / self.cols as usize) as f32 / rows;
            let mut color = BACKGROUND;
            for stop in stops {
                let d = Vec2::new(x, y).distance(stop.center);
                if d < stop.radius {
                    let weight = stop.color.a * (1.0 - d / stop.radius);
                    color = color.lerp(stop.color.with_alpha(1.0), weight);
                }
            }
            cell.1 = cell.1.bg(to_color(color));
        }
    }

    fn paint_trails(&self, cells: &mut [(char, Style)]) {
        for (cell, trail) in cells.iter_mut().zip(&self.trails) {
            if trail.ink < INK_EPSILON {
                continue;
            }
            let color = BACKGROUND.lerp(trail.color, trail.ink.clamp(0.0, 1.0));
            *cell = (trail.glyph, cell.1.fg(to_color(color)));
        }
    }

    fn paint_points(&self, cells: &mut [(char, Style)], field: &PointField) {
        let viewport = viewport_for(self.cols, self.rows);
        let aspect = if viewport.height > 0.0 {
            viewport.width / viewport.height
        } else {
            1.0
        };
        let focal = 1.0 / (CAMERA_FOV_DEG.to_radians() / 2.0).tan();
        let buffer = &field.buffer;

        for slot in 0..buffer.slots() {
            let size = buffer.sizes[slot];
            if size <= 0.0 {
                continue;
            }
            let at = slot * 3;
            let local = Vec3::new(
                buffer.positions[at],
                buffer.positions[at + 1],
                buffer.positions[at + 2],
            );
            let p = rotate(local, field.rotation);
            let depth = CAMERA_Z - p.z;
            if depth <= 0.1 {
                continue;
            }
            let ndc = Vec2::new(p.x * focal / (aspect * depth), p.y * focal / depth);
            let screen = Vec2::new(
                (ndc.x + 1.0) / 2.0 * viewport.width,
                (1.0 - ndc.y) / 2.0 * viewport.height,
            );
            let Some(index) = self.cell_of(screen) else {
                continue;
            };

            let rgb = &buffer.colors[at..at + 3];
            let tint = Rgba::rgb(
                (rgb[0] * 255.0) as u8,
                (rgb[1] * 255.0) as u8,
                (rgb[2] * 255.0) as u8,
            );
            // Nearer points are brighter.
            let near = ((CAMERA_Z + 70.0 - depth) / 140.0).clamp(0.2, 1.0);
            let color = BACKGROUND.lerp(tint, buffer.opacity * near);
            let glyph = match size {
                s if s < 1.2 => '.',
                s if s < 2.0 => '·',
                _ => '•',
            };
            cells[index] = (glyph, cells[index].1.fg(to_color(color)));
        }
    }

    fn paint_bubbles(&self, cells: &mut [(char, Style)], now: Duration) {
        let viewport = viewport_for(self.cols, self.rows);
        for bubble in &self.bubbles {
            let node = &bubble.node;
            let age = now.saturating_sub(bubble.appended_at);
            let Some(running) = age.checked_sub(node.delay) else {
                continue;
            };
            let progress = if node.duration.is_zero() {
                1.0
            } else {
                (running.as_secs_f32() / node.duration.as_secs_f32()).min(1.0)
            };

            let bottom = node.bottom_percent + progress * BUBBLE_RISE;
            let center = Vec2::new(
                node.left_percent / 100.0 * viewport.width + node.size / 2.0,
                viewport.height * (1.0 - bottom / 100.0) - node.size / 2.0,
            );
            let Some(index) = self.cell_of(center) else {
                continue;
            };

            // Fade in over the first tenth and out over the last.
            let alpha = (progress * 10.0).min((1.0 - progress) * 10.0).clamp(0.0, 1.0);
            let color = BACKGROUND.lerp(node.fill.tint.with_alpha(1.0), alpha.max(0.35));
            let glyph = match node.size {
                s if s < 25.0 => '∘',
                s if s < 45.0 => 'o',
                _ => 'O',
            };
            let mut style = cells[index].1.fg(to_color(color));
            if node.fill.variant == backdrop_core::BubbleVariant::Glow {
                style = style.add_modifier(Modifier::BOLD);
            }
            cells[index] = (glyph, style);
        }
    }
}

/// Rotate about x, then y.
fn rotate(p: Vec3, rotation: Rotation) -> Vec3 {
    let (sx, cx) = rotation.x.sin_cos();
    let (sy, cy) = rotation.y.sin_cos();
    let y = p.y * cx - p.z * sx;
    let z = p.y * sx + p.z * cx;
    Vec3::new(p.x * cy + z * sy, y, -p.x * sy + z * cy)
}

fn to_color(c: Rgba) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}
