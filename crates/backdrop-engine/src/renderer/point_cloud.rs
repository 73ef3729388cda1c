//! Rotating 3D point field uploaded to a GPU-style point backend.
//!
//! Points live in flat buffers sized once from the configured capacity.
//! Each mounted point owns one slot; unmounting zeroes the slot's size and
//! returns it to the free list. The whole field is drawn in a single call
//! per frame, so per-point work is limited to buffer writes.

use backdrop_core::{
    ElementKind, EngineConfig, EnvironmentState, PointCloudSettings, RendererKind, Viewport,
};

use super::{CanvasHost, RenderFault, Renderer};
use crate::element::{RenderHandle, VisualElement};

/// Accumulated rotation of the field, radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rotation {
    pub x: f32,
    pub y: f32,
}

/// Flat per-point attribute buffers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointBuffer {
    /// xyz triples.
    pub positions: Vec<f32>,
    /// rgb triples in 0.0-1.0.
    pub colors: Vec<f32>,
    /// One size per slot; zero marks a free slot.
    pub sizes: Vec<f32>,
    /// Material opacity.
    pub opacity: f32,
}

impl PointBuffer {
    fn with_slots(slots: usize, opacity: f32) -> Self {
        Self {
            positions: vec![0.0; slots * 3],
            colors: vec![0.0; slots * 3],
            sizes: vec![0.0; slots],
            opacity,
        }
    }

    pub fn slots(&self) -> usize {
        self.sizes.len()
    }

    /// Slots with a non-zero size.
    pub fn visible(&self) -> usize {
        self.sizes.iter().filter(|&&s| s > 0.0).count()
    }
}

/// A loaded point-rendering backend.
pub trait PointBackend {
    /// Replace the backend's copy of the buffers.
    fn upload(&mut self, buffer: &PointBuffer);

    /// Draw the whole field once with the given rotation.
    fn draw(&mut self, rotation: Rotation);

    fn resize(&mut self, _viewport: Viewport) {}
}

/// Renderer driving a [`PointBackend`].
pub struct PointCloudRenderer {
    host: Option<Box<dyn CanvasHost>>,
    backend: Option<Box<dyn PointBackend>>,
    buffer: PointBuffer,
    free: Vec<usize>,
    dirty: bool,
    rotation: Rotation,
    settings: PointCloudSettings,
    viewport: Viewport,
}

impl PointCloudRenderer {
    /// `backend` is `None` while the host is still loading it.
    pub fn new(
        host: Box<dyn CanvasHost>,
        backend: Option<Box<dyn PointBackend>>,
        config: &EngineConfig,
        viewport: Viewport,
    ) -> Self {
        let slots = config.max_count;
        let mut renderer = Self {
            host: Some(host),
            backend,
            buffer: PointBuffer::with_slots(slots, config.point_cloud.opacity),
            free: (0..slots).rev().collect(),
            dirty: true,
            rotation: Rotation::default(),
            settings: config.point_cloud,
            viewport,
        };
        if let Some(backend) = renderer.backend.as_mut() {
            backend.resize(viewport);
        }
        renderer
    }

    /// Install a backend that finished loading after construction.
    pub fn attach_backend(&mut self, mut backend: Box<dyn PointBackend>) {
        backend.resize(self.viewport);
        self.backend = Some(backend);
        self.dirty = true;
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Give the canvas host back, e.g. to hand it to a fallback renderer.
    pub fn take_host(&mut self) -> Option<Box<dyn CanvasHost>> {
        self.host.take()
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn buffer(&self) -> &PointBuffer {
        &self.buffer
    }
}

impl Renderer for PointCloudRenderer {
    fn name(&self) -> &'static str {
        "points"
    }

    fn mode(&self) -> Option<RendererKind> {
        Some(RendererKind::Points)
    }

    fn spawns(&self) -> Option<ElementKind> {
        Some(ElementKind::Point)
    }

    fn seeds_population(&self) -> bool {
        true
    }

    fn slot_limit(&self) -> Option<usize> {
        Some(self.buffer.slots())
    }

    fn mount(&mut self, element: &VisualElement) -> Result<RenderHandle, RenderFault> {
        let Some(position) = element.position.space() else {
            return Err(RenderFault::WrongKind {
                renderer: "points",
                kind: element.kind,
            });
        };
        let slot = self.free.pop().ok_or(RenderFault::ArenaFull {
            capacity: self.buffer.slots(),
        })?;

        let at = slot * 3;
        self.buffer.positions[at..at + 3].copy_from_slice(&[position.x, position.y, position.z]);
        self.buffer.colors[at..at + 3].copy_from_slice(&element.color.to_unit_rgb());
        self.buffer.sizes[slot] = element.size;
        self.dirty = true;
        Ok(RenderHandle::Slot(slot))
    }

    fn unmount(&mut self, handle: RenderHandle) {
        let RenderHandle::Slot(slot) = handle else {
            tracing::warn!(?handle, "point renderer asked to release a foreign handle");
            return;
        };
        if slot >= self.buffer.slots() {
            return;
        }
        self.buffer.sizes[slot] = 0.0;
        self.free.push(slot);
        self.dirty = true;
    }

    fn begin_frame(&mut self, dt: f32, env: &EnvironmentState) {
        let pointer = env
            .pointer
            .map(|p| env.viewport.normalize(p))
            .unwrap_or_default();
        let speed = self.settings.rotation_speed;
        let influence = self.settings.mouse_influence;

        self.rotation.x += speed * dt + pointer.y * influence;
        self.rotation.y += speed * 0.5 * dt + pointer.x * influence;
    }

    fn end_frame(&mut self, _elements: &[VisualElement], _env: &EnvironmentState) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if self.dirty {
            backend.upload(&self.buffer);
            self.dirty = false;
        }
        backend.draw(self.rotation);
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(viewport);
        }
    }

    fn configure(&mut self, config: &EngineConfig) {
        self.settings = config.point_cloud;
        if self.buffer.opacity != config.point_cloud.opacity {
            self.buffer.opacity = config.point_cloud.opacity;
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementId, Position};
    use crate::testing::{RecordingBackend, RecordingCanvasHost};
    use backdrop_core::{Rgba, Vec2, Vec3};
    use std::time::Duration;

    fn point(id: u64) -> VisualElement {
        VisualElement::new(
            ElementId(id),
            ElementKind::Point,
            Position::Space(Vec3::new(1.0, 2.0, 3.0)),
            None,
            1.5,
            Rgba::rgb(0, 255, 0),
            Duration::ZERO,
            None,
        )
    }

    fn config(slots: usize) -> EngineConfig {
        EngineConfig {
            max_count: slots,
            narrow_max_count: slots,
            ..EngineConfig::preset(RendererKind::Points)
        }
    }

    #[test]
    fn mount_writes_a_slot_and_unmount_frees_it() {
        let backend = RecordingBackend::default();
        let mut r = PointCloudRenderer::new(
            Box::new(RecordingCanvasHost::default()),
            Some(Box::new(backend.clone())),
            &config(2),
            Viewport::default(),
        );

        let handle = r.mount(&point(1)).unwrap();
        assert_eq!(handle, RenderHandle::Slot(0));
        assert_eq!(&r.buffer().positions[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&r.buffer().colors[0..3], &[0.0, 1.0, 0.0]);
        assert_eq!(r.buffer().visible(), 1);

        r.unmount(handle);
        assert_eq!(r.buffer().visible(), 0);
        assert_eq!(r.mount(&point(2)).unwrap(), RenderHandle::Slot(0));
    }

    #[test]
    fn full_arena_rejects_mounts() {
        let mut r = PointCloudRenderer::new(
            Box::new(RecordingCanvasHost::default()),
            None,
            &config(1),
            Viewport::default(),
        );
        r.mount(&point(1)).unwrap();
        assert_eq!(
            r.mount(&point(2)),
            Err(RenderFault::ArenaFull { capacity: 1 })
        );
    }

    #[test]
    fn one_draw_per_frame_and_upload_only_when_dirty() {
        let backend = RecordingBackend::default();
        let mut r = PointCloudRenderer::new(
            Box::new(RecordingCanvasHost::default()),
            Some(Box::new(backend.clone())),
            &config(4),
            Viewport::default(),
        );
        let env = EnvironmentState::default();
        r.mount(&point(1)).unwrap();

        for _ in 0..3 {
            r.begin_frame(0.016, &env);
            r.end_frame(&[], &env);
        }

        assert_eq!(backend.draws(), 3);
        assert_eq!(backend.uploads(), 1);
    }

    #[test]
    fn nothing_is_drawn_while_the_backend_loads() {
        let mut r = PointCloudRenderer::new(
            Box::new(RecordingCanvasHost::default()),
            None,
            &config(4),
            Viewport::default(),
        );
        let env = EnvironmentState::default();
        r.mount(&point(1)).unwrap();
        r.end_frame(&[], &env);

        let backend = RecordingBackend::default();
        r.attach_backend(Box::new(backend.clone()));
        r.end_frame(&[], &env);
        assert_eq!(backend.uploads(), 1);
        assert_eq!(backend.draws(), 1);
        assert_eq!(backend.last_buffer().map(|b| b.visible()), Some(1));
    }

    #[test]
    fn rotation_follows_time_and_pointer() {
        let mut r = PointCloudRenderer::new(
            Box::new(RecordingCanvasHost::default()),
            None,
            &config(1),
            Viewport::new(200.0, 100.0),
        );
        let settings = PointCloudSettings::default();

        r.begin_frame(1.0, &EnvironmentState::default());
        let still = r.rotation();
        assert!((still.x - settings.rotation_speed).abs() < 1e-6);
        assert!((still.y - settings.rotation_speed * 0.5).abs() < 1e-6);

        // Pointer in the top-right corner: nx = 1, ny = 1.
        let env = EnvironmentState {
            viewport: Viewport::new(200.0, 100.0),
            pointer: Some(Vec2::new(200.0, 0.0)),
            ..EnvironmentState::default()
        };
        r.begin_frame(0.0, &env);
        let moved = r.rotation();
        assert!((moved.x - still.x - settings.mouse_influence).abs() < 1e-7);
        assert!((moved.y - still.y - settings.mouse_influence).abs() < 1e-7);
    }
}
