//! Engine host capabilities backed by the terminal [`Scene`].

use std::cell::RefCell;
use std::rc::Rc;

use backdrop_core::{Rect, Rgba, Vec2, Viewport};
use backdrop_engine::{
    BackendError, BackendProbe, BubbleNode, Canvas2d, CanvasHost, Clock, DisplayTree,
    GradientStop, HostSignals, NodeId, PointBackend, PointBuffer, RenderFault, Rotation,
    SystemClock,
};

use crate::scene::Scene;

pub type SharedScene = Rc<RefCell<Scene>>;

/// Bubble container. Rise and fade are computed by the scene at draw time
/// from each node's duration and delay.
pub struct TerminalContainer {
    scene: SharedScene,
    clock: SystemClock,
    next_id: u64,
}

impl TerminalContainer {
    pub fn new(scene: SharedScene, clock: SystemClock) -> Self {
        Self {
            scene,
            clock,
            next_id: 0,
        }
    }
}

impl DisplayTree for TerminalContainer {
    fn append(&mut self, node: BubbleNode) -> Result<NodeId, RenderFault> {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.scene.borrow_mut().add_bubble(id, node, self.clock.now());
        Ok(id)
    }

    fn remove(&mut self, id: NodeId) -> bool {
        self.scene.borrow_mut().remove_bubble(id)
    }
}

/// 2D context drawing into the scene's trail grid.
pub struct TerminalCanvas {
    scene: SharedScene,
}

impl Canvas2d for TerminalCanvas {
    fn fill_rect(&mut self, _rect: Rect, color: Rgba) {
        self.scene.borrow_mut().fade(color);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        let glyph = if radius >= 2.5 { '●' } else { '•' };
        self.scene.borrow_mut().plot(center, glyph, color);
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, color: Rgba, _width: f32) {
        self.scene.borrow_mut().line(from, to, color);
    }
}

/// Point backend projecting the buffer onto the scene.
pub struct TerminalPoints {
    scene: SharedScene,
}

impl TerminalPoints {
    pub fn new(scene: SharedScene) -> Self {
        Self { scene }
    }
}

impl PointBackend for TerminalPoints {
    fn upload(&mut self, buffer: &PointBuffer) {
        self.scene.borrow_mut().set_points(buffer);
    }

    fn draw(&mut self, rotation: Rotation) {
        self.scene.borrow_mut().set_rotation(rotation);
    }
}

/// Canvas host. The point backend is loaded asynchronously: the probe
/// answers `Pending` and the app completes it on its next turn.
pub struct TerminalCanvasHost {
    scene: SharedScene,
}

impl TerminalCanvasHost {
    pub fn new(scene: SharedScene) -> Self {
        Self { scene }
    }
}

impl CanvasHost for TerminalCanvasHost {
    fn context_2d(&mut self) -> Option<Box<dyn Canvas2d>> {
        Some(Box::new(TerminalCanvas {
            scene: Rc::clone(&self.scene),
        }))
    }

    fn load_point_backend(&mut self) -> BackendProbe {
        self.scene.borrow_mut().request_point_load();
        BackendProbe::Pending
    }

    fn paint_static_gradient(&mut self, stops: &[GradientStop]) {
        self.scene.borrow_mut().set_gradient(stops);
    }
}

/// Finish a point backend load requested through [`TerminalCanvasHost`].
pub fn load_points(
    scene: &SharedScene,
    disabled: bool,
) -> Result<Box<dyn PointBackend>, BackendError> {
    if disabled {
        return Err(BackendError::LoadFailed(
            "point rendering disabled by BACKDROP_DISABLE_POINTS".into(),
        ));
    }
    Ok(Box::new(TerminalPoints::new(Rc::clone(scene))))
}

/// Host signals read once when an engine is built.
#[derive(Debug, Clone, Copy)]
pub struct TerminalSignals {
    pub viewport: Viewport,
    pub reduced_motion: bool,
}

impl HostSignals for TerminalSignals {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn is_hidden(&self) -> bool {
        false
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion
    }
}
