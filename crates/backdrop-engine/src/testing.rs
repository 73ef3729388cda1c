//! Recording host doubles shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use backdrop_core::{ElementKind, EnvironmentState, Rect, Rgba, RendererKind, Vec2};

use crate::element::{ElementId, RenderHandle, VisualElement};
use crate::renderer::{
    BackendError, BackendProbe, BubbleNode, Canvas2d, CanvasHost, DisplayTree, GradientStop,
    NodeId, PointBackend, PointBuffer, RenderFault, Renderer, Rotation,
};

#[derive(Debug, Default)]
struct TreeState {
    next: u64,
    nodes: Vec<(NodeId, BubbleNode)>,
    refuse: bool,
}

/// Display tree that keeps every attached node.
#[derive(Debug, Clone, Default)]
pub struct RecordingTree {
    state: Rc<RefCell<TreeState>>,
}

impl RecordingTree {
    pub fn attached(&self) -> Vec<BubbleNode> {
        self.state
            .borrow()
            .nodes
            .iter()
            .map(|(_, node)| node.clone())
            .collect()
    }

    pub fn refuse_appends(&self) {
        self.state.borrow_mut().refuse = true;
    }
}

impl DisplayTree for RecordingTree {
    fn append(&mut self, node: BubbleNode) -> Result<NodeId, RenderFault> {
        let mut state = self.state.borrow_mut();
        if state.refuse {
            return Err(RenderFault::Host("container detached".into()));
        }
        state.next += 1;
        let id = NodeId(state.next);
        state.nodes.push((id, node));
        Ok(id)
    }

    fn remove(&mut self, id: NodeId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.nodes.len();
        state.nodes.retain(|(node, _)| *node != id);
        state.nodes.len() != before
    }
}

/// One drawing call on a [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOp {
    Rect(Rect, Rgba),
    Circle(Vec2, f32, Rgba),
    Line(Vec2, Vec2, Rgba, f32),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    ops: Rc<RefCell<Vec<CanvasOp>>>,
}

impl RecordingCanvas {
    pub fn ops(&self) -> Vec<CanvasOp> {
        self.ops.borrow().clone()
    }

    pub fn clear(&self) {
        self.ops.borrow_mut().clear();
    }
}

impl Canvas2d for RecordingCanvas {
    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.ops.borrow_mut().push(CanvasOp::Rect(rect, color));
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        self.ops
            .borrow_mut()
            .push(CanvasOp::Circle(center, radius, color));
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, color: Rgba, width: f32) {
        self.ops
            .borrow_mut()
            .push(CanvasOp::Line(from, to, color, width));
    }
}

#[derive(Debug, Default)]
struct BackendState {
    uploads: usize,
    draws: usize,
    last_buffer: Option<PointBuffer>,
    rotations: Vec<Rotation>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    state: Rc<RefCell<BackendState>>,
}

impl RecordingBackend {
    pub fn uploads(&self) -> usize {
        self.state.borrow().uploads
    }

    pub fn draws(&self) -> usize {
        self.state.borrow().draws
    }

    pub fn last_buffer(&self) -> Option<PointBuffer> {
        self.state.borrow().last_buffer.clone()
    }

    pub fn rotations(&self) -> Vec<Rotation> {
        self.state.borrow().rotations.clone()
    }
}

impl PointBackend for RecordingBackend {
    fn upload(&mut self, buffer: &PointBuffer) {
        let mut state = self.state.borrow_mut();
        state.uploads += 1;
        state.last_buffer = Some(buffer.clone());
    }

    fn draw(&mut self, rotation: Rotation) {
        let mut state = self.state.borrow_mut();
        state.draws += 1;
        state.rotations.push(rotation);
    }
}

/// How a [`RecordingCanvasHost`] answers the point backend probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Probe {
    #[default]
    Ready,
    Pending,
    Unavailable,
}

/// Canvas host handing out recording doubles.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvasHost {
    pub canvas: RecordingCanvas,
    pub backend: RecordingBackend,
    probe: Probe,
    no_context_2d: bool,
    paints: Rc<Cell<usize>>,
    probes: Rc<Cell<usize>>,
}

impl RecordingCanvasHost {
    pub fn with_probe(probe: Probe) -> Self {
        Self {
            probe,
            ..Self::default()
        }
    }

    pub fn without_context_2d() -> Self {
        Self {
            no_context_2d: true,
            ..Self::default()
        }
    }

    pub fn gradient_paints(&self) -> usize {
        self.paints.get()
    }

    pub fn backend_probes(&self) -> usize {
        self.probes.get()
    }
}

impl CanvasHost for RecordingCanvasHost {
    fn context_2d(&mut self) -> Option<Box<dyn Canvas2d>> {
        if self.no_context_2d {
            return None;
        }
        Some(Box::new(self.canvas.clone()))
    }

    fn load_point_backend(&mut self) -> BackendProbe {
        self.probes.set(self.probes.get() + 1);
        match self.probe {
            Probe::Ready => BackendProbe::Ready(Box::new(self.backend.clone())),
            Probe::Pending => BackendProbe::Pending,
            Probe::Unavailable => BackendProbe::Unavailable(BackendError::Unsupported),
        }
    }

    fn paint_static_gradient(&mut self, _stops: &[GradientStop]) {
        self.paints.set(self.paints.get() + 1);
    }
}

#[derive(Debug, Default)]
struct LogState {
    mounted: usize,
    released: Vec<ElementId>,
    frame_dts: Vec<f32>,
}

/// Shared record of what a [`ScriptedRenderer`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RendererLog {
    state: Rc<RefCell<LogState>>,
}

impl RendererLog {
    pub fn mounted(&self) -> usize {
        self.state.borrow().mounted
    }

    pub fn released(&self) -> Vec<ElementId> {
        self.state.borrow().released.clone()
    }

    pub fn no_double_release(&self) -> bool {
        let state = self.state.borrow();
        let unique: HashSet<_> = state.released.iter().collect();
        unique.len() == state.released.len()
    }

    /// `dt` of every frame, in order.
    pub fn frame_dts(&self) -> Vec<f32> {
        self.state.borrow().frame_dts.clone()
    }
}

/// Renderer with scripted failures that logs every call.
#[derive(Debug)]
pub struct ScriptedRenderer {
    log: RendererLog,
    fail_update: HashSet<ElementId>,
    refuse_mounts: bool,
    seeds: bool,
}

impl ScriptedRenderer {
    pub fn new(log: &RendererLog) -> Self {
        Self {
            log: log.clone(),
            fail_update: HashSet::new(),
            refuse_mounts: false,
            seeds: false,
        }
    }

    pub fn fail_update_for(mut self, id: ElementId) -> Self {
        self.fail_update.insert(id);
        self
    }

    pub fn refuse_mounts(mut self) -> Self {
        self.refuse_mounts = true;
        self
    }

    pub fn seeding(mut self) -> Self {
        self.seeds = true;
        self
    }
}

impl Renderer for ScriptedRenderer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn mode(&self) -> Option<RendererKind> {
        Some(RendererKind::Bubbles)
    }

    fn spawns(&self) -> Option<ElementKind> {
        Some(ElementKind::Bubble)
    }

    fn seeds_population(&self) -> bool {
        self.seeds
    }

    fn mount(&mut self, element: &VisualElement) -> Result<RenderHandle, RenderFault> {
        if self.refuse_mounts {
            return Err(RenderFault::Host("mount refused".into()));
        }
        self.log.state.borrow_mut().mounted += 1;
        Ok(RenderHandle::Particle(element.id))
    }

    fn update(
        &mut self,
        element: &mut VisualElement,
        _dt: f32,
        _env: &EnvironmentState,
    ) -> Result<(), RenderFault> {
        if self.fail_update.contains(&element.id) {
            return Err(RenderFault::NonFinite(element.id));
        }
        Ok(())
    }

    fn unmount(&mut self, handle: RenderHandle) {
        if let RenderHandle::Particle(id) = handle {
            self.log.state.borrow_mut().released.push(id);
        }
    }

    fn begin_frame(&mut self, dt: f32, _env: &EnvironmentState) {
        self.log.state.borrow_mut().frame_dts.push(dt);
    }
}
