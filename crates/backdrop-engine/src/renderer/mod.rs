//! Presentation strategies.
//!
//! A [`Renderer`] mounts, updates and unmounts elements for one way of
//! drawing them. Three strategies exist (display-tree bubbles, a GPU-style
//! point cloud and a 2D force-directed canvas) plus a static gradient used
//! when a backend is missing. The engine probes the host once at
//! construction and keeps the chosen strategy in an [`ActiveRenderer`].

mod bubbles;
mod fallback;
mod force;
mod point_cloud;

pub use bubbles::{BubbleFill, BubbleNode, BubbleRenderer, DisplayTree, NodeId};
pub use fallback::{GradientStop, STATIC_GRADIENT, StaticGradientRenderer};
pub use force::{CONNECTION_POPULATION_CEILING, Canvas2d, ForceRenderer, for_each_connection};
pub use point_cloud::{PointBackend, PointBuffer, PointCloudRenderer, Rotation};

use backdrop_core::{ElementKind, EngineConfig, EnvironmentState, RendererKind, Viewport};
use thiserror::Error;

use crate::element::{ElementId, RenderHandle, VisualElement};
use crate::error::EngineError;

/// A failure confined to a single element.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderFault {
    /// The element is of a kind this renderer cannot present.
    #[error("{renderer} renderer cannot present {kind:?} elements")]
    WrongKind {
        renderer: &'static str,
        kind: ElementKind,
    },

    /// Every slot of the fixed point buffer is taken.
    #[error("point buffer is full ({capacity} slots)")]
    ArenaFull { capacity: usize },

    /// Integration produced NaN or infinity.
    #[error("element {0} reached a non-finite state")]
    NonFinite(ElementId),

    /// The host refused the operation.
    #[error("host rejected element: {0}")]
    Host(String),

    /// The renderer does not present elements at all.
    #[error("{0} renderer does not present elements")]
    Unsupported(&'static str),
}

/// Why the point backend could not be used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The host lacks the capability altogether.
    #[error("point rendering is not supported by this host")]
    Unsupported,

    /// Loading the backend failed.
    #[error("point backend failed to load: {0}")]
    LoadFailed(String),
}

/// Result of asking a canvas host for a point backend.
pub enum BackendProbe {
    /// Usable right away.
    Ready(Box<dyn PointBackend>),
    /// Loading; the host reports back through
    /// [`Engine::complete_backend_load`](crate::Engine::complete_backend_load).
    Pending,
    /// Not available.
    Unavailable(BackendError),
}

/// A canvas the engine may draw into in one of several ways.
pub trait CanvasHost {
    /// A 2D drawing context, if the host has one.
    fn context_2d(&mut self) -> Option<Box<dyn Canvas2d>>;

    /// Start (or finish) acquiring a point backend. Called at most once.
    fn load_point_backend(&mut self) -> BackendProbe;

    /// Replace the canvas content with a static background.
    fn paint_static_gradient(&mut self, stops: &[GradientStop]);
}

/// The host object the engine presents into.
pub enum Surface {
    /// A container node that bubbles are appended to.
    Container(Box<dyn DisplayTree>),
    /// A drawable canvas.
    Canvas(Box<dyn CanvasHost>),
}

/// One presentation strategy.
pub trait Renderer {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Configured mode this renderer implements; `None` for the fallback.
    fn mode(&self) -> Option<RendererKind>;

    /// Kind of element this renderer wants spawned, if any.
    fn spawns(&self) -> Option<ElementKind>;

    /// Fill the population to capacity on start instead of trickling in.
    fn seeds_population(&self) -> bool {
        false
    }

    /// Whether a frame loop and spawn timer are needed at all.
    fn animates(&self) -> bool {
        true
    }

    /// Most elements this renderer can present at once, if bounded by
    /// storage fixed at construction.
    fn slot_limit(&self) -> Option<usize> {
        None
    }

    /// Create the presentation resource for a new element.
    fn mount(&mut self, element: &VisualElement) -> Result<RenderHandle, RenderFault>;

    /// Advance and draw one element.
    fn update(
        &mut self,
        _element: &mut VisualElement,
        _dt: f32,
        _env: &EnvironmentState,
    ) -> Result<(), RenderFault> {
        Ok(())
    }

    /// Release a presentation resource. Consumes the handle.
    fn unmount(&mut self, handle: RenderHandle);

    /// Called once per frame before any element is updated.
    fn begin_frame(&mut self, _dt: f32, _env: &EnvironmentState) {}

    /// Called once per frame after every element was updated.
    fn end_frame(&mut self, _elements: &[VisualElement], _env: &EnvironmentState) {}

    fn resize(&mut self, _viewport: Viewport) {}

    /// Pick up render-level settings after a configuration update.
    fn configure(&mut self, _config: &EngineConfig) {}
}

/// The strategy selected for an engine.
pub enum ActiveRenderer {
    Bubbles(BubbleRenderer),
    Points(PointCloudRenderer),
    Particles(ForceRenderer),
    Static(StaticGradientRenderer),
}

macro_rules! delegate {
    ($self:ident, $r:ident => $body:expr) => {
        match $self {
            ActiveRenderer::Bubbles($r) => $body,
            ActiveRenderer::Points($r) => $body,
            ActiveRenderer::Particles($r) => $body,
            ActiveRenderer::Static($r) => $body,
        }
    };
}

impl Renderer for ActiveRenderer {
    fn name(&self) -> &'static str {
        delegate!(self, r => r.name())
    }

    fn mode(&self) -> Option<RendererKind> {
        delegate!(self, r => r.mode())
    }

    fn spawns(&self) -> Option<ElementKind> {
        delegate!(self, r => r.spawns())
    }

    fn seeds_population(&self) -> bool {
        delegate!(self, r => r.seeds_population())
    }

    fn animates(&self) -> bool {
        delegate!(self, r => r.animates())
    }

    fn slot_limit(&self) -> Option<usize> {
        delegate!(self, r => r.slot_limit())
    }

    fn mount(&mut self, element: &VisualElement) -> Result<RenderHandle, RenderFault> {
        delegate!(self, r => r.mount(element))
    }

    fn update(
        &mut self,
        element: &mut VisualElement,
        dt: f32,
        env: &EnvironmentState,
    ) -> Result<(), RenderFault> {
        delegate!(self, r => r.update(element, dt, env))
    }

    fn unmount(&mut self, handle: RenderHandle) {
        delegate!(self, r => r.unmount(handle))
    }

    fn begin_frame(&mut self, dt: f32, env: &EnvironmentState) {
        delegate!(self, r => r.begin_frame(dt, env))
    }

    fn end_frame(&mut self, elements: &[VisualElement], env: &EnvironmentState) {
        delegate!(self, r => r.end_frame(elements, env))
    }

    fn resize(&mut self, viewport: Viewport) {
        delegate!(self, r => r.resize(viewport))
    }

    fn configure(&mut self, config: &EngineConfig) {
        delegate!(self, r => r.configure(config))
    }
}

/// Outcome of probing the host once at construction.
pub(crate) struct Selection {
    pub renderer: ActiveRenderer,
    /// The point backend is still loading.
    pub backend_pending: bool,
}

/// Pick the strategy for `config.mode` given what the surface offers.
pub(crate) fn select(
    config: &EngineConfig,
    surface: Surface,
    viewport: Viewport,
) -> Result<Selection, EngineError> {
    let ready = |renderer| Selection {
        renderer,
        backend_pending: false,
    };

    match (config.mode, surface) {
        (RendererKind::Bubbles, Surface::Container(tree)) => Ok(ready(ActiveRenderer::Bubbles(
            BubbleRenderer::new(tree, viewport),
        ))),
        (RendererKind::Particles, Surface::Canvas(mut host)) => match host.context_2d() {
            Some(canvas) => Ok(ready(ActiveRenderer::Particles(ForceRenderer::new(
                canvas, config, viewport,
            )))),
            None => {
                tracing::warn!("2D canvas context unavailable, using static background");
                Ok(ready(ActiveRenderer::Static(StaticGradientRenderer::new(host))))
            }
        },
        (RendererKind::Points, Surface::Canvas(mut host)) => match host.load_point_backend() {
            BackendProbe::Ready(backend) => Ok(ready(ActiveRenderer::Points(
                PointCloudRenderer::new(host, Some(backend), config, viewport),
            ))),
            BackendProbe::Pending => Ok(Selection {
                renderer: ActiveRenderer::Points(PointCloudRenderer::new(
                    host, None, config, viewport,
                )),
                backend_pending: true,
            }),
            BackendProbe::Unavailable(err) => {
                tracing::warn!(error = %err, "point backend unavailable, using static background");
                Ok(ready(ActiveRenderer::Static(StaticGradientRenderer::new(host))))
            }
        },
        (mode, Surface::Container(_)) => Err(EngineError::EnvironmentUnavailable(format!(
            "{} mode needs a canvas, got a container",
            mode.name()
        ))),
        (mode, Surface::Canvas(_)) => Err(EngineError::EnvironmentUnavailable(format!(
            "{} mode needs a container, got a canvas",
            mode.name()
        ))),
    }
}
