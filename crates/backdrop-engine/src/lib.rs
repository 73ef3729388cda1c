//! Ambient animation engine.
//!
//! Spawns, animates and retires decorative elements (floating bubbles, a
//! rotating point field or a 2D particle field) behind a host's content.
//! The population is bounded and every element's render resource is
//! released exactly once. Viewport, visibility, pointer and reduced-motion
//! signals from the host shape what runs.
//!
//! The host supplies a [`Surface`], a [`FrameScheduler`], a [`Clock`] and a
//! random source, then drives everything through [`Engine`].

mod element;
mod engine;
mod environment;
mod error;
mod lifecycle;
mod pool;
mod renderer;
mod scheduler;
mod spawner;

#[cfg(test)]
mod testing;

pub use element::{ElementId, Position, RenderHandle, VisualElement};
pub use engine::Engine;
pub use environment::{EnvironmentChange, EnvironmentReactor, HostSignals, StaticSignals};
pub use error::{EngineError, Result};
pub use lifecycle::{LifecycleManager, MAX_FRAME_DT, RunState, TickOutcome};
pub use pool::Population;
pub use renderer::{
    ActiveRenderer, BackendError, BackendProbe, BubbleFill, BubbleNode, BubbleRenderer,
    CONNECTION_POPULATION_CEILING, Canvas2d, CanvasHost, DisplayTree, ForceRenderer,
    GradientStop, NodeId, PointBackend, PointBuffer, PointCloudRenderer, RenderFault, Renderer,
    Rotation, STATIC_GRADIENT, StaticGradientRenderer, Surface, for_each_connection,
};
pub use scheduler::{
    Clock, FrameScheduler, FrameToken, ManualClock, PacedScheduler, SystemClock, TimerToken,
};
pub use spawner::{create as spawn_element, sample_sphere};
