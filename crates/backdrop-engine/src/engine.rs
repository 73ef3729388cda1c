//! The public engine: one owned value per animated surface.

use backdrop_core::{ConfigPatch, EngineConfig, EnvironmentState, RendererKind, Vec2, Viewport};
use rand::RngCore;

use crate::element::VisualElement;
use crate::environment::{EnvironmentChange, EnvironmentReactor, HostSignals};
use crate::error::{EngineError, Result};
use crate::lifecycle::{LifecycleManager, RunState};
use crate::renderer::{
    self, ActiveRenderer, BackendError, PointBackend, Renderer, StaticGradientRenderer, Surface,
};
use crate::scheduler::{Clock, FrameScheduler, PacedScheduler, SystemClock};

/// Ambient animation engine bound to one host surface.
///
/// Everything runs on the caller's thread. The host forwards its events
/// (`on_resize`, `on_visibility_change`, pointer moves) and calls
/// [`pump`](Self::pump) from its loop to deliver due frames and timers.
pub struct Engine<S: FrameScheduler = PacedScheduler, C: Clock = SystemClock> {
    /// `None` when the host offered nothing usable; the engine is inert.
    lifecycle: Option<LifecycleManager<ActiveRenderer>>,
    env: EnvironmentReactor,
    config: EngineConfig,
    scheduler: S,
    clock: C,
    backend_pending: bool,
    stopped: bool,
}

impl<S: FrameScheduler, C: Clock> Engine<S, C> {
    /// Validate `config`, snapshot the host and select a renderer.
    ///
    /// A missing or mismatched surface is not an error: the engine is
    /// built inert and every operation becomes a no-op.
    pub fn new(
        config: EngineConfig,
        surface: Option<Surface>,
        signals: &impl HostSignals,
        scheduler: S,
        clock: C,
        rng: Box<dyn RngCore>,
    ) -> Result<Self> {
        config.validate()?;
        let env = EnvironmentReactor::new(signals, config.reduced_motion);
        let viewport = env.state().viewport;

        let mut backend_pending = false;
        let lifecycle = match surface {
            None => {
                tracing::warn!(mode = config.mode.name(), "no surface to animate, engine stays inert");
                None
            }
            Some(surface) => match renderer::select(&config, surface, viewport) {
                Ok(selection) => {
                    backend_pending = selection.backend_pending;
                    let capacity = config.capacity_for_width(viewport.width);
                    Some(LifecycleManager::new(selection.renderer, config.clone(), capacity, rng))
                }
                Err(EngineError::EnvironmentUnavailable(reason)) => {
                    tracing::warn!(%reason, "environment unavailable, engine stays inert");
                    None
                }
                Err(err) => return Err(err),
            },
        };

        Ok(Self {
            lifecycle,
            env,
            config,
            scheduler,
            clock,
            backend_pending,
            stopped: false,
        })
    }

    pub fn start(&mut self) {
        if self.stopped {
            return;
        }
        let now = self.clock.now();
        if let Some(lifecycle) = self.lifecycle.as_mut() {
            lifecycle.start(&mut self.scheduler, self.env.state(), now);
        }
    }

    pub fn pause(&mut self) {
        if let Some(lifecycle) = self.lifecycle.as_mut() {
            lifecycle.pause(&mut self.scheduler);
        }
    }

    pub fn resume(&mut self) {
        let now = self.clock.now();
        if let Some(lifecycle) = self.lifecycle.as_mut() {
            lifecycle.resume(&mut self.scheduler, self.env.state(), now);
        }
    }

    /// Cancel every callback and release every element. Idempotent and
    /// final.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.backend_pending = false;
        if let Some(lifecycle) = self.lifecycle.as_mut() {
            lifecycle.stop(&mut self.scheduler);
        }
    }

    /// Merge `patch` into the configuration. Elements already alive keep
    /// what they were spawned with; render settings apply from the next
    /// frame. The reduced-motion decision made at construction stands.
    pub fn update_config(&mut self, patch: &ConfigPatch) -> Result<()> {
        let next = self.config.patched(patch)?;
        if patch.reduced_motion.is_some() {
            tracing::debug!("reduced motion is fixed at construction, override ignored");
        }
        let now = self.clock.now();
        if let Some(lifecycle) = self.lifecycle.as_mut() {
            let capacity = next.capacity_for_width(self.env.state().viewport.width);
            lifecycle.reconfigure(next.clone(), capacity, &mut self.scheduler, now);
        }
        self.config = next;
        Ok(())
    }

    /// Deliver every due timer, then at most one frame.
    pub fn pump(&mut self) {
        let Some(lifecycle) = self.lifecycle.as_mut() else {
            return;
        };
        let now = self.clock.now();
        while let Some(token) = self.scheduler.poll_timer(now) {
            lifecycle.on_timer(token, self.env.state(), now);
        }
        if let Some(token) = self.scheduler.take_frame() {
            lifecycle.on_frame(token, &mut self.scheduler, self.env.state(), now);
        }
    }

    pub fn on_resize(&mut self, viewport: Viewport) {
        let EnvironmentChange::Resized { from, to } = self.env.resize(viewport) else {
            return;
        };
        let capacity = self.config.capacity_for_width(to.width);
        if let Some(lifecycle) = self.lifecycle.as_mut() {
            let evicted = lifecycle.resize(to, capacity);
            tracing::debug!(
                from = ?(from.width, from.height),
                to = ?(to.width, to.height),
                capacity,
                evicted,
                "viewport resized"
            );
        }
    }

    pub fn on_visibility_change(&mut self, hidden: bool) {
        match self.env.set_hidden(hidden) {
            EnvironmentChange::Hidden => self.pause(),
            EnvironmentChange::Visible => self.resume(),
            _ => {}
        }
    }

    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        self.env.pointer_moved(Vec2::new(x, y));
    }

    pub fn on_pointer_leave(&mut self) {
        self.env.pointer_left();
    }

    /// Report the outcome of a point backend load that was `Pending`.
    ///
    /// Ignored once the engine is stopped or when nothing was pending. A
    /// failure swaps in the static gradient for good.
    pub fn complete_backend_load(
        &mut self,
        outcome: std::result::Result<Box<dyn PointBackend>, BackendError>,
    ) {
        if self.stopped || !self.backend_pending {
            tracing::debug!(stopped = self.stopped, "late point backend result dropped");
            return;
        }
        self.backend_pending = false;
        let Some(lifecycle) = self.lifecycle.as_mut() else {
            return;
        };

        match outcome {
            Ok(backend) => {
                if let ActiveRenderer::Points(points) = lifecycle.renderer_mut() {
                    points.attach_backend(backend);
                    tracing::info!("point backend ready");
                }
                // No frames run under reduced motion, so the one static
                // frame is drawn now that it can be seen.
                lifecycle.redraw_static_frame(self.env.state());
            }
            Err(err) => {
                tracing::warn!(error = %err, "point backend failed, falling back to static background");
                let host = match lifecycle.renderer_mut() {
                    ActiveRenderer::Points(points) => points.take_host(),
                    _ => None,
                };
                if let Some(host) = host {
                    let fallback = ActiveRenderer::Static(StaticGradientRenderer::new(host));
                    lifecycle.replace_renderer(fallback, &mut self.scheduler);
                }
            }
        }
    }

    pub fn population(&self) -> usize {
        self.lifecycle.as_ref().map_or(0, |l| l.population())
    }

    pub fn capacity(&self) -> usize {
        self.lifecycle.as_ref().map_or(0, |l| l.capacity())
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.as_ref().is_some_and(|l| l.is_running())
    }

    pub fn run_state(&self) -> RunState {
        match &self.lifecycle {
            Some(l) => l.state(),
            None if self.stopped => RunState::Stopped,
            None => RunState::Idle,
        }
    }

    /// Mode actually being animated; `None` when inert or degraded.
    pub fn renderer_kind(&self) -> Option<RendererKind> {
        self.lifecycle.as_ref().and_then(|l| l.renderer().mode())
    }

    pub fn renderer_name(&self) -> Option<&'static str> {
        self.lifecycle.as_ref().map(|l| l.renderer().name())
    }

    pub fn is_inert(&self) -> bool {
        self.lifecycle.is_none()
    }

    pub fn elements(&self) -> &[VisualElement] {
        match &self.lifecycle {
            Some(l) => l.elements(),
            None => &[],
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn environment(&self) -> &EnvironmentState {
        self.env.state()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

impl<S: FrameScheduler, C: Clock> Drop for Engine<S, C> {
    fn drop(&mut self) {
        self.stop();
    }
}
