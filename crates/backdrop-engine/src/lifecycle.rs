//! The element lifecycle: spawn, update, expire and release.

use std::time::Duration;

use backdrop_core::{ElementKind, EngineConfig, EnvironmentState, Viewport};
use rand::RngCore;

use crate::element::{ElementId, VisualElement};
use crate::pool::Population;
use crate::renderer::Renderer;
use crate::scheduler::{FrameScheduler, FrameToken, TimerToken};
use crate::spawner;

/// Upper bound for the time step handed to renderers.
pub const MAX_FRAME_DT: Duration = Duration::from_millis(100);

/// Where the manager is in its life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    /// Final; nothing restarts a stopped manager.
    Stopped,
}

/// What one [`LifecycleManager::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub retired: usize,
    pub spawned: bool,
}

/// Owns the population and drives a renderer through it.
pub struct LifecycleManager<R: Renderer> {
    renderer: R,
    config: EngineConfig,
    population: Population,
    rng: Box<dyn RngCore>,
    state: RunState,
    frame: Option<FrameToken>,
    timer: Option<TimerToken>,
    last_frame: Option<Duration>,
    last_spawn: Option<Duration>,
    spawned: usize,
    next_id: u64,
    static_frame: bool,
}

/// Release an element's handle, if it still has one.
fn retire<R: Renderer>(renderer: &mut R, mut element: VisualElement) {
    tracing::trace!(id = %element.id, "retiring element");
    if let Some(handle) = element.take_handle() {
        renderer.unmount(handle);
    }
}

impl<R: Renderer> LifecycleManager<R> {
    pub fn new(renderer: R, config: EngineConfig, capacity: usize, rng: Box<dyn RngCore>) -> Self {
        let mut capacity = capacity.min(config.max_count);
        if let Some(limit) = renderer.slot_limit() {
            capacity = capacity.min(limit);
        }
        Self {
            renderer,
            config,
            population: Population::with_capacity(capacity),
            rng,
            state: RunState::Idle,
            frame: None,
            timer: None,
            last_frame: None,
            last_spawn: None,
            spawned: 0,
            next_id: 0,
            static_frame: false,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn population(&self) -> usize {
        self.population.len()
    }

    pub fn capacity(&self) -> usize {
        self.population.capacity()
    }

    pub fn elements(&self) -> &[VisualElement] {
        self.population.as_slice()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Begin animating. Seeds the population if the renderer wants it.
    ///
    /// Under reduced motion nothing is scheduled: at most one static frame
    /// is drawn. A hidden environment starts out paused.
    pub fn start<S: FrameScheduler>(&mut self, sched: &mut S, env: &EnvironmentState, now: Duration) {
        if self.state != RunState::Idle {
            return;
        }
        if self.renderer.seeds_population() {
            self.seed(env, now);
        }

        self.state = RunState::Running;
        tracing::info!(
            renderer = self.renderer.name(),
            population = self.population.len(),
            capacity = self.population.capacity(),
            reduced_motion = env.reduced_motion,
            "animation started"
        );

        if env.reduced_motion {
            self.render_static_frame(env);
            return;
        }
        if env.hidden {
            self.state = RunState::Paused;
            return;
        }
        self.schedule(sched, now);
    }

    /// Cancel pending callbacks and release every element. Final.
    pub fn stop<S: FrameScheduler>(&mut self, sched: &mut S) {
        if self.state == RunState::Stopped {
            return;
        }
        self.unschedule(sched);
        let released = self.retire_all();
        self.state = RunState::Stopped;
        tracing::info!(renderer = self.renderer.name(), released, "animation stopped");
    }

    pub fn pause<S: FrameScheduler>(&mut self, sched: &mut S) {
        if self.state != RunState::Running {
            return;
        }
        self.unschedule(sched);
        self.state = RunState::Paused;
        tracing::debug!("animation paused");
    }

    /// Only a paused manager resumes, and never under reduced motion.
    pub fn resume<S: FrameScheduler>(&mut self, sched: &mut S, env: &EnvironmentState, now: Duration) {
        if self.state != RunState::Paused || env.reduced_motion {
            return;
        }
        self.state = RunState::Running;
        self.schedule(sched, now);
        tracing::debug!("animation resumed");
    }

    /// Retire expired elements, then spawn at most one.
    pub fn tick(&mut self, env: &EnvironmentState, now: Duration) -> TickOutcome {
        let renderer = &mut self.renderer;
        let retired = self
            .population
            .retire_expired(now, |element| retire(renderer, element));

        let spawned = match self.renderer.spawns() {
            Some(kind) if self.population.has_room() && self.spawn_due(now) => {
                self.last_spawn = Some(now);
                self.spawn_one(kind, env, now)
            }
            _ => false,
        };

        TickOutcome { retired, spawned }
    }

    /// Handle an interval tick. Stale tokens are ignored.
    pub fn on_timer(&mut self, token: TimerToken, env: &EnvironmentState, now: Duration) -> TickOutcome {
        if self.state != RunState::Running || self.timer != Some(token) {
            return TickOutcome::default();
        }
        self.tick(env, now)
    }

    /// Handle a frame: tick, draw everything, ask for the next frame.
    pub fn on_frame<S: FrameScheduler>(
        &mut self,
        token: FrameToken,
        sched: &mut S,
        env: &EnvironmentState,
        now: Duration,
    ) {
        if self.state != RunState::Running || self.frame != Some(token) {
            return;
        }
        self.frame = None;

        let dt = match self.last_frame {
            Some(previous) => now.saturating_sub(previous).min(MAX_FRAME_DT),
            None => Duration::ZERO,
        };
        self.last_frame = Some(now);

        self.tick(env, now);
        self.draw(dt.as_secs_f32(), env);

        if self.renderer.animates() {
            self.frame = Some(sched.request_frame());
        }
    }

    /// Apply a new ceiling; the oldest excess elements are released now.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        let mut capacity = capacity.min(self.config.max_count);
        if let Some(limit) = self.renderer.slot_limit() {
            capacity = capacity.min(limit);
        }
        let evicted: Vec<VisualElement> = self.population.set_capacity(capacity).collect();
        let count = evicted.len();
        for element in evicted {
            retire(&mut self.renderer, element);
        }
        if count > 0 {
            tracing::debug!(evicted = count, capacity, "population shrunk");
        }
        count
    }

    pub fn resize(&mut self, viewport: Viewport, capacity: usize) -> usize {
        self.renderer.resize(viewport);
        self.set_capacity(capacity)
    }

    /// Swap in a validated configuration. Live elements keep their values.
    pub fn reconfigure<S: FrameScheduler>(
        &mut self,
        config: EngineConfig,
        capacity: usize,
        sched: &mut S,
        now: Duration,
    ) {
        let interval_changed = config.spawn_interval_ms != self.config.spawn_interval_ms
            || config.burst_stagger_ms != self.config.burst_stagger_ms;
        self.config = config;
        self.renderer.configure(&self.config);
        self.set_capacity(capacity);

        if interval_changed {
            if let Some(timer) = self.timer.take() {
                sched.clear_interval(timer);
                self.timer = Some(sched.set_interval(self.timer_period(), now));
            }
        }
    }

    /// Release every element and install another renderer. Scheduling
    /// stops if the new renderer does not animate.
    pub fn replace_renderer<S: FrameScheduler>(&mut self, renderer: R, sched: &mut S) -> R {
        self.retire_all();
        let previous = std::mem::replace(&mut self.renderer, renderer);
        if !self.renderer.animates() {
            self.unschedule(sched);
        }
        previous
    }

    fn seed(&mut self, env: &EnvironmentState, now: Duration) {
        let Some(kind) = self.renderer.spawns() else {
            return;
        };
        // A failing mount ends seeding early instead of looping.
        while self.population.has_room() {
            if !self.spawn_one(kind, env, now) {
                break;
            }
        }
        self.last_spawn = Some(now);
    }

    fn spawn_due(&self, now: Duration) -> bool {
        let interval = if self.spawned < self.config.initial_burst {
            self.config.burst_stagger()
        } else {
            self.config.spawn_interval()
        };
        self.last_spawn
            .is_none_or(|last| now.saturating_sub(last) >= interval)
    }

    fn spawn_one(&mut self, kind: ElementKind, env: &EnvironmentState, now: Duration) -> bool {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        let mut element = spawner::create(id, kind, &self.config, env, now, &mut *self.rng);

        match self.renderer.mount(&element) {
            Ok(handle) => {
                element.attach(handle);
                match self.population.insert(element) {
                    Ok(()) => {
                        self.spawned += 1;
                        tracing::trace!(%id, ?kind, "spawned element");
                        true
                    }
                    Err(rejected) => {
                        retire(&mut self.renderer, rejected);
                        false
                    }
                }
            }
            Err(fault) => {
                tracing::warn!(%id, error = %fault, "mount failed, spawn skipped");
                false
            }
        }
    }

    fn draw(&mut self, dt: f32, env: &EnvironmentState) {
        self.renderer.begin_frame(dt, env);

        let mut faulted = Vec::new();
        for (index, element) in self.population.as_mut_slice().iter_mut().enumerate() {
            if let Err(fault) = self.renderer.update(element, dt, env) {
                tracing::warn!(id = %element.id, error = %fault, "render fault, retiring element");
                faulted.push(index);
            }
        }
        for index in faulted.into_iter().rev() {
            let element = self.population.remove(index);
            retire(&mut self.renderer, element);
        }

        self.renderer.end_frame(self.population.as_slice(), env);
    }

    fn render_static_frame(&mut self, env: &EnvironmentState) {
        if self.static_frame {
            return;
        }
        self.static_frame = true;
        self.draw(0.0, env);
    }

    /// Draw the reduced-motion frame again after the renderer gained what
    /// it needed to present it, such as a late point backend.
    pub fn redraw_static_frame(&mut self, env: &EnvironmentState) {
        if self.state != RunState::Running || !env.reduced_motion {
            return;
        }
        self.static_frame = true;
        self.draw(0.0, env);
    }

    fn timer_period(&self) -> Duration {
        let interval = self.config.spawn_interval();
        if self.config.initial_burst > 0 {
            interval.min(self.config.burst_stagger())
        } else {
            interval
        }
    }

    fn schedule<S: FrameScheduler>(&mut self, sched: &mut S, now: Duration) {
        if !self.renderer.animates() {
            return;
        }
        self.last_frame = None;
        if self.frame.is_none() {
            self.frame = Some(sched.request_frame());
        }
        if self.timer.is_none() {
            self.timer = Some(sched.set_interval(self.timer_period(), now));
        }
    }

    fn unschedule<S: FrameScheduler>(&mut self, sched: &mut S) {
        if let Some(frame) = self.frame.take() {
            sched.cancel_frame(frame);
        }
        if let Some(timer) = self.timer.take() {
            sched.clear_interval(timer);
        }
    }

    fn retire_all(&mut self) -> usize {
        let elements: Vec<VisualElement> = self.population.drain().collect();
        let count = elements.len();
        for element in elements {
            retire(&mut self.renderer, element);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PacedScheduler;
    use crate::testing::{RendererLog, ScriptedRenderer};
    use backdrop_core::RendererKind;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const MS: Duration = Duration::from_millis(1);

    fn bubbles() -> EngineConfig {
        EngineConfig::preset(RendererKind::Bubbles)
    }

    fn manager(config: EngineConfig, renderer: ScriptedRenderer) -> LifecycleManager<ScriptedRenderer> {
        let capacity = config.max_count;
        LifecycleManager::new(renderer, config, capacity, Box::new(ChaCha8Rng::seed_from_u64(5)))
    }

    fn env() -> EnvironmentState {
        EnvironmentState::default()
    }

    #[test]
    fn first_spawn_is_immediate_then_burst_then_interval() {
        let log = RendererLog::default();
        let mut lc = manager(bubbles(), ScriptedRenderer::new(&log));

        assert!(lc.tick(&env(), Duration::ZERO).spawned);
        assert!(!lc.tick(&env(), 499 * MS).spawned);
        for i in 1..5u32 {
            assert!(lc.tick(&env(), 500 * i * MS).spawned, "burst spawn {i}");
        }
        assert_eq!(lc.population(), 5);
        assert!(!lc.tick(&env(), 4000 * MS).spawned);
        assert!(lc.tick(&env(), 4500 * MS).spawned);
    }

    #[test]
    fn expiry_happens_before_spawning() {
        let log = RendererLog::default();
        let config = EngineConfig {
            max_count: 1,
            narrow_max_count: 1,
            initial_burst: 0,
            min_duration: 1.0,
            max_duration: 1.0,
            max_delay: 0.0,
            spawn_interval_ms: 100,
            ..bubbles()
        };
        let mut lc = manager(config, ScriptedRenderer::new(&log));

        lc.tick(&env(), Duration::ZERO);
        assert_eq!(lc.population(), 1);

        let outcome = lc.tick(&env(), Duration::from_secs(1));
        assert_eq!(outcome, TickOutcome { retired: 1, spawned: true });
        assert_eq!(lc.population(), 1);
        assert_eq!(lc.elements()[0].id, ElementId(1));
        assert_eq!(log.released(), vec![ElementId(0)]);
    }

    #[test]
    fn update_fault_retires_only_that_element() {
        let log = RendererLog::default();
        let renderer = ScriptedRenderer::new(&log).fail_update_for(ElementId(1));
        let config = EngineConfig {
            initial_burst: 0,
            spawn_interval_ms: 1,
            ..bubbles()
        };
        let mut lc = manager(config, renderer);
        let mut sched = PacedScheduler::new();

        lc.start(&mut sched, &env(), Duration::ZERO);
        for ms in 0..3u32 {
            lc.tick(&env(), ms * 10 * MS);
        }
        assert_eq!(lc.population(), 3);

        let frame = sched.take_frame().unwrap();
        lc.on_frame(frame, &mut sched, &env(), 30 * MS);

        let ids: Vec<ElementId> = lc.elements().iter().map(|e| e.id).collect();
        assert!(!ids.contains(&ElementId(1)));
        assert_eq!(log.released(), vec![ElementId(1)]);
        assert!(sched.has_pending_frame());
    }

    #[test]
    fn mount_failure_skips_the_spawn() {
        let log = RendererLog::default();
        let renderer = ScriptedRenderer::new(&log).refuse_mounts();
        let mut lc = manager(bubbles(), renderer);

        let outcome = lc.tick(&env(), Duration::ZERO);
        assert!(!outcome.spawned);
        assert_eq!(lc.population(), 0);
        assert!(log.released().is_empty());
    }

    #[test]
    fn stop_releases_each_handle_once_and_is_final() {
        let log = RendererLog::default();
        let mut lc = manager(bubbles(), ScriptedRenderer::new(&log).seeding());
        let mut sched = PacedScheduler::new();

        lc.start(&mut sched, &env(), Duration::ZERO);
        assert_eq!(lc.population(), 12);

        lc.stop(&mut sched);
        lc.stop(&mut sched);
        assert_eq!(lc.state(), RunState::Stopped);
        assert_eq!(log.released().len(), 12);
        assert!(log.no_double_release());
        assert!(!sched.has_pending_frame());
        assert_eq!(sched.active_timers(), 0);

        lc.start(&mut sched, &env(), Duration::ZERO);
        lc.resume(&mut sched, &env(), Duration::ZERO);
        assert_eq!(lc.state(), RunState::Stopped);
        assert_eq!(sched.frame_requests(), 1);
    }

    #[test]
    fn dt_is_zero_after_resume_and_clamped_otherwise() {
        let log = RendererLog::default();
        let mut lc = manager(bubbles(), ScriptedRenderer::new(&log));
        let mut sched = PacedScheduler::new();

        lc.start(&mut sched, &env(), Duration::ZERO);
        let f = sched.take_frame().unwrap();
        lc.on_frame(f, &mut sched, &env(), Duration::ZERO);
        let f = sched.take_frame().unwrap();
        lc.on_frame(f, &mut sched, &env(), Duration::from_secs(3));

        lc.pause(&mut sched);
        lc.resume(&mut sched, &env(), Duration::from_secs(10));
        let f = sched.take_frame().unwrap();
        lc.on_frame(f, &mut sched, &env(), Duration::from_secs(11));

        assert_eq!(log.frame_dts(), vec![0.0, 0.1, 0.0]);
    }

    #[test]
    fn stale_frame_tokens_are_ignored() {
        let log = RendererLog::default();
        let mut lc = manager(bubbles(), ScriptedRenderer::new(&log));
        let mut sched = PacedScheduler::new();

        lc.start(&mut sched, &env(), Duration::ZERO);
        let stale = sched.take_frame().unwrap();
        lc.pause(&mut sched);
        lc.resume(&mut sched, &env(), Duration::ZERO);

        lc.on_frame(stale, &mut sched, &env(), 16 * MS);
        assert!(log.frame_dts().is_empty());
    }

    #[test]
    fn reduced_motion_draws_one_static_frame_and_schedules_nothing() {
        let log = RendererLog::default();
        let mut lc = manager(bubbles(), ScriptedRenderer::new(&log).seeding());
        let mut sched = PacedScheduler::new();
        let env = EnvironmentState {
            reduced_motion: true,
            ..EnvironmentState::default()
        };

        lc.start(&mut sched, &env, Duration::ZERO);
        lc.pause(&mut sched);
        lc.resume(&mut sched, &env, Duration::ZERO);

        assert_eq!(log.frame_dts(), vec![0.0]);
        assert_eq!(sched.frame_requests(), 0);
        assert_eq!(sched.timer_starts(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Advance(u64),
        Tick,
        Frame,
        Capacity(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u64..5_000).prop_map(Op::Advance),
            Just(Op::Tick),
            Just(Op::Frame),
            (0usize..20).prop_map(Op::Capacity),
        ]
    }

    proptest! {
        #[test]
        fn population_never_exceeds_capacity(ops in prop::collection::vec(op(), 1..200)) {
            let log = RendererLog::default();
            let config = EngineConfig {
                spawn_interval_ms: 300,
                min_duration: 1.0,
                max_duration: 4.0,
                ..bubbles()
            };
            let mut lc = manager(config, ScriptedRenderer::new(&log));
            let mut sched = PacedScheduler::new();
            let mut now = Duration::ZERO;
            lc.start(&mut sched, &env(), now);

            for op in ops {
                match op {
                    Op::Advance(ms) => now += Duration::from_millis(ms),
                    Op::Tick => { lc.tick(&env(), now); }
                    Op::Frame => {
                        if let Some(f) = sched.take_frame() {
                            lc.on_frame(f, &mut sched, &env(), now);
                        }
                    }
                    Op::Capacity(c) => { lc.set_capacity(c); }
                }
                prop_assert!(lc.population() <= lc.capacity());
                prop_assert!(lc.capacity() <= lc.config().max_count);
                prop_assert_eq!(log.mounted() - log.released().len(), lc.population());
            }

            lc.stop(&mut sched);
            prop_assert_eq!(log.mounted(), log.released().len());
            prop_assert!(log.no_double_release());
        }
    }
}
