//! Frame and timer scheduling plus the time source.
//!
//! The engine never sleeps or spawns threads. It asks a [`FrameScheduler`]
//! for frames and interval ticks, and the host delivers whatever is due by
//! calling [`Engine::pump`](crate::Engine::pump) from its own loop.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Identifies one requested animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Identifies one repeating timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// Source of frame callbacks and interval timers.
pub trait FrameScheduler {
    /// Ask for a single frame callback.
    fn request_frame(&mut self) -> FrameToken;

    /// Withdraw a frame request. Unknown tokens are ignored.
    fn cancel_frame(&mut self, token: FrameToken);

    /// Start a repeating timer whose first tick is due at `now + every`.
    fn set_interval(&mut self, every: Duration, now: Duration) -> TimerToken;

    /// Stop a repeating timer. Unknown tokens are ignored.
    fn clear_interval(&mut self, token: TimerToken);

    /// Return one timer that is due at `now`, if any, and re-arm it.
    fn poll_timer(&mut self, now: Duration) -> Option<TimerToken>;

    /// Hand out the pending frame, if one was requested.
    fn take_frame(&mut self) -> Option<FrameToken>;
}

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock time measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-advanced clock. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[derive(Debug)]
struct Interval {
    token: TimerToken,
    every: Duration,
    due: Duration,
}

/// Single-threaded scheduler for hosts that pump the engine from a loop.
///
/// Holds at most one pending frame. Timers that fell behind fire once and
/// are re-armed from the current time; missed ticks are not replayed.
#[derive(Debug, Default)]
pub struct PacedScheduler {
    next_token: u64,
    frame: Option<FrameToken>,
    intervals: Vec<Interval>,
    frame_requests: usize,
    timer_starts: usize,
}

impl PacedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames ever requested.
    pub fn frame_requests(&self) -> usize {
        self.frame_requests
    }

    /// Number of timers ever started.
    pub fn timer_starts(&self) -> usize {
        self.timer_starts
    }

    pub fn has_pending_frame(&self) -> bool {
        self.frame.is_some()
    }

    pub fn active_timers(&self) -> usize {
        self.intervals.len()
    }

    /// Earliest time a timer is due, for hosts that want to sleep until then.
    pub fn next_due(&self) -> Option<Duration> {
        self.intervals.iter().map(|i| i.due).min()
    }

    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

impl FrameScheduler for PacedScheduler {
    fn request_frame(&mut self) -> FrameToken {
        let token = FrameToken(self.token());
        self.frame = Some(token);
        self.frame_requests += 1;
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        if self.frame == Some(token) {
            self.frame = None;
        }
    }

    fn set_interval(&mut self, every: Duration, now: Duration) -> TimerToken {
        let token = TimerToken(self.token());
        self.intervals.push(Interval {
            token,
            every,
            due: now + every,
        });
        self.timer_starts += 1;
        token
    }

    fn clear_interval(&mut self, token: TimerToken) {
        self.intervals.retain(|i| i.token != token);
    }

    fn poll_timer(&mut self, now: Duration) -> Option<TimerToken> {
        let interval = self
            .intervals
            .iter_mut()
            .filter(|i| i.due <= now)
            .min_by_key(|i| i.due)?;
        interval.due = now + interval.every.max(Duration::from_millis(1));
        Some(interval.token)
    }

    fn take_frame(&mut self) -> Option<FrameToken> {
        self.frame.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn a_late_timer_fires_once() {
        let mut s = PacedScheduler::new();
        let t = s.set_interval(100 * MS, Duration::ZERO);

        assert_eq!(s.poll_timer(99 * MS), None);
        assert_eq!(s.poll_timer(1000 * MS), Some(t));
        assert_eq!(s.poll_timer(1000 * MS), None);
        assert_eq!(s.poll_timer(1100 * MS), Some(t));
    }

    #[test]
    fn cleared_timers_stop_firing() {
        let mut s = PacedScheduler::new();
        let t = s.set_interval(10 * MS, Duration::ZERO);
        s.clear_interval(t);
        assert_eq!(s.poll_timer(Duration::from_secs(5)), None);
        assert_eq!(s.active_timers(), 0);
        assert_eq!(s.timer_starts(), 1);
    }

    #[test]
    fn only_the_latest_frame_request_is_pending() {
        let mut s = PacedScheduler::new();
        let first = s.request_frame();
        let second = s.request_frame();

        s.cancel_frame(first);
        assert!(s.has_pending_frame());
        assert_eq!(s.take_frame(), Some(second));
        assert_eq!(s.take_frame(), None);
        assert_eq!(s.frame_requests(), 2);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let view = clock.clone();
        clock.advance(250 * MS);
        assert_eq!(view.now(), 250 * MS);
    }
}
