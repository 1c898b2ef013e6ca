/// Master gain with linear ramps
///
/// The master gain is shared between the engine (which schedules changes) and
/// the audio thread (which samples the current value every few milliseconds).
/// Ramps are evaluated against a `Clock`, so tests can step time by hand.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic time source
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`
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

/// Hand-driven clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.micros.fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

/// A scheduled linear change of gain
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ramp {
    from: f32,
    to: f32,
    start: Duration,
    length: Duration,
}

impl Ramp {
    fn fixed(value: f32) -> Self {
        Self {
            from: value,
            to: value,
            start: Duration::ZERO,
            length: Duration::ZERO,
        }
    }

    fn value_at(&self, now: Duration) -> f32 {
        if self.length.is_zero() || now >= self.start + self.length {
            return self.to;
        }
        if now <= self.start {
            return self.from;
        }
        let progress = (now - self.start).as_secs_f32() / self.length.as_secs_f32();
        self.from + (self.to - self.from) * progress
    }
}

/// Shared master gain
#[derive(Clone)]
pub struct MasterGain {
    ramp: Arc<Mutex<Ramp>>,
    clock: Arc<dyn Clock>,
}

impl MasterGain {
    pub fn new(initial: f32, clock: Arc<dyn Clock>) -> Self {
        Self {
            ramp: Arc::new(Mutex::new(Ramp::fixed(initial.max(0.0)))),
            clock,
        }
    }

    /// Gain at this instant
    pub fn value(&self) -> f32 {
        self.ramp.lock().value_at(self.clock.now())
    }

    /// Gain the current ramp ends at
    pub fn target(&self) -> f32 {
        self.ramp.lock().to
    }

    /// Whether a ramp is still in progress
    pub fn is_ramping(&self) -> bool {
        let ramp = self.ramp.lock();
        !ramp.length.is_zero() && self.clock.now() < ramp.start + ramp.length
    }

    /// Jump to `value`, cancelling any ramp in progress
    pub fn set_immediate(&self, value: f32) {
        *self.ramp.lock() = Ramp::fixed(value.max(0.0));
    }

    /// Move linearly from the current value to `target` over `length`,
    /// replacing any ramp in progress
    pub fn ramp_to(&self, target: f32, length: Duration) {
        if length.is_zero() {
            self.set_immediate(target);
            return;
        }
        let now = self.clock.now();
        let mut ramp = self.ramp.lock();
        let from = ramp.value_at(now);
        *ramp = Ramp {
            from,
            to: target.max(0.0),
            start: now,
            length,
        };
    }
}

impl std::fmt::Debug for MasterGain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterGain")
            .field("value", &self.value())
            .field("target", &self.target())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn gain_with_clock(initial: f32) -> (MasterGain, ManualClock) {
        let clock = ManualClock::new();
        (MasterGain::new(initial, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_immediate_change() {
        let (gain, _clock) = gain_with_clock(1.0);
        gain.set_immediate(0.25);
        assert_eq!(gain.value(), 0.25);
        assert!(!gain.is_ramping());
    }

    #[test]
    fn test_ramp_reaches_target_only_after_length() {
        let (gain, clock) = gain_with_clock(1.0);
        gain.ramp_to(0.0, Duration::from_millis(500));

        assert!((gain.value() - 1.0).abs() < EPSILON);
        assert!(gain.is_ramping());

        clock.advance(Duration::from_millis(250));
        assert!((gain.value() - 0.5).abs() < EPSILON);

        clock.advance(Duration::from_millis(249));
        assert!(gain.value() > EPSILON);

        clock.advance(Duration::from_millis(1));
        assert!(gain.value().abs() < EPSILON);
        assert!(!gain.is_ramping());

        clock.advance(Duration::from_secs(5));
        assert!(gain.value().abs() < EPSILON);
    }

    #[test]
    fn test_new_ramp_cancels_previous() {
        let (gain, clock) = gain_with_clock(0.0);
        gain.ramp_to(1.0, Duration::from_millis(100));
        clock.advance(Duration::from_millis(50));
        assert!((gain.value() - 0.5).abs() < EPSILON);

        // Restart from 0.5 toward 0.1
        gain.ramp_to(0.1, Duration::from_millis(100));
        assert!((gain.value() - 0.5).abs() < EPSILON);
        assert!((gain.target() - 0.1).abs() < EPSILON);

        clock.advance(Duration::from_millis(50));
        assert!((gain.value() - 0.3).abs() < EPSILON);
        clock.advance(Duration::from_millis(50));
        assert!((gain.value() - 0.1).abs() < EPSILON);
    }

    #[test]
    fn test_zero_length_ramp_is_immediate() {
        let (gain, _clock) = gain_with_clock(0.8);
        gain.ramp_to(0.2, Duration::ZERO);
        assert_eq!(gain.value(), 0.2);
    }

    #[test]
    fn test_clones_share_state() {
        let (gain, _clock) = gain_with_clock(1.0);
        let audio_side = gain.clone();
        gain.set_immediate(0.4);
        assert_eq!(audio_side.value(), 0.4);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
