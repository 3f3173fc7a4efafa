//! Continuous-value animator.
//!
//! Interpolates the playback position between sparse authoritative
//! updates so time-based UI neither polls nor floods at native event
//! frequency. Every frame computes
//! `clamp(anchor + rate * elapsed_since_anchor)` from the last
//! authoritative anchor, never by frame-to-frame accumulation, so
//! re-anchoring on each authoritative update keeps floating-point error
//! from compounding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use pmostate::TimeRange;

pub type FrameCallback = Arc<dyn Fn(Instant) + Send + Sync>;

/// The host scheduler's per-frame callback facility.
///
/// Hosts plug their native frame source in; tests drive frames by hand
/// with [`ManualFrameClock`].
pub trait FrameClock: Send + Sync {
    /// Begins delivering frames to `tick` until [`cancel`](Self::cancel).
    fn start(&self, tick: FrameCallback);
    /// Stops delivering frames. A cancelled clock must not fire again
    /// until restarted.
    fn cancel(&self);
}

/// Frame clock driven explicitly, for deterministic tests.
#[derive(Default)]
pub struct ManualFrameClock {
    tick: RwLock<Option<FrameCallback>>,
}

impl ManualFrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates one frame at the given instant. Does nothing when the
    /// clock is cancelled (a pending frame never outlives `cancel`).
    pub fn fire_at(&self, now: Instant) {
        let tick = self.tick.read().unwrap().clone();
        if let Some(tick) = tick {
            tick(now);
        }
    }
}

impl FrameClock for ManualFrameClock {
    fn start(&self, tick: FrameCallback) {
        *self.tick.write().unwrap() = Some(tick);
    }

    fn cancel(&self) {
        *self.tick.write().unwrap() = None;
    }
}

/// Thread-backed frame clock for hosts without a native frame callback,
/// in the style of the renderer watcher threads: fixed period, stop flag,
/// join on cancel.
pub struct ThreadFrameClock {
    period: Duration,
    stop_flag: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadFrameClock {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            stop_flag: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }
}

impl FrameClock for ThreadFrameClock {
    fn start(&self, tick: FrameCallback) {
        let mut handle = self.handle.lock().expect("frame clock mutex poisoned");
        if handle.is_some() {
            return;
        }
        self.stop_flag.store(false, Ordering::SeqCst);

        let stop_flag = Arc::clone(&self.stop_flag);
        let period = self.period;
        let spawned = thread::Builder::new()
            .name("animator-frames".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::SeqCst) {
                    thread::sleep(period);
                    if stop_flag.load(Ordering::SeqCst) {
                        break;
                    }
                    tick(Instant::now());
                }
            })
            .expect("Failed to spawn frame clock thread");
        *handle = Some(spawned);
    }

    fn cancel(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        let mut handle = self.handle.lock().expect("frame clock mutex poisoned");
        if let Some(handle) = handle.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct AnimationSession {
    anchor_value: f64,
    anchor_at: Instant,
    rate: f64,
    bounds: TimeRange,
}

impl AnimationSession {
    fn value_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.anchor_at).as_secs_f64();
        (self.anchor_value + self.rate * elapsed).clamp(self.bounds.start, self.bounds.end)
    }
}

/// Frame-driven interpolator for one monotonically-advancing value.
pub struct PositionAnimator {
    clock: Arc<dyn FrameClock>,
    on_value: Arc<dyn Fn(f64) + Send + Sync>,
    session: RwLock<Option<AnimationSession>>,
    running: AtomicBool,
}

impl PositionAnimator {
    pub fn new(
        clock: Arc<dyn FrameClock>,
        on_value: Arc<dyn Fn(f64) + Send + Sync>,
    ) -> Arc<PositionAnimator> {
        Arc::new(PositionAnimator {
            clock,
            on_value,
            session: RwLock::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Starts (or restarts) animating from an authoritative value.
    pub fn start(self: &Arc<Self>, value: f64, rate_per_second: f64, bounds: TimeRange) {
        self.start_at(value, rate_per_second, bounds, Instant::now());
    }

    pub fn start_at(
        self: &Arc<Self>,
        value: f64,
        rate_per_second: f64,
        bounds: TimeRange,
        now: Instant,
    ) {
        *self.session.write().unwrap() = Some(AnimationSession {
            anchor_value: value,
            anchor_at: now,
            rate: rate_per_second,
            bounds,
        });

        if !self.running.swap(true, Ordering::SeqCst) {
            let weak: Weak<PositionAnimator> = Arc::downgrade(self);
            self.clock.start(Arc::new(move |now| {
                if let Some(animator) = weak.upgrade() {
                    animator.tick(now);
                }
            }));
        }
    }

    /// Re-anchors without stopping: the next frame measures elapsed time
    /// from this authoritative value. No-op when stopped (the owner must
    /// restart explicitly).
    pub fn update(&self, value: f64, rate_per_second: f64, bounds: TimeRange) {
        self.update_at(value, rate_per_second, bounds, Instant::now());
    }

    pub fn update_at(&self, value: f64, rate_per_second: f64, bounds: TimeRange, now: Instant) {
        if !self.is_running() {
            debug!("animator update ignored while stopped");
            return;
        }
        *self.session.write().unwrap() = Some(AnimationSession {
            anchor_value: value,
            anchor_at: now,
            rate: rate_per_second,
            bounds,
        });
    }

    /// Stops animating and cancels the pending frame callback: no frame
    /// fires after this returns.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.clock.cancel();
        }
        *self.session.write().unwrap() = None;
    }

    /// Visibility hook: an invisible control must not animate. The
    /// animator never resumes on its own when visibility returns.
    pub fn set_visible(&self, visible: bool) {
        if !visible {
            self.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn tick(&self, now: Instant) {
        if !self.is_running() {
            return;
        }
        let session = *self.session.read().unwrap();
        if let Some(session) = session {
            (self.on_value)(session.value_at(now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_animator(
        clock: Arc<ManualFrameClock>,
    ) -> (Arc<PositionAnimator>, Arc<RwLock<Vec<f64>>>) {
        let values = Arc::new(RwLock::new(Vec::new()));
        let sink = Arc::clone(&values);
        let animator = PositionAnimator::new(
            clock,
            Arc::new(move |value| sink.write().unwrap().push(value)),
        );
        (animator, values)
    }

    #[test]
    fn test_interpolation_from_anchor() {
        let clock = Arc::new(ManualFrameClock::new());
        let (animator, values) = recording_animator(Arc::clone(&clock));

        let t0 = Instant::now();
        animator.start_at(10.0, 1.0, TimeRange::new(0.0, 20.0), t0);
        clock.fire_at(t0 + Duration::from_secs(3));

        assert_eq!(*values.read().unwrap(), vec![13.0]);
    }

    #[test]
    fn test_value_is_clamped_to_bounds() {
        let clock = Arc::new(ManualFrameClock::new());
        let (animator, values) = recording_animator(Arc::clone(&clock));

        let t0 = Instant::now();
        animator.start_at(10.0, 2.0, TimeRange::new(0.0, 20.0), t0);
        clock.fire_at(t0 + Duration::from_secs(60));

        assert_eq!(*values.read().unwrap(), vec![20.0]);
    }

    #[test]
    fn test_update_reanchors_without_drift() {
        let clock = Arc::new(ManualFrameClock::new());
        let (animator, values) = recording_animator(Arc::clone(&clock));

        let t0 = Instant::now();
        animator.start_at(10.0, 1.0, TimeRange::new(0.0, 100.0), t0);
        // Authoritative update disagrees with the interpolation; elapsed
        // time must restart from the new anchor, not accumulate.
        let t1 = t0 + Duration::from_secs(2);
        animator.update_at(50.0, 1.0, TimeRange::new(0.0, 100.0), t1);
        clock.fire_at(t1 + Duration::from_secs(1));

        assert_eq!(*values.read().unwrap(), vec![51.0]);
    }

    #[test]
    fn test_stop_cancels_pending_frames() {
        let clock = Arc::new(ManualFrameClock::new());
        let (animator, values) = recording_animator(Arc::clone(&clock));

        let t0 = Instant::now();
        animator.start_at(0.0, 1.0, TimeRange::new(0.0, 10.0), t0);
        animator.stop();
        // Frames keep ticking at the host; none may reach the callback.
        clock.fire_at(t0 + Duration::from_secs(1));
        clock.fire_at(t0 + Duration::from_secs(2));

        assert!(values.read().unwrap().is_empty());
        assert!(!animator.is_running());
    }

    #[test]
    fn test_visibility_loss_stops_and_never_resumes_alone() {
        let clock = Arc::new(ManualFrameClock::new());
        let (animator, values) = recording_animator(Arc::clone(&clock));

        let t0 = Instant::now();
        animator.start_at(5.0, 1.0, TimeRange::new(0.0, 10.0), t0);
        animator.set_visible(false);
        clock.fire_at(t0 + Duration::from_secs(1));
        assert!(values.read().unwrap().is_empty());

        // Visibility back: still stopped until the owner restarts.
        animator.set_visible(true);
        clock.fire_at(t0 + Duration::from_secs(2));
        assert!(values.read().unwrap().is_empty());

        animator.start_at(5.0, 1.0, TimeRange::new(0.0, 10.0), t0 + Duration::from_secs(3));
        clock.fire_at(t0 + Duration::from_secs(4));
        assert_eq!(*values.read().unwrap(), vec![6.0]);
    }

    #[test]
    fn test_update_while_stopped_is_ignored() {
        let clock = Arc::new(ManualFrameClock::new());
        let (animator, values) = recording_animator(Arc::clone(&clock));

        animator.update(42.0, 1.0, TimeRange::new(0.0, 100.0));
        clock.fire_at(Instant::now());
        assert!(values.read().unwrap().is_empty());
        assert!(!animator.is_running());
    }
}
