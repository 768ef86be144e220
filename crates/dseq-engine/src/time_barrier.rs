//! Frame pacing against a monotonic clock.

use std::time::{Duration, Instant};

/// Time source used by [`TimeBarrier`].
pub trait Clock {
    /// Time elapsed since some fixed origin.
    fn now(&self) -> Duration;
    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Releases the caller once per frame interval.
///
/// Deadlines advance by exactly one interval per [`wait`](Self::wait), so a
/// late frame is followed by shorter waits until the schedule is met again.
#[derive(Debug)]
pub struct TimeBarrier<C: Clock = MonotonicClock> {
    clock: C,
    interval: Duration,
    last: Option<Duration>,
}

impl TimeBarrier<MonotonicClock> {
    pub fn with_fps(fps: f64) -> Self {
        Self::new(fps, MonotonicClock::new())
    }
}

impl<C: Clock> TimeBarrier<C> {
    /// Barrier for `fps` frames per second. Non-positive rates never wait.
    pub fn new(fps: f64, clock: C) -> Self {
        let interval = if fps > 0.0 && fps.is_finite() {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::ZERO
        };
        Self { clock, interval, last: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Take the current time as the baseline for the next deadline.
    pub fn start(&mut self) {
        self.last = Some(self.clock.now());
    }

    pub fn is_started(&self) -> bool {
        self.last.is_some()
    }

    /// Sleep until one interval after the previous deadline. Starts the
    /// barrier if needed.
    pub fn wait(&mut self) {
        let last = match self.last {
            Some(last) => last,
            None => {
                let now = self.clock.now();
                self.last = Some(now);
                now
            }
        };
        let deadline = last + self.interval;
        let now = self.clock.now();
        if let Some(remaining) = deadline.checked_sub(now) {
            if !remaining.is_zero() {
                self.clock.sleep(remaining);
            }
        }
        self.last = Some(deadline);
    }

    /// Forget the baseline; the next `start` or `wait` begins a new schedule.
    pub fn stop(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct MockClock {
        now: Cell<Duration>,
        sleeps: RefCell<Vec<Duration>>,
    }

    impl MockClock {
        fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for &MockClock {
        fn now(&self) -> Duration {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
            self.advance(duration);
        }
    }

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn waits_one_interval_per_call() {
        let clock = MockClock::default();
        let mut barrier = TimeBarrier::new(100.0, &clock);
        barrier.start();
        barrier.wait();
        barrier.wait();
        assert_eq!(*clock.sleeps.borrow(), vec![10 * MS, 10 * MS]);
        assert_eq!(clock.now.get(), 20 * MS);
    }

    #[test]
    fn late_frames_are_made_up() {
        let clock = MockClock::default();
        let mut barrier = TimeBarrier::new(100.0, &clock);
        barrier.start();
        clock.advance(25 * MS);
        barrier.wait();
        barrier.wait();
        assert!(clock.sleeps.borrow().is_empty());
        barrier.wait();
        assert_eq!(*clock.sleeps.borrow(), vec![5 * MS]);
    }

    #[test]
    fn partial_work_shortens_the_sleep() {
        let clock = MockClock::default();
        let mut barrier = TimeBarrier::new(100.0, &clock);
        barrier.start();
        clock.advance(4 * MS);
        barrier.wait();
        assert_eq!(*clock.sleeps.borrow(), vec![6 * MS]);
    }

    #[test]
    fn stop_discards_drift() {
        let clock = MockClock::default();
        let mut barrier = TimeBarrier::new(100.0, &clock);
        barrier.start();
        clock.advance(500 * MS);
        barrier.stop();
        assert!(!barrier.is_started());
        barrier.start();
        barrier.wait();
        assert_eq!(*clock.sleeps.borrow(), vec![10 * MS]);
    }

    #[test]
    fn wait_without_start_begins_schedule() {
        let clock = MockClock::default();
        let mut barrier = TimeBarrier::new(50.0, &clock);
        barrier.wait();
        assert!(barrier.is_started());
        assert_eq!(*clock.sleeps.borrow(), vec![20 * MS]);
    }

    #[test]
    fn zero_rate_never_sleeps() {
        let clock = MockClock::default();
        let mut barrier = TimeBarrier::new(0.0, &clock);
        for _ in 0..5 {
            barrier.wait();
        }
        assert!(clock.sleeps.borrow().is_empty());
    }
}
