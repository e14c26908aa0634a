//! Clock seam for the scheduler.
//!
//! The release grid only needs "what time is it" and "sleep until"; putting
//! those behind a trait lets the timing tests drive the grid with a manual
//! clock instead of real sleeps.

use std::time::Instant;

/// Time source and suspension primitive used by the scheduler.
pub trait Clock {
    /// Current instant on a monotonic timeline.
    fn now(&self) -> Instant;

    /// Suspend the calling thread until `deadline`. Returns immediately if
    /// the deadline has already passed.
    fn sleep_until(&self, deadline: Instant);
}

/// Production clock backed by `std::time::Instant` and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}
