//! Cooperative scheduler
//!
//! All dataflow runs from reactions invoked by [`Scheduler::tick`] on a
//! single thread. Interrupt handlers never call into the graph; they only
//! raise an [`InterruptFlag`] (or bump an atomic counter) and the scheduler
//! runs the deferred work on its next tick.

pub mod executor;

use portable_atomic::{AtomicBool, Ordering};

pub use executor::{Scheduler, SchedulerError, TaskId, MAX_TASKS};

/// Milliseconds on the monotonic uptime clock
///
/// Wraps after ~49.7 days; all comparisons use wrapping arithmetic.
pub type Millis = u32;

/// Milliseconds elapsed from `earlier` to `now`, tolerant of clock wrap
#[inline]
pub fn elapsed_ms(now: Millis, earlier: Millis) -> u32 {
    now.wrapping_sub(earlier)
}

/// Work invoked by the scheduler
pub trait Reaction {
    /// Run once; `now` is the tick timestamp
    fn react(&self, now: Millis);
}

impl<F: Fn(Millis)> Reaction for F {
    fn react(&self, now: Millis) {
        self(now)
    }
}

/// A source of deferred interrupt work
pub trait EventSource {
    /// Consume the pending flag, returning whether work is due
    fn take_pending(&self) -> bool;
}

/// Flag raised from interrupt context and consumed by the scheduler
///
/// Several raises between two ticks collapse into one reaction.
#[derive(Debug, Default)]
pub struct InterruptFlag {
    pending: AtomicBool,
}

impl InterruptFlag {
    /// Create a cleared flag
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Mark work as pending. Safe to call from an interrupt handler.
    #[inline]
    pub fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Check without consuming
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl EventSource for InterruptFlag {
    fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}
