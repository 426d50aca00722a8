//! Injectable clock. The only place the harness reads "now".
//!
//! RULE: No other module may read system time directly. Everything that
//! needs the current instant asks a `Clock`.
//!
//! A clock holds a stack of frozen instants on top of a `TimeSource`.
//! `freeze` pushes, `unfreeze` pops, and `now()` returns the innermost frozen
//! instant or, when the stack is empty, the source's reading. Create one
//! clock per isolated execution context; freezing a clock shared between
//! concurrently running scenarios leaks time from one into the other.

use crate::{
    calendar,
    error::{HarnessError, HarnessResult},
    types::Instant,
};
use chrono::{Duration, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Where a clock gets its reading when nothing is frozen.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Utc::now()
    }
}

/// A source that never moves. Stands in for "real time" in tests of the
/// clock itself.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub Instant);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Instant {
        self.0
    }
}

pub struct Clock {
    source: Box<dyn TimeSource>,
    frozen: Mutex<Vec<Instant>>,
}

impl Clock {
    /// A clock backed by wall-clock time.
    pub fn system() -> Self {
        Self::with_source(Box::new(SystemTimeSource))
    }

    pub fn with_source(source: Box<dyn TimeSource>) -> Self {
        Self {
            source,
            frozen: Mutex::new(Vec::new()),
        }
    }

    /// The innermost frozen instant, or the source's reading.
    pub fn now(&self) -> Instant {
        // Release the lock before consulting the source.
        let top = self.stack().last().copied();
        match top {
            Some(at) => at,
            None => self.source.now(),
        }
    }

    /// Push a frozen instant. Returns the new nesting depth.
    pub fn freeze(&self, at: Instant) -> usize {
        let mut stack = self.stack();
        stack.push(at);
        log::debug!("clock frozen at {at} (depth {})", stack.len());
        stack.len()
    }

    /// Pop the innermost frozen instant, restoring the enclosing state.
    /// Fails if nothing is frozen: an unmatched unfreeze means a scenario
    /// teardown is out of balance.
    pub fn unfreeze(&self) -> HarnessResult<Instant> {
        let mut stack = self.stack();
        let popped = stack
            .pop()
            .ok_or(HarnessError::ClockState { operation: "unfreeze" })?;
        log::debug!("clock unfrozen from {popped} (depth {})", stack.len());
        Ok(popped)
    }

    /// Move the innermost frozen instant by `delta`. Negative deltas move it back.
    pub fn advance(&self, delta: Duration) -> HarnessResult<Instant> {
        let mut stack = self.stack();
        let top = stack
            .last_mut()
            .ok_or(HarnessError::ClockState { operation: "advance" })?;
        let current = *top;
        *top = current.checked_add_signed(delta).ok_or_else(|| {
            HarnessError::Other(anyhow::anyhow!("cannot advance {current} by {delta}"))
        })?;
        log::debug!("clock advanced to {top}");
        Ok(*top)
    }

    /// Move the innermost frozen instant forward by `n` calendar months.
    pub fn travel_months(&self, n: u32) -> HarnessResult<Instant> {
        let mut stack = self.stack();
        let top = stack
            .last_mut()
            .ok_or(HarnessError::ClockState { operation: "travel_months" })?;
        let current = *top;
        *top = calendar::months_after(n, current)?;
        log::debug!("clock travelled {n} month(s) to {top}");
        Ok(*top)
    }

    pub fn depth(&self) -> usize {
        self.stack().len()
    }

    pub fn is_frozen(&self) -> bool {
        !self.stack().is_empty()
    }

    /// Freeze at `at`, run `f`, then unfreeze on every exit path.
    /// A panic inside `f` is resumed once the clock has been restored.
    pub fn with_frozen<T>(&self, at: Instant, f: impl FnOnce(&Clock) -> T) -> HarnessResult<T> {
        let depth = self.freeze(at);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        let restored = self.restore_to(depth - 1);
        match outcome {
            Ok(value) => restored.map(|()| value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Pop frozen instants until the stack is `depth` deep. Used to restore
    /// the enclosing state even when the inner scope forgot to unfreeze.
    pub(crate) fn restore_to(&self, depth: usize) -> HarnessResult<()> {
        let mut stack = self.stack();
        if stack.len() <= depth {
            // The scope popped its own freeze (and possibly more).
            if stack.len() < depth {
                return Err(HarnessError::ClockState { operation: "unfreeze" });
            }
            return Ok(());
        }
        log::debug!("clock restored from depth {} to {depth}", stack.len());
        stack.truncate(depth);
        Ok(())
    }

    // The stack is never left half-updated, so a poisoned lock is still usable.
    fn stack(&self) -> MutexGuard<'_, Vec<Instant>> {
        self.frozen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Clock {
    fn default() -> Self { Self::system() }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("frozen", &*self.stack())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::ymd;
    use std::sync::{Arc, OnceLock, Weak};

    fn fixed_clock() -> Clock {
        Clock::with_source(Box::new(FixedTimeSource(ymd(2020, 1, 1).unwrap())))
    }

    #[test]
    fn unfrozen_clock_reads_source() {
        let clock = fixed_clock();
        assert_eq!(clock.now(), ymd(2020, 1, 1).unwrap());
        assert!(!clock.is_frozen());
    }

    /// A source that inspects the clock it belongs to.
    struct SelfObservingSource(Arc<OnceLock<Weak<Clock>>>);

    impl TimeSource for SelfObservingSource {
        fn now(&self) -> Instant {
            if let Some(clock) = self.0.get().and_then(Weak::upgrade) {
                assert_eq!(clock.depth(), 0);
            }
            ymd(2020, 1, 1).unwrap()
        }
    }

    #[test]
    fn source_may_read_its_own_clock() {
        let slot = Arc::new(OnceLock::new());
        let clock = Arc::new(Clock::with_source(Box::new(SelfObservingSource(Arc::clone(&slot)))));
        slot.set(Arc::downgrade(&clock)).unwrap();
        assert_eq!(clock.now(), ymd(2020, 1, 1).unwrap());
    }

    #[test]
    fn advance_requires_freeze() {
        let clock = fixed_clock();
        let err = clock.advance(Duration::days(1)).unwrap_err();
        assert!(matches!(err, HarnessError::ClockState { operation: "advance" }));
    }

    #[test]
    fn restore_to_pops_leaked_freezes() {
        let clock = fixed_clock();
        clock.freeze(ymd(2017, 5, 6).unwrap());
        clock.freeze(ymd(2017, 6, 6).unwrap());
        clock.freeze(ymd(2017, 7, 6).unwrap());
        clock.restore_to(1).unwrap();
        assert_eq!(clock.depth(), 1);
        assert_eq!(clock.now(), ymd(2017, 5, 6).unwrap());
    }

    #[test]
    fn restore_to_detects_over_unfreeze() {
        let clock = fixed_clock();
        clock.freeze(ymd(2017, 5, 6).unwrap());
        assert!(clock.restore_to(2).is_err());
    }
}
