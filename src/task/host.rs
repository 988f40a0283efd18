use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::core::Clock;

/// One-shot callback handed to a [`HostLoop`].
pub type Deferred = Box<dyn FnOnce() + Send + 'static>;

/// Host scheduling primitive: run a callback once, after a delay, on the
/// host's UI-affine thread.
pub trait HostLoop: Send + Sync {
    fn defer(&self, delay: Duration, callback: Deferred);
}

/// Upper bound on passes in [`IdleLoop::run_until_idle`] so a callback that
/// keeps re-deferring itself with zero delay cannot spin forever.
const MAX_IDLE_PASSES: usize = 10_000;

struct Pending {
    due: OrderedFloat<f64>,
    seq: u64,
    callback: Deferred,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // Reversed so the max-heap pops the earliest due time, then the earliest
    // insertion.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Cooperative single-threaded deferred queue.
///
/// Callbacks run only when the owner calls [`IdleLoop::run_pending`] or
/// [`IdleLoop::run_until_idle`], on the caller's thread, in due-time order.
pub struct IdleLoop {
    clock: Arc<dyn Clock>,
    queue: Mutex<BinaryHeap<Pending>>,
    next_seq: AtomicU64,
}

impl fmt::Debug for IdleLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleLoop")
            .field("clock", &self.clock)
            .field("pending", &self.len())
            .finish()
    }
}

impl IdleLoop {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            queue: Mutex::new(BinaryHeap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Due time of the earliest pending callback.
    #[must_use]
    pub fn next_due(&self) -> Option<f64> {
        self.queue.lock().peek().map(|pending| pending.due.into_inner())
    }

    /// Runs every callback that was due and queued when the call started.
    /// Callbacks deferred while running wait for the next call.
    pub fn run_pending(&self) -> usize {
        let now = self.clock.now();
        let horizon = self.next_seq.load(AtomicOrdering::SeqCst);
        let mut ran = 0;
        loop {
            let callback = {
                let mut queue = self.queue.lock();
                let ready = queue
                    .peek()
                    .is_some_and(|pending| pending.due.into_inner() <= now && pending.seq < horizon);
                if !ready {
                    break;
                }
                queue.pop().map(|pending| pending.callback)
            };
            if let Some(callback) = callback {
                callback();
                ran += 1;
            }
        }
        if ran > 0 {
            trace!(ran, now, "idle loop pass");
        }
        ran
    }

    /// Repeats [`IdleLoop::run_pending`] until nothing due remains.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_IDLE_PASSES {
            let ran = self.run_pending();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
        warn!(total, "idle loop did not settle");
        total
    }
}

impl HostLoop for IdleLoop {
    fn defer(&self, delay: Duration, callback: Deferred) {
        let due = self.clock.now() + delay.as_secs_f64();
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::SeqCst);
        self.queue.lock().push(Pending {
            due: OrderedFloat(due),
            seq,
            callback,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::{HostLoop, IdleLoop};
    use crate::core::ManualClock;

    #[test]
    fn runs_in_due_order_then_insertion_order() {
        let clock = Arc::new(ManualClock::new(0.0));
        let idle = IdleLoop::new(clock.clone());
        let order = Arc::new(Mutex::new(Vec::new()));
        for (name, delay) in [("late", 2), ("first", 0), ("second", 0)] {
            let order = Arc::clone(&order);
            idle.defer(
                Duration::from_secs(delay),
                Box::new(move || order.lock().push(name)),
            );
        }

        assert_eq!(idle.run_until_idle(), 2);
        clock.advance(2.0);
        assert_eq!(idle.run_until_idle(), 1);
        assert_eq!(*order.lock(), vec!["first", "second", "late"]);
    }

    #[test]
    fn callbacks_deferred_during_a_pass_wait_for_the_next_pass() {
        let clock = Arc::new(ManualClock::new(0.0));
        let idle = Arc::new(IdleLoop::new(clock));
        let inner = Arc::clone(&idle);
        idle.defer(
            Duration::ZERO,
            Box::new(move || inner.defer(Duration::ZERO, Box::new(|| {}))),
        );

        assert_eq!(idle.run_pending(), 1);
        assert_eq!(idle.len(), 1);
        assert_eq!(idle.run_pending(), 1);
        assert!(idle.is_empty());
    }
}
