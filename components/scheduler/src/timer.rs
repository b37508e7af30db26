//! Virtual-clock timer queue.
//!
//! Timed waits and sleeps are driven by a virtual millisecond clock: the
//! driver fires the earliest pending timer when it has no runnable work,
//! advancing the clock to that timer's deadline. Hosts that want wall-clock
//! pacing sleep outside the queue; nothing in the core observes real time.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

/// Handle identifying a scheduled timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// A queue of pending timers ordered by virtual deadline.
///
/// Ties on the deadline fire in schedule order.
#[derive(Debug, Default)]
pub struct TimerQueue<E> {
    now_ms: u64,
    next_seq: u64,
    // (deadline, seq) -> payload; BTreeMap iteration gives firing order
    entries: BTreeMap<(u64, u64), E>,
    // seq -> deadline, for cancellation
    deadlines: HashMap<u64, u64>,
}

impl<E> TimerQueue<E> {
    /// Create an empty queue with the clock at zero.
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_seq: 0,
            entries: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Schedule a timer `delay_ms` from now; returns a handle for cancel.
    pub fn schedule(&mut self, delay_ms: u64, payload: E) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        let deadline = self.now_ms + delay_ms;
        self.entries.insert((deadline, seq), payload);
        self.deadlines.insert(seq, deadline);
        trace!(seq, deadline, "timer scheduled");
        TimerHandle(seq)
    }

    /// Cancel a pending timer. Returns false if it already fired or was
    /// cancelled before; cancelling twice is harmless.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(deadline) => {
                self.entries.remove(&(deadline, handle.0));
                trace!(seq = handle.0, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Deadline of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Fire the earliest pending timer: advance the clock to its deadline
    /// and return its payload.
    pub fn fire_next(&mut self) -> Option<E> {
        let (&(deadline, seq), _) = self.entries.iter().next()?;
        let payload = self.entries.remove(&(deadline, seq));
        self.deadlines.remove(&seq);
        debug_assert!(deadline >= self.now_ms, "clock ran backwards");
        self.now_ms = deadline;
        trace!(seq, deadline, "timer fired");
        payload
    }

    /// Returns true if no timers are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
