//! The monitor subsystem: per-object reentrant locks with wait/notify.
//!
//! Monitors model guest-level contention only; nothing here synchronizes
//! host memory. Monitor state is created lazily on first `monitorEnter` and
//! persists with its object. All mutation of owner/level/queues happens
//! inside this module, from the enter/exit/wait/notify/wakeup entry points,
//! which is what preserves the invariants:
//!
//! - `level > 0` implies an owner; `level == 0` implies no owner
//! - a full release hands the lock to at most one ready-queue entry
//! - a context woken from `wait` re-acquires at its saved reentrancy level
//!   before it runs again

use std::collections::VecDeque;

use core_types::{GuestError, GuestErrorKind, ObjectRef};
use tracing::trace;

use crate::context::ContextId;
use crate::vm::{TimerEvent, Vm};

/// Lock state of one object.
#[derive(Debug, Default)]
pub struct Monitor {
    owner: Option<ContextId>,
    level: u32,
    ready: VecDeque<ContextId>,
    waiting: VecDeque<ContextId>,
}

impl Monitor {
    /// Context currently owning the lock.
    pub fn owner(&self) -> Option<ContextId> {
        self.owner
    }

    /// Reentrancy level; zero means unlocked.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Contexts blocked trying to acquire.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Contexts parked in `wait`.
    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }
}

impl Vm {
    /// Inspect an object's monitor, if one was ever created for it.
    pub fn monitor(&self, obj: ObjectRef) -> Option<&Monitor> {
        self.monitors.get(&obj)
    }

    /// Acquire the object's monitor for `id`, or block.
    ///
    /// Unlocked: acquires at the context's saved reentrancy level (1 unless
    /// restoring after a wait). Owned by `id`: increments the level. Owned
    /// by another context: parks `id` on the ready queue and pauses it; a
    /// later release grants the lock via `wakeup` before resuming it.
    pub fn monitor_enter(&mut self, id: ContextId, obj: ObjectRef) {
        let ctx = self.contexts.get_mut(&id).expect("dead context");
        let monitor = self.monitors.entry(obj).or_default();
        if monitor.level == 0 {
            monitor.owner = Some(id);
            monitor.level = ctx.lock_level_on_acquire;
            ctx.lock_level_on_acquire = 1;
            trace!(ctx = id.0, obj = obj.0, level = monitor.level, "monitor acquired");
        } else if monitor.owner == Some(id) {
            monitor.level += 1;
        } else {
            monitor.ready.push_back(id);
            ctx.pause("monitorEnter");
        }
    }

    /// Release one level of the object's monitor.
    ///
    /// Raises `IllegalMonitorState` (and returns false) if `id` does not
    /// hold the lock. On full release, grants ownership to the first live
    /// ready-queue entry, which re-enqueues that context.
    pub fn monitor_exit(&mut self, id: ContextId, obj: ObjectRef) -> bool {
        let granted = {
            let Some(monitor) = self.monitors.get_mut(&obj) else {
                self.raise_guest(
                    id,
                    GuestError::new(GuestErrorKind::IllegalMonitorState, "monitor not held"),
                );
                return false;
            };
            if monitor.owner != Some(id) || monitor.level == 0 {
                drop(monitor);
                self.raise_guest(
                    id,
                    GuestError::new(GuestErrorKind::IllegalMonitorState, "monitor not held"),
                );
                return false;
            }
            monitor.level -= 1;
            if monitor.level > 0 {
                return true;
            }
            monitor.owner = None;
            trace!(ctx = id.0, obj = obj.0, "monitor released");
            // hand off to the first waiter that is still alive
            loop {
                match monitor.ready.pop_front() {
                    Some(next) if self.contexts.contains_key(&next) => break Some(next),
                    Some(_) => continue,
                    None => break None,
                }
            }
        };
        if let Some(next) = granted {
            self.wakeup(next, obj);
        }
        true
    }

    /// Release the monitor entirely and park `id` on the object's wait
    /// queue, optionally with a timeout.
    ///
    /// Raises `IllegalArgument` on a negative timeout and
    /// `IllegalMonitorState` if `id` does not hold the lock. The saved
    /// reentrancy level is restored when the context is woken and
    /// re-acquires.
    pub fn monitor_wait(&mut self, id: ContextId, obj: ObjectRef, timeout_ms: i64) {
        if timeout_ms < 0 {
            self.raise_guest(
                id,
                GuestError::new(GuestErrorKind::IllegalArgument, "timeout is negative"),
            );
            return;
        }
        let level = match self.monitors.get(&obj) {
            Some(monitor) if monitor.owner == Some(id) && monitor.level > 0 => monitor.level,
            _ => {
                self.raise_guest(
                    id,
                    GuestError::new(GuestErrorKind::IllegalMonitorState, "wait without lock"),
                );
                return;
            }
        };

        // Save the reentrancy level, collapse to one, and go through the
        // normal exit path so the ready-queue handoff happens exactly once.
        self.contexts
            .get_mut(&id)
            .expect("dead context")
            .lock_level_on_acquire = level;
        self.monitors.get_mut(&obj).expect("monitor vanished").level = 1;
        let released = self.monitor_exit(id, obj);
        debug_assert!(released, "wait failed to release a held monitor");

        let ctx = self.contexts.get_mut(&id).expect("dead context");
        ctx.lock_timeout = if timeout_ms > 0 {
            Some(
                self.timers
                    .schedule(timeout_ms as u64, TimerEvent::WaitTimeout { ctx: id, obj }),
            )
        } else {
            None
        };
        self.monitors
            .entry(obj)
            .or_default()
            .waiting
            .push_back(id);
        self.contexts
            .get_mut(&id)
            .expect("dead context")
            .pause("wait");
    }

    /// Wake one waiting context (or all of them).
    ///
    /// Raises `IllegalMonitorState` if `id` does not hold the lock. Woken
    /// contexts do not run until the notifier releases the monitor; `wakeup`
    /// parks them on the ready queue while the lock is held.
    pub fn monitor_notify(&mut self, id: ContextId, obj: ObjectRef, notify_all: bool) {
        let held = matches!(
            self.monitors.get(&obj),
            Some(monitor) if monitor.owner == Some(id) && monitor.level > 0
        );
        if !held {
            self.raise_guest(
                id,
                GuestError::new(GuestErrorKind::IllegalMonitorState, "notify without lock"),
            );
            return;
        }
        loop {
            let target = {
                let monitor = self.monitors.get_mut(&obj).expect("monitor vanished");
                monitor.waiting.pop_front()
            };
            let Some(target) = target else { break };
            if self.contexts.contains_key(&target) {
                self.wakeup(target, obj);
                if !notify_all {
                    break;
                }
            }
        }
    }

    /// Re-admit a context that was parked on the object's monitor.
    ///
    /// Cancels a pending wait timer (no double wakeup when a notify wins
    /// the race). If the lock is free, the context acquires it at its saved
    /// reentrancy level and is resumed directly; otherwise it queues on the
    /// ready queue and the next full release grants it.
    pub(crate) fn wakeup(&mut self, id: ContextId, obj: ObjectRef) {
        let ctx = self.contexts.get_mut(&id).expect("dead context");
        if let Some(handle) = ctx.lock_timeout.take() {
            self.timers.cancel(handle);
        }
        let monitor = self.monitors.entry(obj).or_default();
        if monitor.level != 0 {
            monitor.ready.push_back(id);
            return;
        }
        monitor.owner = Some(id);
        monitor.level = ctx.lock_level_on_acquire;
        ctx.lock_level_on_acquire = 1;
        trace!(ctx = id.0, obj = obj.0, level = monitor.level, "monitor granted");
        self.resume(id);
    }

    /// A timed wait expired: pull the context off the wait queue (if a
    /// notify has not already done so) and wake it.
    pub(crate) fn monitor_wait_timeout(&mut self, id: ContextId, obj: ObjectRef) {
        if !self.contexts.contains_key(&id) {
            return;
        }
        if let Some(monitor) = self.monitors.get_mut(&obj) {
            monitor.waiting.retain(|&waiting| waiting != id);
        }
        trace!(ctx = id.0, obj = obj.0, "wait timed out");
        self.wakeup(id, obj);
    }
}
