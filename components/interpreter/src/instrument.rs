//! Instrumentation hooks.
//!
//! Pure observers around frame transitions and context suspension. The
//! default [`NullInstrument`] makes every hook a no-op so the hot path pays
//! nothing when tracing is off. An instrument is selected once at VM
//! construction and never swapped mid-run; hooks must not alter control
//! flow.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use bytecode_system::MethodInfo;

/// Observer interface for frame and suspension events.
pub trait Instrument {
    /// A frame was pushed for `method`; `depth` counts real frames after
    /// the push.
    fn on_frame_enter(&mut self, method: &MethodInfo, depth: usize) {
        let _ = (method, depth);
    }

    /// A frame for `method` was popped; `depth` counts real frames after
    /// the pop.
    fn on_frame_exit(&mut self, method: &MethodInfo, depth: usize) {
        let _ = (method, depth);
    }

    /// The context suspended with the given method on top (sentinel:
    /// `None`).
    fn on_pause(&mut self, method: Option<&MethodInfo>) {
        let _ = method;
    }

    /// The context is about to run with the given method on top.
    fn on_resume(&mut self, method: Option<&MethodInfo>) {
        let _ = method;
    }
}

/// The zero-cost default instrument.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInstrument;

impl Instrument for NullInstrument {}

/// Accumulated cost of one method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodCost {
    /// Number of completed activations
    pub count: u64,
    /// Self time spent executing the method (suspended time excluded)
    pub cost: Duration,
}

#[derive(Debug)]
struct ActiveFrame {
    key: String,
    cost: Duration,
    started: Option<Instant>,
}

/// Per-method self-time profiler.
///
/// Tracks a shadow stack of active frames: entering a callee stops the
/// caller's clock, exiting restarts it, and pause/resume stop and restart
/// the top frame's clock so time spent suspended is not charged to the
/// method.
#[derive(Debug, Default)]
pub struct MethodProfiler {
    active: Vec<ActiveFrame>,
    profile: HashMap<String, MethodCost>,
}

impl MethodProfiler {
    /// Create an empty profiler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed-method costs, sorted by descending cost.
    pub fn entries(&self) -> Vec<(String, MethodCost)> {
        let mut entries: Vec<_> = self
            .profile
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by(|a, b| b.1.cost.cmp(&a.1.cost));
        entries
    }

    /// Render a cost-sorted report, one method per line.
    pub fn report(&self) -> String {
        let mut out = String::from("Profile:\n");
        for (key, cost) in self.entries() {
            out.push_str(&format!(
                "{}ms {} {}\n",
                cost.cost.as_millis(),
                cost.count,
                key
            ));
        }
        out
    }

    fn charge_top(&mut self, now: Instant) {
        if let Some(top) = self.active.last_mut() {
            if let Some(started) = top.started.take() {
                top.cost += now - started;
            }
        }
    }
}

impl Instrument for MethodProfiler {
    fn on_frame_enter(&mut self, method: &MethodInfo, _depth: usize) {
        let now = Instant::now();
        self.charge_top(now);
        self.active.push(ActiveFrame {
            key: method.impl_key(),
            cost: Duration::ZERO,
            started: Some(now),
        });
    }

    fn on_frame_exit(&mut self, method: &MethodInfo, _depth: usize) {
        let now = Instant::now();
        self.charge_top(now);
        if let Some(done) = self.active.pop() {
            debug_assert_eq!(done.key, method.impl_key(), "frame exit out of order");
            let entry = self.profile.entry(done.key).or_default();
            entry.count += 1;
            entry.cost += done.cost;
        }
        if let Some(top) = self.active.last_mut() {
            top.started = Some(now);
        }
    }

    fn on_pause(&mut self, _method: Option<&MethodInfo>) {
        self.charge_top(Instant::now());
    }

    fn on_resume(&mut self, _method: Option<&MethodInfo>) {
        if let Some(top) = self.active.last_mut() {
            if top.started.is_none() {
                top.started = Some(Instant::now());
            }
        }
    }
}

/// Shared handle to a [`MethodProfiler`] so a host can keep a reference for
/// reporting while the VM owns the instrument.
#[derive(Debug, Clone, Default)]
pub struct SharedProfiler(pub Rc<RefCell<MethodProfiler>>);

impl SharedProfiler {
    /// Create a fresh shared profiler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the report of the underlying profiler.
    pub fn report(&self) -> String {
        self.0.borrow().report()
    }
}

impl Instrument for SharedProfiler {
    fn on_frame_enter(&mut self, method: &MethodInfo, depth: usize) {
        self.0.borrow_mut().on_frame_enter(method, depth);
    }

    fn on_frame_exit(&mut self, method: &MethodInfo, depth: usize) {
        self.0.borrow_mut().on_frame_exit(method, depth);
    }

    fn on_pause(&mut self, method: Option<&MethodInfo>) {
        self.0.borrow_mut().on_pause(method);
    }

    fn on_resume(&mut self, method: Option<&MethodInfo>) {
        self.0.borrow_mut().on_resume(method);
    }
}
