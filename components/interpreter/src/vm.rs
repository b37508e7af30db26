//! The VM: runtime services, contexts, scheduler queues, and monitors
//! composed behind one driver.
//!
//! Exactly one context's interpreter loop runs at any instant. The driver
//! ([`Vm::run`]) drains the run queue, executing each context to its next
//! suspension point, and only when no context is runnable fires the
//! earliest pending timer (advancing the virtual clock). A paused context
//! is not re-enqueued automatically; some callback - timer fire, monitor
//! grant, host call - must [`Vm::resume`] it.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use bytecode_system::{MethodInfo, MethodProvider, MethodSel};
use core_types::{GuestError, ObjectRef, Value, ValueStack};
use natives::{HostContext, NativeFn, NativeRegistry};
use scheduler::{RunQueue, TimerQueue};
use tracing::{debug, trace, warn};

use crate::context::{Context, ContextId, RunState};
use crate::frame::FramePool;
use crate::instrument::{Instrument, NullInstrument};
use crate::monitor::Monitor;
use crate::runtime::Runtime;
use crate::synthetic;

/// Default instruction budget per execution slice; exhausting it forces a
/// cooperative yield so busy loops cannot starve other contexts.
pub const DEFAULT_STEP_BUDGET: usize = 10_000;

/// What a fired timer means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    /// Re-enqueue a sleeping context
    Resume(ContextId),
    /// A timed `wait` expired
    WaitTimeout {
        /// The waiting context
        ctx: ContextId,
        /// The object it waits on
        obj: ObjectRef,
    },
}

/// The virtual machine.
pub struct Vm {
    /// Runtime services: heap, provider, class objects, init table
    pub runtime: Runtime,
    pub(crate) natives: NativeRegistry,
    pub(crate) instrument: Box<dyn Instrument>,
    pub(crate) contexts: BTreeMap<ContextId, Context>,
    next_context: u32,
    pub(crate) frame_pool: FramePool,
    pub(crate) run_queue: RunQueue<ContextId>,
    pub(crate) timers: TimerQueue<TimerEvent>,
    pub(crate) monitors: HashMap<ObjectRef, Monitor>,
    step_budget: usize,
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("contexts", &self.contexts.len())
            .field("runnable", &self.run_queue.len())
            .field("timers", &self.timers.len())
            .field("monitors", &self.monitors.len())
            .finish()
    }
}

impl Vm {
    /// Create a VM over a class/method provider, with the default natives
    /// and no instrumentation.
    pub fn new(provider: Box<dyn MethodProvider>) -> Self {
        Self {
            runtime: Runtime::new(provider),
            natives: NativeRegistry::with_defaults(),
            instrument: Box::new(NullInstrument),
            contexts: BTreeMap::new(),
            next_context: 0,
            frame_pool: FramePool::new(),
            run_queue: RunQueue::new(),
            timers: TimerQueue::new(),
            monitors: HashMap::new(),
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }

    /// Select the instrumentation observer (once, at startup).
    pub fn with_instrument(mut self, instrument: Box<dyn Instrument>) -> Self {
        self.instrument = instrument;
        self
    }

    /// Override the per-slice instruction budget.
    pub fn with_step_budget(mut self, budget: usize) -> Self {
        assert!(budget > 0, "step budget must be positive");
        self.step_budget = budget;
        self
    }

    /// Register (or replace) a native implementation.
    pub fn register_native(&mut self, sel: MethodSel, native: NativeFn) {
        self.natives.register(sel, native);
    }

    /// The per-slice instruction budget.
    pub fn step_budget(&self) -> usize {
        self.step_budget
    }

    /// Number of frames sitting in the reuse pool.
    pub fn pooled_frames(&self) -> usize {
        self.frame_pool.pooled()
    }

    fn new_context(&mut self) -> ContextId {
        let id = ContextId(self.next_context);
        self.next_context += 1;
        self.contexts.insert(id, Context::new(id));
        debug!(ctx = id.0, "context created");
        id
    }

    /// Start a logical thread executing `sel` with the given arguments.
    ///
    /// The arguments become the method's incoming locals. The context is
    /// enqueued, not run synchronously.
    pub fn spawn(&mut self, sel: &MethodSel, args: &[Value]) -> Result<ContextId, GuestError> {
        let method = self.runtime.lookup(sel)?;
        let id = self.new_context();
        let ctx = self.contexts.get_mut(&id).expect("dead context");
        for value in args {
            if value.is_wide() {
                ctx.stack.push_wide(*value);
            } else {
                ctx.stack.push(*value);
            }
        }
        debug_assert_eq!(
            ctx.stack.len(),
            method.consumed_slots as usize,
            "spawn arguments do not match the method's consumed slots"
        );
        self.push_frame(id, method);
        self.resume(id);
        Ok(id)
    }

    /// Start a logical thread for a thread object: its entry frame invokes
    /// `run()` on the object through a synthetic shim.
    pub fn spawn_thread(&mut self, thread_obj: ObjectRef) -> ContextId {
        let class_name = self.runtime.heap.get(thread_obj).class_name.clone();
        let id = self.new_context();
        let ctx = self.contexts.get_mut(&id).expect("dead context");
        ctx.thread_obj = Some(thread_obj);
        ctx.stack.push(Value::Reference(thread_obj));
        self.push_frame(id, Rc::new(synthetic::thread_entry_method(&class_name)));
        self.resume(id);
        id
    }

    /// Number of live contexts.
    pub fn active_count(&self) -> usize {
        self.contexts.len()
    }

    /// Inspect a context; `None` once it terminated.
    pub fn context(&self, id: ContextId) -> Option<&Context> {
        self.contexts.get(&id)
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.timers.now_ms()
    }

    /// Make a context runnable again. This is the sole re-entry point after
    /// a pause and it is idempotent: re-enqueueing a queued or dead context
    /// is a no-op, so timer callbacks, monitor grants, and direct calls can
    /// race freely.
    pub fn resume(&mut self, id: ContextId) {
        let Some(ctx) = self.contexts.get_mut(&id) else {
            return;
        };
        if ctx.state == RunState::Pausing {
            ctx.state = RunState::Running;
        }
        if ctx.queued {
            return;
        }
        ctx.queued = true;
        trace!(ctx = id.0, "enqueued");
        self.run_queue.enqueue(id);
    }

    /// Ask a context to stop. Takes effect at its next suspension boundary;
    /// a running instruction is never interrupted.
    pub fn stop_context(&mut self, id: ContextId) {
        let Some(ctx) = self.contexts.get_mut(&id) else {
            return;
        };
        ctx.stop();
        if !ctx.queued {
            ctx.queued = true;
            self.run_queue.enqueue(id);
        }
    }

    fn top_method(&self, id: ContextId) -> Option<Rc<MethodInfo>> {
        self.contexts
            .get(&id)
            .and_then(|ctx| ctx.current().method_opt().cloned())
    }

    /// Run one context to its next suspension point.
    ///
    /// Never busy-waits: the interpreter returns at the first non-`Running`
    /// state or when the frame stack winds down to the sentinel, and this
    /// method hands control straight back to the caller.
    pub fn execute(&mut self, id: ContextId) {
        if !self.contexts.contains_key(&id) {
            return;
        }
        let top = self.top_method(id);
        self.instrument.on_resume(top.as_deref());

        self.interpret(id);

        let Some(state) = self.contexts.get(&id).map(|ctx| ctx.state) else {
            return;
        };
        let top = self.top_method(id);
        self.instrument.on_pause(top.as_deref());
        match state {
            RunState::Running => {
                // wound down to the sentinel: normal thread exit
                self.kill(id);
            }
            RunState::Yielding => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.state = RunState::Running;
                self.resume(id);
            }
            RunState::Pausing => {
                // stays parked until something calls resume()
            }
            RunState::Stopping => {
                self.kill(id);
            }
        }
    }

    /// Drive all contexts until nothing is runnable and no timers remain.
    ///
    /// Policy: drain the run queue FIFO, executing each context fully to
    /// its next suspension point; only then fire the earliest timer and go
    /// again. Contexts still alive on return are blocked forever (guest
    /// deadlock); they are reported, not killed.
    pub fn run(&mut self) {
        loop {
            while let Some(id) = self.run_queue.dequeue() {
                match self.contexts.get_mut(&id) {
                    Some(ctx) => ctx.queued = false,
                    None => continue,
                }
                self.execute(id);
            }
            match self.timers.fire_next() {
                Some(TimerEvent::Resume(id)) => self.resume(id),
                Some(TimerEvent::WaitTimeout { ctx, obj }) => self.monitor_wait_timeout(ctx, obj),
                None => break,
            }
        }
        if self.active_count() > 0 {
            warn!(
                blocked = self.active_count(),
                "run queue drained with blocked contexts remaining"
            );
        }
    }

    fn kill(&mut self, id: ContextId) {
        if let Some(ctx) = self.contexts.remove(&id) {
            if let Some(handle) = ctx.lock_timeout {
                self.timers.cancel(handle);
            }
            debug!(ctx = id.0, "context terminated");
        }
    }

    /// Push a frame for `method`: the callee's locals base is the caller's
    /// stack length minus the consumed argument slots, so the argument
    /// region is aliased into the callee's locals; scratch locals are
    /// reserved above it.
    pub(crate) fn push_frame(&mut self, id: ContextId, method: Rc<MethodInfo>) {
        let depth = {
            let ctx = self.contexts.get_mut(&id).expect("dead context");
            let consumed = method.consumed_slots as usize;
            debug_assert!(
                ctx.stack.len() >= consumed,
                "caller stack short of argument slots"
            );
            let locals_base = ctx.stack.len() - consumed;
            ctx.stack
                .reserve_slots(method.locals_size as usize - consumed);
            let frame = self.frame_pool.acquire(method.clone(), locals_base);
            ctx.push(frame);
            ctx.depth() - 1
        };
        trace!(ctx = id.0, method = %method.impl_key(), depth, "frame enter");
        self.instrument.on_frame_enter(&method, depth);
    }

    /// Pop the current frame: truncate the caller's operand stack back to
    /// the callee's locals base and push the return value, if any.
    pub(crate) fn pop_frame(&mut self, id: ContextId, return_value: Option<Value>) {
        let (method, depth) = {
            let ctx = self.contexts.get_mut(&id).expect("dead context");
            let frame = ctx.pop();
            let method = frame.method().clone();
            ctx.stack.truncate(frame.locals_base);
            match return_value {
                Some(value) if value.is_wide() => ctx.stack.push_wide(value),
                Some(value) => ctx.stack.push(value),
                None => {}
            }
            self.frame_pool.release(frame);
            (method, ctx.depth() - 1)
        };
        // a <clinit> frame completing is what makes the class initialized
        if method.name == "<clinit>" {
            self.runtime.mark_initialized(&method.class_name);
            self.runtime.clear_initializer(&method.class_name);
        }
        trace!(ctx = id.0, method = %method.impl_key(), depth, "frame exit");
        self.instrument.on_frame_exit(&method, depth);
    }
}

/// Capability shim handed to natives: scopes one native call to one
/// context.
pub(crate) struct VmHost<'a> {
    pub(crate) vm: &'a mut Vm,
    pub(crate) ctx: ContextId,
}

impl HostContext for VmHost<'_> {
    fn stack(&mut self) -> &mut ValueStack {
        &mut self
            .vm
            .contexts
            .get_mut(&self.ctx)
            .expect("dead context")
            .stack
    }

    fn new_object(&mut self, class_name: &str) -> ObjectRef {
        self.vm.runtime.heap.alloc_object(class_name)
    }

    fn new_string(&mut self, value: &str) -> ObjectRef {
        self.vm.runtime.heap.alloc_string(value)
    }

    fn yield_current(&mut self) {
        self.vm
            .contexts
            .get_mut(&self.ctx)
            .expect("dead context")
            .yield_with("Thread.yield");
    }

    fn sleep_current(&mut self, ms: u64) {
        self.vm
            .contexts
            .get_mut(&self.ctx)
            .expect("dead context")
            .pause("sleep");
        self.vm.timers.schedule(ms, TimerEvent::Resume(self.ctx));
    }

    fn monitor_wait(&mut self, obj: ObjectRef, timeout_ms: i64) {
        self.vm.monitor_wait(self.ctx, obj, timeout_ms);
    }

    fn monitor_notify(&mut self, obj: ObjectRef, notify_all: bool) {
        self.vm.monitor_notify(self.ctx, obj, notify_all);
    }

    fn spawn_thread(&mut self, thread_obj: ObjectRef) {
        self.vm.spawn_thread(thread_obj);
    }

    fn current_thread_object(&self) -> Option<ObjectRef> {
        self.vm
            .contexts
            .get(&self.ctx)
            .and_then(|ctx| ctx.thread_obj)
    }
}
