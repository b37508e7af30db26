//! The capability surface natives see.
//!
//! A native never touches the VM directly; it receives a [`HostContext`]
//! scoped to the calling context. Suspension is explicit: a native that
//! cannot complete synchronously calls one of the pausing capabilities
//! (`sleep_current`, `monitor_wait`) and returns `Void` - the VM observes
//! the context's run-state after the call.

use core_types::{ObjectRef, Value, ValueStack};

/// What a native produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeOutcome {
    /// No return value
    Void,
    /// Single-slot return value
    Return(Value),
    /// Two-slot return value
    ReturnWide(Value),
}

/// Capabilities the VM grants a native for the duration of one call.
pub trait HostContext {
    /// The calling frame's operand stack; arguments are on top.
    fn stack(&mut self) -> &mut ValueStack;

    /// Allocate a plain instance.
    fn new_object(&mut self, class_name: &str) -> ObjectRef;

    /// Allocate a guest string.
    fn new_string(&mut self, value: &str) -> ObjectRef;

    /// Force a cooperative yield: the context is re-enqueued immediately.
    fn yield_current(&mut self);

    /// Pause the context and schedule a timer-driven resume after `ms`.
    fn sleep_current(&mut self, ms: u64);

    /// Release the object's monitor and join its wait queue; a timeout of
    /// zero waits indefinitely. Raises the guest monitor errors itself.
    fn monitor_wait(&mut self, obj: ObjectRef, timeout_ms: i64);

    /// Wake one (or all) contexts waiting on the object's monitor. Raises
    /// the guest monitor errors itself.
    fn monitor_notify(&mut self, obj: ObjectRef, notify_all: bool);

    /// Start a new logical thread whose entry point is `run()` on the
    /// given thread object.
    fn spawn_thread(&mut self, thread_obj: ObjectRef);

    /// The thread object of the calling context, if it has one.
    fn current_thread_object(&self) -> Option<ObjectRef>;
}
