//! The interpreter loop.
//!
//! `interpret` runs one context while its state stays `Running`, one
//! instruction per iteration, re-reading the current frame each time so
//! frame pushes, pops, and synthetic raises all take effect at the next
//! boundary. Suspension is purely a state flag: nothing here unwinds the
//! host stack to transfer control, and guest-exception unwinding (synthetic
//! raise frames plus exception tables) is a separate mechanism from
//! scheduling.

use std::rc::Rc;

use bytecode_system::{Constant, MethodInfo, MethodSel, Opcode};
use core_types::{GuestError, GuestErrorKind, ObjectRef, Value};
use natives::{NativeFn, NativeOutcome};
use tracing::{debug, error, warn};

use crate::context::{ContextId, RunState};
use crate::synthetic;
use crate::vm::{Vm, VmHost};

impl Vm {
    /// Run `id` until it leaves the `Running` state or its frame stack
    /// winds down to the sentinel. Bounded by the step budget: exhausting
    /// it forces a `Yielding` transition (fairness, not blocking).
    pub(crate) fn interpret(&mut self, id: ContextId) {
        let mut budget = self.step_budget();
        loop {
            let (method, op) = {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                if ctx.state != RunState::Running {
                    return;
                }
                if ctx.at_sentinel() {
                    return;
                }
                if budget == 0 {
                    ctx.yield_with("step budget");
                    return;
                }
                budget -= 1;
                let frame = ctx.current_mut();
                let method = frame.method().clone();
                let pc = frame.pc;
                assert!(
                    pc < method.code.instructions.len(),
                    "pc ran past the end of {}",
                    method.impl_key()
                );
                frame.op_pc = pc;
                frame.pc = pc + 1;
                let op = method.code.instructions[pc].clone();
                (method, op)
            };
            self.step(id, &method, op);
        }
    }

    /// Execute one instruction of `method` on context `id`.
    fn step(&mut self, id: ContextId, method: &Rc<MethodInfo>, op: Opcode) {
        match op {
            Opcode::LoadConstant(index) => {
                let constant = method.code.constants[index as usize].clone();
                let value = match constant {
                    Constant::Int(v) => Value::Int(v),
                    Constant::Long(v) => Value::Long(v),
                    Constant::Float(v) => Value::Float(v),
                    Constant::Double(v) => Value::Double(v),
                    Constant::Str(s) => Value::Reference(self.runtime.heap.alloc_string(s)),
                };
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                if value.is_wide() {
                    ctx.stack.push_wide(value);
                } else {
                    ctx.stack.push(value);
                }
            }
            Opcode::PushNull => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.stack.push(Value::Null);
            }
            Opcode::LoadLocal(index) => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let base = ctx.current().locals_base;
                let value = ctx.stack.get(base + index as usize);
                ctx.stack.push(value);
            }
            Opcode::StoreLocal(index) => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let base = ctx.current().locals_base;
                let value = ctx.stack.pop();
                ctx.stack.set(base + index as usize, value);
            }
            Opcode::LoadLocalWide(index) => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let base = ctx.current().locals_base;
                let value = ctx.stack.get_wide(base + index as usize);
                ctx.stack.push_wide(value);
            }
            Opcode::StoreLocalWide(index) => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let base = ctx.current().locals_base;
                let value = ctx.stack.pop_wide();
                ctx.stack.set_wide(base + index as usize, value);
            }
            Opcode::IncLocal(index, delta) => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let slot = ctx.current().locals_base + index as usize;
                let value = ctx.stack.get(slot).as_int().expect("IncLocal on non-int");
                ctx.stack.set(slot, Value::Int(value.wrapping_add(delta)));
            }
            Opcode::Dup => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let value = ctx.stack.read(1);
                ctx.stack.push(value);
            }
            Opcode::Pop => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.stack.pop();
            }
            Opcode::Add => self.int_binop(id, i32::wrapping_add),
            Opcode::Sub => self.int_binop(id, i32::wrapping_sub),
            Opcode::Mul => self.int_binop(id, i32::wrapping_mul),
            Opcode::LongAdd => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let b = ctx.stack.pop_wide().as_long().expect("LongAdd on non-long");
                let a = ctx.stack.pop_wide().as_long().expect("LongAdd on non-long");
                ctx.stack.push_wide(Value::Long(a.wrapping_add(b)));
            }
            Opcode::IntLt => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let b = ctx.stack.pop().as_int().expect("IntLt on non-int");
                let a = ctx.stack.pop().as_int().expect("IntLt on non-int");
                ctx.stack.push(Value::Int(i32::from(a < b)));
            }
            Opcode::Jump(target) => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.current_mut().pc = target as usize;
            }
            Opcode::JumpIfZero(target) => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let value = ctx.stack.pop().as_int().expect("JumpIfZero on non-int");
                if value == 0 {
                    ctx.current_mut().pc = target as usize;
                }
            }
            Opcode::Invoke(index) => {
                let sel = method.code.method_refs[index as usize].clone();
                self.invoke(id, &sel);
            }
            Opcode::Return => self.return_from(id, None),
            Opcode::ReturnValue => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let value = ctx.stack.pop();
                self.return_from(id, Some(value));
            }
            Opcode::ReturnValueWide => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let value = ctx.stack.pop_wide();
                self.return_from(id, Some(value));
            }
            Opcode::New(index) => {
                let class_name = method.code.class_refs[index as usize].clone();
                // instantiation triggers class initialization
                if !self.runtime.is_initialized(&class_name)
                    && self.runtime.initializer(&class_name) != Some(id)
                    && self.begin_class_init(id, &class_name)
                {
                    return;
                }
                let obj = self.runtime.heap.alloc_object(&class_name);
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.stack.push(Value::Reference(obj));
            }
            Opcode::NewPrimitiveArray(kind) => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let length = ctx.stack.pop().as_int().expect("array length is an int");
                if length < 0 {
                    self.raise_guest(
                        id,
                        GuestError::new(GuestErrorKind::IllegalArgument, "negative array size"),
                    );
                    return;
                }
                let arr = self.runtime.heap.alloc_primitive_array(kind, length as usize);
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.stack.push(Value::Reference(arr));
            }
            Opcode::NewRefArray(index) => {
                let class_name = method.code.class_refs[index as usize].clone();
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let length = ctx.stack.pop().as_int().expect("array length is an int");
                if length < 0 {
                    self.raise_guest(
                        id,
                        GuestError::new(GuestErrorKind::IllegalArgument, "negative array size"),
                    );
                    return;
                }
                let arr = self.runtime.heap.alloc_ref_array(class_name, length as usize);
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.stack.push(Value::Reference(arr));
            }
            Opcode::ArrayLength => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let Some(arr) = ctx.stack.pop().as_reference() else {
                    self.raise_null(id, "arraylength on null");
                    return;
                };
                let length = self
                    .runtime
                    .heap
                    .get(arr)
                    .array_length()
                    .expect("arraylength on non-array") as i32;
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.stack.push(Value::Int(length));
            }
            Opcode::ArrayGet => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let index = ctx.stack.pop().as_int().expect("array index is an int");
                let Some(arr) = ctx.stack.pop().as_reference() else {
                    self.raise_null(id, "array load from null");
                    return;
                };
                let element = if index >= 0 {
                    self.runtime.heap.get(arr).array_get(index as usize)
                } else {
                    None
                };
                match element {
                    Some(value) => {
                        let ctx = self.contexts.get_mut(&id).expect("dead context");
                        if value.is_wide() {
                            ctx.stack.push_wide(value);
                        } else {
                            ctx.stack.push(value);
                        }
                    }
                    None => self.raise_guest(
                        id,
                        GuestError::new(
                            GuestErrorKind::ArrayIndexOutOfBounds,
                            format!("index {index}"),
                        ),
                    ),
                }
            }
            Opcode::ArraySet => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                // a padding slot on top means the stored value is wide
                let value = if ctx.stack.read(1) == Value::Padding {
                    ctx.stack.pop_wide()
                } else {
                    ctx.stack.pop()
                };
                let index = ctx.stack.pop().as_int().expect("array index is an int");
                let Some(arr) = ctx.stack.pop().as_reference() else {
                    self.raise_null(id, "array store to null");
                    return;
                };
                let stored = index >= 0
                    && self
                        .runtime
                        .heap
                        .get_mut(arr)
                        .array_set(index as usize, value);
                if !stored {
                    self.raise_guest(
                        id,
                        GuestError::new(
                            GuestErrorKind::ArrayIndexOutOfBounds,
                            format!("index {index}"),
                        ),
                    );
                }
            }
            Opcode::Throw => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let Some(obj) = ctx.stack.pop().as_reference() else {
                    self.raise_null(id, "throw null");
                    return;
                };
                self.throw_object(id, obj);
            }
            Opcode::MonitorEnter => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let Some(obj) = ctx.stack.pop().as_reference() else {
                    self.raise_null(id, "monitorenter on null");
                    return;
                };
                self.monitor_enter(id, obj);
            }
            Opcode::MonitorExit => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                let Some(obj) = ctx.stack.pop().as_reference() else {
                    self.raise_null(id, "monitorexit on null");
                    return;
                };
                self.monitor_exit(id, obj);
            }
        }
    }

    fn int_binop(&mut self, id: ContextId, op: fn(i32, i32) -> i32) {
        let ctx = self.contexts.get_mut(&id).expect("dead context");
        let b = ctx.stack.pop().as_int().expect("int op on non-int");
        let a = ctx.stack.pop().as_int().expect("int op on non-int");
        ctx.stack.push(Value::Int(op(a, b)));
    }

    /// Resolve and invoke a method selector.
    fn invoke(&mut self, id: ContextId, sel: &MethodSel) {
        // The class-init shim routes through here; run <clinit> at most
        // once per class, tolerating re-entry by the initializing context.
        if sel.name == "<clinit>" {
            if self.runtime.is_initialized(&sel.class_name)
                || self.runtime.initializer(&sel.class_name).is_some()
            {
                return;
            }
            if let Ok(clinit) = self.runtime.lookup(sel) {
                self.runtime.set_initializer(&sel.class_name, id);
                self.push_frame(id, clinit);
            } else {
                self.runtime.mark_initialized(&sel.class_name);
            }
            return;
        }

        // the native dispatch table wins over bytecode
        if let Some(native) = self.natives.lookup(sel) {
            self.dispatch_native(id, sel, native);
            return;
        }

        let method = match self.runtime.lookup(sel) {
            Ok(method) => method,
            Err(err) => {
                self.raise_guest(id, err);
                return;
            }
        };

        if method.is_native {
            // declared native, but the host registered no implementation
            self.raise_guest(
                id,
                GuestError::new(
                    GuestErrorKind::Runtime,
                    format!("native method missing: {}", sel.impl_key()),
                ),
            );
            return;
        }

        // static invocation triggers class initialization; the triggering
        // instruction re-executes once the init frame returns
        if method.is_static
            && !self.runtime.is_initialized(&sel.class_name)
            && self.runtime.initializer(&sel.class_name) != Some(id)
            && self.begin_class_init(id, &sel.class_name)
        {
            return;
        }

        let consumed = method.consumed_slots as usize;
        if !method.is_static {
            let ctx = self.contexts.get_mut(&id).expect("dead context");
            if ctx.stack.read(consumed) == Value::Null {
                self.raise_null(id, "invoke on null receiver");
                return;
            }
        }

        let lock_object = if method.is_synchronized {
            Some(if method.is_static {
                self.runtime.class_object(&sel.class_name)
            } else {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.stack
                    .read(consumed)
                    .as_reference()
                    .expect("receiver checked above")
            })
        } else {
            None
        };

        self.push_frame(id, method);

        if let Some(obj) = lock_object {
            // the callee holds this monitor for its whole activation; if
            // the monitor is contended the context pauses here and resumes
            // inside the callee once the lock is granted
            let ctx = self.contexts.get_mut(&id).expect("dead context");
            ctx.current_mut().lock_object = Some(obj);
            self.monitor_enter(id, obj);
        }
    }

    fn dispatch_native(&mut self, id: ContextId, sel: &MethodSel, native: NativeFn) {
        debug!(ctx = id.0, native = %sel.impl_key(), "native dispatch");
        let outcome = {
            let mut host = VmHost { vm: self, ctx: id };
            native(&mut host)
        };
        match outcome {
            Ok(NativeOutcome::Void) => {}
            Ok(NativeOutcome::Return(value)) => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.stack.push(value);
            }
            Ok(NativeOutcome::ReturnWide(value)) => {
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.stack.push_wide(value);
            }
            Err(err) => self.raise_guest(id, err),
        }
    }

    /// Return from the current frame, releasing a synchronized method's
    /// monitor first.
    fn return_from(&mut self, id: ContextId, value: Option<Value>) {
        let lock_object = self.contexts.get(&id).expect("dead context").current().lock_object;
        if let Some(obj) = lock_object {
            if !self.monitor_exit(id, obj) {
                return; // raise frame pushed instead
            }
        }
        self.pop_frame(id, value);
    }

    /// Begin class initialization: rewind the triggering instruction and
    /// push the synthetic init frame. Returns false (and marks the class)
    /// when the class has no static initializer.
    fn begin_class_init(&mut self, id: ContextId, class_name: &str) -> bool {
        let clinit = MethodSel::new(class_name, "<clinit>", "()V");
        if !self.runtime.has_method(&clinit) {
            self.runtime.mark_initialized(class_name);
            return false;
        }
        debug!(ctx = id.0, class = class_name, "class init");
        let class_obj = self.runtime.class_object(class_name);
        let ctx = self.contexts.get_mut(&id).expect("dead context");
        let frame = ctx.current_mut();
        frame.pc = frame.op_pc;
        ctx.stack.push(Value::Reference(class_obj));
        self.push_frame(id, Rc::new(synthetic::class_init_method(class_name)));
        true
    }

    /// Deliver a guest error as a guest exception via a synthetic raise
    /// frame.
    pub(crate) fn raise_guest(&mut self, id: ContextId, err: GuestError) {
        self.raise_exception(id, err.class_name(), &err.message);
    }

    fn raise_null(&mut self, id: ContextId, message: &str) {
        self.raise_guest(id, GuestError::new(GuestErrorKind::NullPointer, message));
    }

    /// Raise a guest exception of `class_name`: allocate the exception
    /// object, attach the detail message, and push a synthetic frame that
    /// throws it through the normal unwinding machinery.
    pub fn raise_exception(&mut self, id: ContextId, class_name: &str, message: &str) {
        warn!(ctx = id.0, class = class_name, message, "raising guest exception");
        let obj = self.runtime.heap.alloc_object(class_name);
        if !message.is_empty() {
            self.runtime.heap.set_detail(obj, message);
        }
        let ctx = self.contexts.get_mut(&id).expect("dead context");
        ctx.stack.push(Value::Reference(obj));
        self.push_frame(id, Rc::new(synthetic::raise_method(class_name)));
    }

    /// Unwind for a thrown object: walk frames top-down looking for a
    /// matching handler; pop (and release held monitors of) frames that
    /// have none. Reaching the sentinel terminates the thread and nothing
    /// else.
    fn throw_object(&mut self, id: ContextId, obj: ObjectRef) {
        let class_name = self.runtime.heap.get(obj).class_name.clone();
        debug!(ctx = id.0, class = %class_name, "guest exception unwinding");
        loop {
            let ctx = self.contexts.get(&id).expect("dead context");
            if ctx.at_sentinel() {
                let detail = self.runtime.heap.get(obj).detail.clone();
                error!(
                    ctx = id.0,
                    class = %class_name,
                    detail = detail.as_deref().unwrap_or(""),
                    "uncaught exception, terminating thread"
                );
                self.contexts.get_mut(&id).expect("dead context").stop();
                return;
            }
            let frame = ctx.current();
            if let Some(handler_pc) = find_handler(frame.method(), frame.op_pc, &class_name) {
                let operand_base = frame.operand_base;
                let ctx = self.contexts.get_mut(&id).expect("dead context");
                ctx.stack.truncate(operand_base);
                ctx.stack.push(Value::Reference(obj));
                ctx.current_mut().pc = handler_pc;
                return;
            }
            let lock_object = frame.lock_object;
            if let Some(lock_obj) = lock_object {
                self.force_monitor_exit(id, lock_obj);
            }
            self.pop_frame(id, None);
        }
    }

    /// Monitor release during unwinding: a frame that somehow no longer
    /// holds its monitor is logged, not raised - we are already delivering
    /// an exception.
    fn force_monitor_exit(&mut self, id: ContextId, obj: ObjectRef) {
        let held = matches!(
            self.monitor(obj),
            Some(monitor) if monitor.owner() == Some(id) && monitor.level() > 0
        );
        if held {
            self.monitor_exit(id, obj);
        } else {
            warn!(ctx = id.0, obj = obj.0, "unwound frame's monitor was not held");
        }
    }
}

/// First handler of `method` covering `op_pc` that matches the thrown
/// class (exact name, or catch-all).
fn find_handler(method: &MethodInfo, op_pc: usize, class_name: &str) -> Option<usize> {
    method
        .code
        .handlers
        .iter()
        .find(|h| {
            (h.start as usize) <= op_pc
                && op_pc < (h.end as usize)
                && h.class_name.as_deref().is_none_or(|c| c == class_name)
        })
        .map(|h| h.handler as usize)
}
