//! Synthetic micro-programs.
//!
//! Bootstrap operations (class init, exception raise, thread entry) reuse
//! the one interpreter loop instead of growing host-side special cases:
//! each fabricates a minimal method descriptor around a short fixed
//! instruction sequence and runs as an ordinary frame. This is the complete
//! table; it is not a code generator.

use bytecode_system::{CodeChunk, MethodInfo, MethodSel, Opcode};

/// Class-initialization shim for `class_name`.
///
/// Consumes the class object (pushed by the caller) and runs, under the
/// class object's monitor so concurrent initializers serialize:
///
/// ```text
///   LoadLocal(0); MonitorEnter; Invoke(<clinit>); LoadLocal(0);
///   MonitorExit; Return
/// ```
///
/// The `<clinit>` invoke is a no-op when initialization already began (see
/// the dispatcher), so the context that loses the monitor race skips the
/// initializer instead of re-running it.
pub fn class_init_method(class_name: &str) -> MethodInfo {
    let mut code = CodeChunk::new();
    let clinit = code.add_method_ref(MethodSel::new(class_name, "<clinit>", "()V"));
    code.emit(Opcode::LoadLocal(0));
    code.emit(Opcode::MonitorEnter);
    code.emit(Opcode::Invoke(clinit));
    code.emit(Opcode::LoadLocal(0));
    code.emit(Opcode::MonitorExit);
    code.emit(Opcode::Return);
    MethodInfo::new(class_name, "$classInit", "()V")
        .with_static(true)
        .with_consumed_slots(1)
        .with_code(code)
}

/// Exception-raise shim for `class_name`.
///
/// Consumes the already-allocated exception object (the raise path
/// allocates it and attaches the detail message) and throws it through the
/// normal unwinding machinery:
///
/// ```text
///   LoadLocal(0); Throw
/// ```
pub fn raise_method(class_name: &str) -> MethodInfo {
    let mut code = CodeChunk::new();
    code.emit(Opcode::LoadLocal(0));
    code.emit(Opcode::Throw);
    MethodInfo::new(class_name, "$raise", "()V")
        .with_static(true)
        .with_consumed_slots(1)
        .with_code(code)
}

/// Thread-entry shim for a thread object of `class_name`.
///
/// Consumes the thread object and invokes its `run()` method; when `run`
/// returns, the shim returns and the context reaches its sentinel:
///
/// ```text
///   LoadLocal(0); Invoke(run); Return
/// ```
pub fn thread_entry_method(class_name: &str) -> MethodInfo {
    let mut code = CodeChunk::new();
    let run = code.add_method_ref(MethodSel::new(class_name, "run", "()V"));
    code.emit(Opcode::LoadLocal(0));
    code.emit(Opcode::Invoke(run));
    code.emit(Opcode::Return);
    MethodInfo::new(class_name, "$threadEntry", "()V")
        .with_static(true)
        .with_consumed_slots(1)
        .with_code(code)
}
