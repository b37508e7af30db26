//! Natives for `java/lang/Thread`: cooperative yield, timed sleep, and
//! thread start.

use bytecode_system::MethodSel;
use core_types::{GuestError, GuestErrorKind, Value};

use crate::host::{HostContext, NativeOutcome};
use crate::registry::NativeRegistry;

/// Register the Thread natives.
pub fn register(registry: &mut NativeRegistry) {
    registry.register(MethodSel::new("java/lang/Thread", "yield", "()V"), yield_);
    registry.register(MethodSel::new("java/lang/Thread", "sleep", "(J)V"), sleep);
    registry.register(MethodSel::new("java/lang/Thread", "start", "()V"), start);
    registry.register(
        MethodSel::new("java/lang/Thread", "currentThread", "()Ljava/lang/Thread;"),
        current_thread,
    );
}

fn yield_(ctx: &mut dyn HostContext) -> Result<NativeOutcome, GuestError> {
    ctx.yield_current();
    Ok(NativeOutcome::Void)
}

fn sleep(ctx: &mut dyn HostContext) -> Result<NativeOutcome, GuestError> {
    let ms = ctx
        .stack()
        .pop_wide()
        .as_long()
        .expect("sleep duration is a long");
    if ms < 0 {
        return Err(GuestError::new(
            GuestErrorKind::IllegalArgument,
            "sleep duration is negative",
        ));
    }
    ctx.sleep_current(ms as u64);
    Ok(NativeOutcome::Void)
}

fn start(ctx: &mut dyn HostContext) -> Result<NativeOutcome, GuestError> {
    let receiver = ctx
        .stack()
        .pop()
        .as_reference()
        .ok_or_else(|| GuestError::new(GuestErrorKind::NullPointer, "start on null"))?;
    ctx.spawn_thread(receiver);
    Ok(NativeOutcome::Void)
}

fn current_thread(ctx: &mut dyn HostContext) -> Result<NativeOutcome, GuestError> {
    let value = match ctx.current_thread_object() {
        Some(obj) => Value::Reference(obj),
        None => Value::Null,
    };
    Ok(NativeOutcome::Return(value))
}
