//! Natives for `java/lang/Object`: the monitor wait/notify surface and
//! identity hashing.

use bytecode_system::MethodSel;
use core_types::{GuestError, GuestErrorKind, ObjectRef, Value};

use crate::host::{HostContext, NativeOutcome};
use crate::registry::NativeRegistry;

/// Register the Object natives.
pub fn register(registry: &mut NativeRegistry) {
    registry.register(MethodSel::new("java/lang/Object", "wait", "(J)V"), wait);
    registry.register(MethodSel::new("java/lang/Object", "notify", "()V"), notify);
    registry.register(
        MethodSel::new("java/lang/Object", "notifyAll", "()V"),
        notify_all,
    );
    registry.register(
        MethodSel::new("java/lang/Object", "hashCode", "()I"),
        hash_code,
    );
}

fn wait(ctx: &mut dyn HostContext) -> Result<NativeOutcome, GuestError> {
    let timeout = ctx
        .stack()
        .pop_wide()
        .as_long()
        .expect("wait timeout is a long");
    let receiver = pop_receiver(ctx, "wait on null")?;
    ctx.monitor_wait(receiver, timeout);
    Ok(NativeOutcome::Void)
}

fn notify(ctx: &mut dyn HostContext) -> Result<NativeOutcome, GuestError> {
    let receiver = pop_receiver(ctx, "notify on null")?;
    ctx.monitor_notify(receiver, false);
    Ok(NativeOutcome::Void)
}

fn notify_all(ctx: &mut dyn HostContext) -> Result<NativeOutcome, GuestError> {
    let receiver = pop_receiver(ctx, "notifyAll on null")?;
    ctx.monitor_notify(receiver, true);
    Ok(NativeOutcome::Void)
}

fn hash_code(ctx: &mut dyn HostContext) -> Result<NativeOutcome, GuestError> {
    let receiver = pop_receiver(ctx, "hashCode on null")?;
    // identity hash: the handle is stable for the object's lifetime
    Ok(NativeOutcome::Return(Value::Int(receiver.0 as i32)))
}

fn pop_receiver(ctx: &mut dyn HostContext, message: &str) -> Result<ObjectRef, GuestError> {
    ctx.stack()
        .pop()
        .as_reference()
        .ok_or_else(|| GuestError::new(GuestErrorKind::NullPointer, message))
}
