//! Natives for `java/lang/System`.

use bytecode_system::MethodSel;
use core_types::{GuestError, Value};

use crate::host::{HostContext, NativeOutcome};
use crate::registry::NativeRegistry;

/// Register the System natives.
pub fn register(registry: &mut NativeRegistry) {
    registry.register(
        MethodSel::new("java/lang/System", "currentTimeMillis", "()J"),
        current_time_millis,
    );
}

fn current_time_millis(_ctx: &mut dyn HostContext) -> Result<NativeOutcome, GuestError> {
    let now = chrono::Utc::now().timestamp_millis();
    Ok(NativeOutcome::ReturnWide(Value::Long(now)))
}
