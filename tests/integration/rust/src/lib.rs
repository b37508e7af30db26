//! Cross-component integration test helpers for the Ferrite VM workspace.

use bytecode_system::{CodeChunk, MethodInfo, MethodSel, MethodTable};

/// Register a static method of class `T` with the given shape.
pub fn static_method(
    table: &mut MethodTable,
    name: &str,
    consumed: u16,
    locals: u16,
    ret: u8,
    code: CodeChunk,
) -> MethodSel {
    table.register(
        MethodInfo::new("T", name, "()")
            .with_static(true)
            .with_consumed_slots(consumed)
            .with_locals_size(locals)
            .with_return_width(ret)
            .with_code(code),
    )
}
