//! The native dispatch table.

use std::collections::HashMap;

use bytecode_system::MethodSel;
use core_types::GuestError;
use tracing::trace;

use crate::host::{HostContext, NativeOutcome};
use crate::{object, system, thread};

/// A native implementation: pops its arguments from the operand stack and
/// performs host-side work through the context's capabilities.
pub type NativeFn = fn(&mut dyn HostContext) -> Result<NativeOutcome, GuestError>;

/// Dispatch table keyed by (class, method name, signature).
#[derive(Default)]
pub struct NativeRegistry {
    table: HashMap<MethodSel, NativeFn>,
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("entries", &self.table.len())
            .finish()
    }
}

impl NativeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry populated with the default runtime natives.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        object::register(&mut registry);
        thread::register(&mut registry);
        system::register(&mut registry);
        registry
    }

    /// Register a native; replaces any previous entry for the selector.
    pub fn register(&mut self, sel: MethodSel, f: NativeFn) {
        trace!(native = %sel.impl_key(), "native registered");
        self.table.insert(sel, f);
    }

    /// Look up the native for a selector.
    pub fn lookup(&self, sel: &MethodSel) -> Option<NativeFn> {
        self.table.get(sel).copied()
    }

    /// Returns true if the selector has a native implementation.
    pub fn contains(&self, sel: &MethodSel) -> bool {
        self.table.contains_key(sel)
    }

    /// Number of registered natives.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no natives are registered.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
