//! Runtime services the execution core calls into.
//!
//! The runtime bundles the collaborators the core consumes as abstract
//! services: the heap, the class/method provider, the lazily-allocated
//! per-class class objects, and the class-initialization state table.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use bytecode_system::{MethodInfo, MethodProvider, MethodSel};
use core_types::{GuestError, ObjectRef};
use memory_manager::Heap;

use crate::context::ContextId;

/// Shared runtime services: allocation, class/method lookup, class-init
/// bookkeeping.
pub struct Runtime {
    /// The object heap
    pub heap: Heap,
    provider: Box<dyn MethodProvider>,
    class_objects: HashMap<String, ObjectRef>,
    initialized: HashSet<String>,
    initializing: HashMap<String, ContextId>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("heap_objects", &self.heap.len())
            .field("classes_initialized", &self.initialized.len())
            .finish()
    }
}

impl Runtime {
    /// Create a runtime over the given class/method provider.
    pub fn new(provider: Box<dyn MethodProvider>) -> Self {
        Self {
            heap: Heap::new(),
            provider,
            class_objects: HashMap::new(),
            initialized: HashSet::new(),
            initializing: HashMap::new(),
        }
    }

    /// Resolve a method selector through the provider.
    pub fn lookup(&self, sel: &MethodSel) -> Result<Rc<MethodInfo>, GuestError> {
        self.provider.lookup(sel)
    }

    /// Returns true if a lookup for the selector would succeed.
    pub fn has_method(&self, sel: &MethodSel) -> bool {
        self.provider.has_method(sel)
    }

    /// The class object for a class, allocated on first use.
    ///
    /// Class objects are what class-init frames and static synchronized
    /// methods lock on.
    pub fn class_object(&mut self, class_name: &str) -> ObjectRef {
        if let Some(&obj) = self.class_objects.get(class_name) {
            return obj;
        }
        let obj = self.heap.alloc_object("java/lang/Class");
        self.heap.set_detail(obj, class_name);
        self.class_objects.insert(class_name.to_string(), obj);
        obj
    }

    /// Returns true once class initialization has completed.
    pub fn is_initialized(&self, class_name: &str) -> bool {
        self.initialized.contains(class_name)
    }

    /// Record that class initialization has completed.
    pub fn mark_initialized(&mut self, class_name: &str) {
        self.initialized.insert(class_name.to_string());
    }

    /// The context currently running the class's `<clinit>`, if any.
    pub fn initializer(&self, class_name: &str) -> Option<ContextId> {
        self.initializing.get(class_name).copied()
    }

    /// Record which context is running the class's `<clinit>`.
    pub fn set_initializer(&mut self, class_name: &str, ctx: ContextId) {
        self.initializing.insert(class_name.to_string(), ctx);
    }

    /// Forget the class's in-progress initializer.
    pub fn clear_initializer(&mut self, class_name: &str) {
        self.initializing.remove(class_name);
    }
}
