//! Method descriptors and the class/method lookup boundary.
//!
//! The VM core never parses class files; it consumes method descriptors
//! through the [`MethodProvider`] trait. [`MethodTable`] is the table-backed
//! implementation hosts and tests populate directly, which also makes it
//! easy to synthesize minimal descriptors without a class-file format.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use core_types::{GuestError, GuestErrorKind};

use crate::chunk::CodeChunk;

/// A method selector: the (class, name, signature) triple used for lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSel {
    /// Class name, e.g. `java/lang/Object`
    pub class_name: String,
    /// Method name, e.g. `wait`
    pub name: String,
    /// Signature string, e.g. `(J)V`
    pub signature: String,
}

impl MethodSel {
    /// Create a new selector.
    pub fn new(
        class_name: impl Into<String>,
        name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            signature: signature.into(),
        }
    }

    /// The `Class.name.signature` key used for diagnostics and native lookup.
    pub fn impl_key(&self) -> String {
        format!("{}.{}.{}", self.class_name, self.name, self.signature)
    }
}

/// A method descriptor: everything the interpreter needs to push a frame.
///
/// `consumed_slots` counts the argument slots the caller's operand stack
/// supplies, including the receiver slot for instance methods and two slots
/// for each long/double argument. `locals_size` is the full locals window
/// (arguments first, then scratch slots).
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Owning class name
    pub class_name: String,
    /// Method name
    pub name: String,
    /// Signature string
    pub signature: String,
    /// Static methods take no receiver slot
    pub is_static: bool,
    /// Synchronized methods hold a monitor for their whole activation
    pub is_synchronized: bool,
    /// Native methods dispatch to the host instead of bytecode
    pub is_native: bool,
    /// Argument slots consumed from the caller's operand stack
    pub consumed_slots: u16,
    /// Total locals window size in slots (at least `consumed_slots`)
    pub locals_size: u16,
    /// Return value width in slots: 0, 1, or 2
    pub return_width: u8,
    /// Method body (empty for native methods)
    pub code: CodeChunk,
}

impl MethodInfo {
    /// Create a descriptor with empty code and zeroed shape; configure it
    /// through the `with_*` builders.
    pub fn new(
        class_name: impl Into<String>,
        name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            signature: signature.into(),
            is_static: false,
            is_synchronized: false,
            is_native: false,
            consumed_slots: 0,
            locals_size: 0,
            return_width: 0,
            code: CodeChunk::new(),
        }
    }

    /// Set the static flag.
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Set the synchronized flag.
    pub fn with_synchronized(mut self, is_synchronized: bool) -> Self {
        self.is_synchronized = is_synchronized;
        self
    }

    /// Mark the method as native.
    pub fn with_native(mut self, is_native: bool) -> Self {
        self.is_native = is_native;
        self
    }

    /// Set consumed argument slots.
    pub fn with_consumed_slots(mut self, slots: u16) -> Self {
        self.consumed_slots = slots;
        if self.locals_size < slots {
            self.locals_size = slots;
        }
        self
    }

    /// Set the locals window size.
    pub fn with_locals_size(mut self, slots: u16) -> Self {
        self.locals_size = slots;
        self
    }

    /// Set the return value width (0, 1 or 2 slots).
    pub fn with_return_width(mut self, width: u8) -> Self {
        self.return_width = width;
        self
    }

    /// Attach the method body.
    pub fn with_code(mut self, code: CodeChunk) -> Self {
        self.code = code;
        self
    }

    /// The selector identifying this method.
    pub fn sel(&self) -> MethodSel {
        MethodSel::new(&self.class_name, &self.name, &self.signature)
    }

    /// The `Class.name.signature` diagnostic key.
    pub fn impl_key(&self) -> String {
        self.sel().impl_key()
    }
}

/// The class/method lookup boundary the interpreter resolves against.
pub trait MethodProvider {
    /// Resolve a selector to a method descriptor.
    ///
    /// Fails with `ClassNotFound` if the class is unknown and `NoSuchMethod`
    /// if the class exists but the method does not.
    fn lookup(&self, sel: &MethodSel) -> Result<Rc<MethodInfo>, GuestError>;

    /// Returns true if the provider knows the class.
    fn has_class(&self, class_name: &str) -> bool;

    /// Returns true if a lookup for the selector would succeed.
    fn has_method(&self, sel: &MethodSel) -> bool {
        self.lookup(sel).is_ok()
    }
}

/// Table-backed [`MethodProvider`] populated by the host or by tests.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: HashMap<MethodSel, Rc<MethodInfo>>,
    classes: HashSet<String>,
}

impl MethodTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class with no methods (e.g. an exception class).
    pub fn register_class(&mut self, class_name: impl Into<String>) {
        self.classes.insert(class_name.into());
    }

    /// Register a method; its class becomes known. Returns the selector.
    pub fn register(&mut self, method: MethodInfo) -> MethodSel {
        let sel = method.sel();
        self.classes.insert(method.class_name.clone());
        self.methods.insert(sel.clone(), Rc::new(method));
        sel
    }
}

impl MethodProvider for MethodTable {
    fn lookup(&self, sel: &MethodSel) -> Result<Rc<MethodInfo>, GuestError> {
        if !self.classes.contains(&sel.class_name) {
            return Err(GuestError::new(
                GuestErrorKind::ClassNotFound,
                sel.class_name.clone(),
            ));
        }
        self.methods
            .get(sel)
            .cloned()
            .ok_or_else(|| GuestError::new(GuestErrorKind::NoSuchMethod, sel.impl_key()))
    }

    fn has_class(&self, class_name: &str) -> bool {
        self.classes.contains(class_name)
    }
}
