//! Heap allocation and handle resolution.

use core_types::{Kind, ObjectRef, Value};

use crate::object::{HeapObject, ObjectBody};

/// Allocation statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Total objects allocated over the heap's lifetime
    pub objects_allocated: u64,
    /// Total array elements allocated
    pub elements_allocated: u64,
}

/// The heap: handle-indexed object storage.
///
/// Handles are dense indices; resolving a handle that was never issued is a
/// host-level programming error and traps.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
    stats: AllocStats,
}

impl Heap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, object: HeapObject) -> ObjectRef {
        let handle = ObjectRef(self.objects.len() as u32);
        self.objects.push(object);
        self.stats.objects_allocated += 1;
        handle
    }

    /// Allocate a plain instance of the named class.
    pub fn alloc_object(&mut self, class_name: impl Into<String>) -> ObjectRef {
        self.insert(HeapObject {
            class_name: class_name.into(),
            body: ObjectBody::Instance,
            detail: None,
        })
    }

    /// Allocate a guest string.
    pub fn alloc_string(&mut self, value: impl Into<String>) -> ObjectRef {
        self.insert(HeapObject {
            class_name: "java/lang/String".to_string(),
            body: ObjectBody::StringData(value.into()),
            detail: None,
        })
    }

    /// Allocate a primitive array of `length` zero elements.
    pub fn alloc_primitive_array(&mut self, kind: Kind, length: usize) -> ObjectRef {
        let zero = match kind {
            Kind::Int => Value::Int(0),
            Kind::Long => Value::Long(0),
            Kind::Float => Value::Float(0.0),
            Kind::Double => Value::Double(0.0),
            Kind::Reference => Value::Null,
        };
        self.stats.elements_allocated += length as u64;
        self.insert(HeapObject {
            class_name: primitive_array_class(kind).to_string(),
            body: ObjectBody::PrimitiveArray {
                kind,
                data: vec![zero; length],
            },
            detail: None,
        })
    }

    /// Allocate a reference array of `length` null elements.
    pub fn alloc_ref_array(&mut self, class_name: impl Into<String>, length: usize) -> ObjectRef {
        self.stats.elements_allocated += length as u64;
        self.insert(HeapObject {
            class_name: class_name.into(),
            body: ObjectBody::RefArray {
                data: vec![Value::Null; length],
            },
            detail: None,
        })
    }

    /// Allocate a rectangular multi-dimensional reference array.
    ///
    /// `dims` must be non-empty; each level is a reference array whose
    /// elements are the next level's arrays.
    pub fn alloc_multi_array(&mut self, class_name: &str, dims: &[usize]) -> ObjectRef {
        assert!(!dims.is_empty(), "multi-array needs at least one dimension");
        if dims.len() == 1 {
            return self.alloc_ref_array(class_name, dims[0]);
        }
        let outer = self.alloc_ref_array(class_name, dims[0]);
        for i in 0..dims[0] {
            let inner = self.alloc_multi_array(class_name, &dims[1..]);
            self.get_mut(outer).array_set(i, Value::Reference(inner));
        }
        outer
    }

    /// Resolve a handle to its object.
    pub fn get(&self, handle: ObjectRef) -> &HeapObject {
        &self.objects[handle.0 as usize]
    }

    /// Resolve a handle to its object, mutably.
    pub fn get_mut(&mut self, handle: ObjectRef) -> &mut HeapObject {
        &mut self.objects[handle.0 as usize]
    }

    /// Attach a detail message to an object (exception diagnostics).
    pub fn set_detail(&mut self, handle: ObjectRef, detail: impl Into<String>) {
        self.get_mut(handle).detail = Some(detail.into());
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Allocation statistics.
    pub fn stats(&self) -> AllocStats {
        self.stats
    }
}

fn primitive_array_class(kind: Kind) -> &'static str {
    match kind {
        Kind::Int => "[I",
        Kind::Long => "[J",
        Kind::Float => "[F",
        Kind::Double => "[D",
        Kind::Reference => "[Ljava/lang/Object;",
    }
}
