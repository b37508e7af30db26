//! Memory manager - heap allocation for the Ferrite VM.
//!
//! This component provides the allocation interface the execution core
//! consumes: instances, strings, primitive/reference arrays, and
//! rectangular multi-dimensional arrays, all addressed through opaque
//! [`core_types::ObjectRef`] handles.
//!
//! Collection strategy is out of scope here; the heap only grows and keeps
//! allocation statistics. The handle-based interface is what a collector
//! would sit behind.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod heap;
pub mod object;

// Re-export main types
pub use heap::{AllocStats, Heap};
pub use object::{HeapObject, ObjectBody};
