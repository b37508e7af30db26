//! Bytecode system for the Ferrite VM.
//!
//! This crate defines what the interpreter executes:
//! - [`Opcode`] - the structured instruction set
//! - [`CodeChunk`] - compiled method body: instructions, constant pool,
//!   method/class selector pools, exception table
//! - [`MethodInfo`] - method descriptor: argument slots, locals size,
//!   static/synchronized/native flags, return width
//! - [`MethodProvider`] - the class/method lookup boundary, with the
//!   table-backed [`MethodTable`] implementation for hosts and tests
//!
//! The instruction set is deliberately small and structured; it is not a
//! byte-encoded format. Branch targets are absolute instruction indices.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{CodeChunk, Constant, MethodInfo, Opcode};
//!
//! let mut chunk = CodeChunk::new();
//! let c = chunk.add_constant(Constant::Int(42));
//! chunk.emit(Opcode::LoadConstant(c));
//! chunk.emit(Opcode::ReturnValue);
//!
//! let method = MethodInfo::new("Demo", "answer", "()I")
//!     .with_static(true)
//!     .with_return_width(1)
//!     .with_code(chunk);
//! assert_eq!(method.impl_key(), "Demo.answer.()I");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod method;
pub mod opcode;

// Re-export main types at crate root
pub use chunk::{CodeChunk, Constant, ExceptionHandler};
pub use method::{MethodInfo, MethodProvider, MethodSel, MethodTable};
pub use opcode::Opcode;
