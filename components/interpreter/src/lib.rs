//! Execution core of the Ferrite VM.
//!
//! This crate implements the per-thread call-frame machine, the cooperative
//! yield/pause/resume scheduling protocol, and the object-monitor
//! (wait/notify) subsystem:
//! - [`Frame`] - one method activation, pooled for reuse
//! - [`Context`] - one logical thread: frame stack plus run-state machine
//! - [`Vm`] - composes the runtime services, the scheduler queues, the
//!   monitor table, and the interpreter loop
//! - [`Instrument`] - optional frame enter/exit and pause/resume observers
//!
//! Concurrency is interleaving, not parallelism: exactly one context's
//! interpreter loop runs at any instant, so no locking exists anywhere in
//! the core. Monitors model guest-level contention only.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{CodeChunk, Constant, MethodInfo, MethodTable, Opcode};
//! use core_types::Value;
//! use interpreter::Vm;
//!
//! let mut chunk = CodeChunk::new();
//! let c = chunk.add_constant(Constant::Int(41));
//! chunk.emit(Opcode::LoadConstant(c));
//! chunk.emit(Opcode::ReturnValue);
//!
//! let mut table = MethodTable::new();
//! let sel = table.register(
//!     MethodInfo::new("Demo", "answer", "()I")
//!         .with_static(true)
//!         .with_return_width(1)
//!         .with_code(chunk),
//! );
//!
//! let mut vm = Vm::new(Box::new(table));
//! let ctx = vm.spawn(&sel, &[]).unwrap();
//! vm.run();
//! assert_eq!(vm.active_count(), 0);
//! # let _ = ctx;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod dispatch;
pub mod frame;
pub mod instrument;
pub mod monitor;
pub mod runtime;
pub mod synthetic;
pub mod vm;

// Re-export main types at crate root
pub use context::{Context, ContextId, RunState, NORMAL_PRIORITY};
pub use frame::{Frame, FramePool};
pub use instrument::{Instrument, MethodProfiler, NullInstrument, SharedProfiler};
pub use monitor::Monitor;
pub use runtime::Runtime;
pub use vm::Vm;
