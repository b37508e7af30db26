//! Native method dispatch for the Ferrite VM.
//!
//! Natives are host functions keyed by (class, method name, signature).
//! They pop their own arguments from the caller's operand stack, do
//! host-side work through the [`HostContext`] capability trait, and either
//! return a value synchronously or pause the calling context after
//! arranging a later resume (sleeps, waits).
//!
//! The default set covers the thread and monitor entry points of the
//! runtime library: `Object.wait/notify/notifyAll/hashCode`,
//! `Thread.yield/sleep/start/currentThread`, `System.currentTimeMillis`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod host;
pub mod object;
pub mod registry;
pub mod system;
pub mod thread;

// Re-export main types at crate root
pub use host::{HostContext, NativeOutcome};
pub use registry::{NativeFn, NativeRegistry};
