//! Cooperative scheduling primitives for the Ferrite VM.
//!
//! This crate provides the two queues the execution driver runs on:
//! - [`RunQueue`] - FIFO queue of runnable items (contexts, by id)
//! - [`TimerQueue`] - virtual-clock timer queue for timed waits and sleeps
//!
//! The scheduler never inspects bytecode or context internals; it only
//! orders work. Timers use a virtual clock that only advances when the
//! driver asks for the next due timer, which keeps interleavings
//! deterministic under test.
//!
//! # Examples
//!
//! ```
//! use scheduler::{RunQueue, TimerQueue};
//!
//! let mut queue: RunQueue<u32> = RunQueue::new();
//! queue.enqueue(1);
//! queue.enqueue(2);
//! assert_eq!(queue.dequeue(), Some(1));
//!
//! let mut timers: TimerQueue<&str> = TimerQueue::new();
//! timers.schedule(10, "wake");
//! assert_eq!(timers.fire_next(), Some("wake"));
//! assert_eq!(timers.now_ms(), 10);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod run_queue;
pub mod timer;

// Re-export main types at crate root
pub use run_queue::RunQueue;
pub use timer::{TimerHandle, TimerQueue};
