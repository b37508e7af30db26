//! Ferrite VM host harness
//!
//! The execution core has no CLI surface of its own; this crate is the
//! embedding host. It assembles the built-in demo programs, constructs the
//! initial context, and drives the scheduler until no contexts remain.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod harness;

pub use cli::Cli;
pub use error::{CliError, CliResult};
pub use harness::{demo_names, run_demo};
