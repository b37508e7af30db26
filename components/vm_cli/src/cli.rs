//! Command-line argument definitions.

use clap::Parser;

/// Host harness for the Ferrite VM.
#[derive(Debug, Parser)]
#[command(name = "ferrite-vm", version, about = "Ferrite VM demo harness")]
pub struct Cli {
    /// Demo program to run
    #[arg(long)]
    pub demo: Option<String>,

    /// List available demo programs
    #[arg(long)]
    pub list: bool,

    /// Print a per-method cost profile after the run
    #[arg(long)]
    pub profile: bool,

    /// Instructions per execution slice before a forced yield
    #[arg(long, default_value_t = 10_000)]
    pub step_budget: usize,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
