//! Ferrite VM harness entry point.
//!
//! Parses CLI arguments, installs the tracing subscriber, and runs the
//! selected demo program.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vm_cli::{demo_names, run_demo, Cli};

fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if cli.list {
        println!("Available demos:");
        for name in demo_names() {
            println!("  {name}");
        }
        return;
    }

    let Some(demo) = cli.demo else {
        println!("Ferrite VM demo harness");
        println!();
        println!("Usage:");
        println!("  ferrite-vm --demo <NAME>    Run a demo program");
        println!("  ferrite-vm --list           List available demos");
        println!();
        println!("Run 'ferrite-vm --help' for more options.");
        return;
    };

    if let Err(err) = run_demo(&demo, cli.step_budget, cli.profile) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
