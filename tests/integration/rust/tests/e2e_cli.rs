//! End-to-end runs of the harness demo programs.

use vm_cli::{demo_names, run_demo, CliError};

#[test]
fn test_every_demo_completes() {
    for name in demo_names() {
        run_demo(name, 10_000, false).unwrap_or_else(|err| panic!("demo {name} failed: {err}"));
    }
}

#[test]
fn test_demos_complete_under_tiny_step_budget() {
    // heavy interleaving: every few instructions force a yield
    for name in demo_names() {
        run_demo(name, 16, false).unwrap_or_else(|err| panic!("demo {name} failed: {err}"));
    }
}

#[test]
fn test_unknown_demo_is_rejected() {
    assert!(matches!(
        run_demo("no-such-demo", 10_000, false),
        Err(CliError::UnknownDemo(_))
    ));
}
