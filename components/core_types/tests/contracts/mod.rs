//! Contract tests for core types
//!
//! These tests verify the public API matches the contract specification.

use core_types::{GuestError, GuestErrorKind, Value, ValueStack};

/// Two-slot push/pop round-trips for any wide value, and the stack length
/// changes by exactly 2.
#[test]
fn test_two_slot_round_trip_contract() {
    let samples = [
        Value::Long(0),
        Value::Long(i64::MIN),
        Value::Long(i64::MAX),
        Value::Double(0.0),
        Value::Double(-1.25e300),
    ];
    for v in samples {
        let mut stack = ValueStack::new();
        stack.push(Value::Int(99)); // unrelated slot below
        let before = stack.len();
        stack.push_wide(v);
        assert_eq!(stack.len(), before + 2);
        assert_eq!(stack.pop_wide(), v);
        assert_eq!(stack.len(), before);
    }
}

/// read(i) peeks the i-th slot from the top, 1-based, without popping.
#[test]
fn test_read_contract() {
    let mut stack = ValueStack::new();
    stack.push(Value::Int(1));
    stack.push(Value::Int(2));
    stack.push(Value::Int(3));
    assert_eq!(stack.read(1), Value::Int(3));
    assert_eq!(stack.read(3), Value::Int(1));
    assert_eq!(stack.len(), 3);
}

/// Every guest error kind maps to a stable guest exception class name.
#[test]
fn test_error_class_mapping_contract() {
    let kinds = [
        GuestErrorKind::IllegalMonitorState,
        GuestErrorKind::IllegalArgument,
        GuestErrorKind::ClassNotFound,
        GuestErrorKind::NoSuchMethod,
        GuestErrorKind::NullPointer,
        GuestErrorKind::ArrayIndexOutOfBounds,
        GuestErrorKind::Runtime,
    ];
    for kind in kinds {
        let err = GuestError::new(kind, "");
        assert!(err.class_name().starts_with("java/lang/"));
    }
}
