//! Guest-level error taxonomy.
//!
//! These errors are surfaced to the guest program as exceptions: the core
//! maps each kind to a guest exception class and delivers it by pushing a
//! synthetic raise frame. They are never host-level failures; host invariant
//! violations trap via assertions instead.

use std::fmt;

/// The kind of guest error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestErrorKind {
    /// Monitor operation by a context that does not hold the lock
    IllegalMonitorState,
    /// Invalid argument (e.g. negative wait timeout)
    IllegalArgument,
    /// Class lookup failed in the class provider
    ClassNotFound,
    /// Method lookup failed in the class provider
    NoSuchMethod,
    /// Operation on a null reference
    NullPointer,
    /// Array access outside bounds
    ArrayIndexOutOfBounds,
    /// Unrecoverable guest-thread condition (e.g. missing native)
    Runtime,
}

impl GuestErrorKind {
    /// The guest exception class this kind is delivered as.
    pub fn class_name(self) -> &'static str {
        match self {
            GuestErrorKind::IllegalMonitorState => "java/lang/IllegalMonitorStateException",
            GuestErrorKind::IllegalArgument => "java/lang/IllegalArgumentException",
            GuestErrorKind::ClassNotFound => "java/lang/ClassNotFoundException",
            GuestErrorKind::NoSuchMethod => "java/lang/NoSuchMethodError",
            GuestErrorKind::NullPointer => "java/lang/NullPointerException",
            GuestErrorKind::ArrayIndexOutOfBounds => "java/lang/ArrayIndexOutOfBoundsException",
            GuestErrorKind::Runtime => "java/lang/RuntimeException",
        }
    }
}

/// A guest error with its kind and detail message.
///
/// # Examples
///
/// ```
/// use core_types::{GuestError, GuestErrorKind};
///
/// let err = GuestError::new(GuestErrorKind::IllegalArgument, "timeout is negative");
/// assert_eq!(err.kind, GuestErrorKind::IllegalArgument);
/// assert_eq!(err.class_name(), "java/lang/IllegalArgumentException");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestError {
    /// The kind of error
    pub kind: GuestErrorKind,
    /// Detail message attached to the guest exception
    pub message: String,
}

impl GuestError {
    /// Create a new guest error.
    pub fn new(kind: GuestErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The guest exception class this error is delivered as.
    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }
}

impl fmt::Display for GuestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.class_name())
        } else {
            write!(f, "{}: {}", self.class_name(), self.message)
        }
    }
}

impl std::error::Error for GuestError {}
