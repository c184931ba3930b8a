//! Error types for quon parsing and binding.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using [`QuonError`].
pub type Result<T> = std::result::Result<T, QuonError>;

/// Error types for quon parsing and binding.
///
/// Every variant here is fatal to the call that produced it. Recoverable
/// resolution failures are reported as [`Diagnostic`] values attached to
/// unresolved nodes in the bound tree instead.
#[derive(Debug, Error)]
pub enum QuonError {
    /// The query option text does not match the grammar. No partial tree
    /// is produced.
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    /// A configured depth or term limit was exceeded while parsing or
    /// binding. The primary defense against adversarial input.
    #[error("Recursion limit exceeded: the limit is {limit}")]
    RecursionLimitExceeded { limit: u32 },

    /// A literal could not be converted to its expected type.
    #[error("Literal type mismatch: expected {expected}, got {actual}")]
    LiteralTypeMismatch { expected: String, actual: String },

    /// A null literal was supplied for a non-nullable type.
    #[error("The null value is not allowed for the non-nullable type {type_name}")]
    NullNotAllowed { type_name: String },

    /// Operand or clause types are incompatible in a way the binder cannot
    /// defer (e.g. a non-Boolean `$filter` root).
    #[error("Type error: expected {expected}, got {actual}")]
    TypeError { expected: String, actual: String },

    /// Metadata model misuse (duplicate type names, unknown navigation
    /// targets) detected while building a model.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// An implementation defect. Never caused by user input.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A deferred, recoverable binding failure.
///
/// Diagnostics attach to unresolved nodes rather than aborting the bind, so
/// one call can surface multiple independent problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Byte offset of the offending token within the query option text,
    /// when known.
    pub location: Option<usize>,
    /// What kind of resolution failed.
    pub kind: DiagnosticKind,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic with a source location.
    #[must_use]
    pub fn at(location: usize, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            location: Some(location),
            kind,
            message: message.into(),
        }
    }

    /// Creates a diagnostic without a source location.
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            location: None,
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location {
            Some(pos) => write!(f, "{:?} at position {pos}: {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Kinds of deferred binding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// An identifier did not resolve to a structural or navigation property.
    PropertyNotFound,
    /// A function name did not resolve to a built-in or model operation.
    FunctionNotFound,
    /// A `$`-prefixed name did not resolve to a range variable in scope.
    RangeVariableNotFound,
    /// A path continued past a segment that cannot be traversed.
    InvalidPathSegment,
    /// Any other unresolved element (e.g. an unknown parameter alias).
    UnresolvedElement,
}
