//! Build diagnostics and the aggregated build failure.
//!
//! # Design
//!
//! - `SourceError`: one diagnostic with a primary location and optional
//!   secondary labels
//! - `ErrorKind`: categorizes diagnostics by the failure taxonomy
//! - `ReactorError`: what a failed build returns: every diagnostic collected
//!   in the failing phase, or one internal-consistency violation
//! - `DiagnosticFormatter`: renders diagnostics for terminals and logs
//!
//! # Examples
//!
//! ```
//! # use yang_reactor::error::*;
//! # use yang_model::SourceLocation;
//! let first = SourceLocation::new("m.yang", 3, 3);
//! let second = SourceLocation::new("m.yang", 6, 3);
//! let message = "typedef 't1' is already defined";
//! let error = SourceError::new(ErrorKind::DuplicateDefinition, second, message)
//!     .with_label(first, "first defined here");
//! assert_eq!(error.to_string(), "error: duplicate definition: typedef 't1' is already defined");
//! ```

use std::fmt;

use thiserror::Error;
use yang_model::SourceLocation;

use crate::phase::Phase;

/// Build diagnostic with source location and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    /// Category of this diagnostic
    pub kind: ErrorKind,
    /// Severity level
    pub severity: Severity,
    /// Primary source location
    pub location: SourceLocation,
    /// Primary message
    pub message: String,
    /// Related locations
    pub labels: Vec<Label>,
    /// Additional notes or hints
    pub notes: Vec<String>,
}

/// Category of build diagnostic.
///
/// # Invariant
///
/// The discriminant values must match the ERROR_KIND_NAMES array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// Raw argument failed typed parsing
    ArgumentSyntax = 0,
    /// Mandatory child missing, singular child duplicated, or child not allowed
    SubstatementValidation = 1,
    /// Inference action never became satisfiable
    UnresolvedReference = 2,
    /// Two distinct values bound to one non-overwritable key
    DuplicateDefinition = 3,
    /// Keyword without a registered statement support
    UnknownStatement = 4,
    /// Semantic rule violated by otherwise well-formed statements
    InvalidStatement = 5,
    /// Source could not produce its statement stream
    MissingSource = 6,
    /// Internal consistency violation (bug in the reactor or a plugin)
    Internal = 7,
}

/// Human-readable names for error kinds.
///
/// Index matches ErrorKind discriminant.
const ERROR_KIND_NAMES: &[&str] = &[
    "argument syntax error",         // 0: ArgumentSyntax
    "substatement validation error", // 1: SubstatementValidation
    "unresolved reference",          // 2: UnresolvedReference
    "duplicate definition",          // 3: DuplicateDefinition
    "unknown statement",             // 4: UnknownStatement
    "invalid statement",             // 5: InvalidStatement
    "missing source",                // 6: MissingSource
    "internal reactor error",        // 7: Internal
];

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

/// Secondary labeled location in a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub location: SourceLocation,
    pub message: String,
}

impl SourceError {
    /// Creates a new error diagnostic.
    pub fn new(kind: ErrorKind, location: SourceLocation, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Error, location, message.into())
    }

    /// Creates a new warning diagnostic.
    pub fn warning(kind: ErrorKind, location: SourceLocation, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Warning, location, message.into())
    }

    /// Internal consistency violation.
    pub fn internal(location: SourceLocation, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, location, message)
    }

    fn with_severity(
        kind: ErrorKind,
        severity: Severity,
        location: SourceLocation,
        message: String,
    ) -> Self {
        Self {
            kind,
            severity,
            location,
            message,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Adds a secondary labeled location.
    pub fn with_label(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.labels.push(Label {
            location,
            message: message.into(),
        });
        self
    }

    /// Adds a note or hint.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_internal(&self) -> bool {
        self.kind == ErrorKind::Internal
    }
}

impl ErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES[self as usize]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.kind.name(), self.message)
    }
}

impl std::error::Error for SourceError {}

/// Result type for single-statement operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Failure of a whole build.
///
/// Builds fail atomically: no partial model is returned. User-input errors
/// are collected until the end of the failing phase; internal violations
/// abort at once.
#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("build failed in phase {phase} with {} error(s)", .errors.len())]
    Failed { phase: Phase, errors: Vec<SourceError> },

    #[error("internal consistency violation: {0}")]
    Internal(SourceError),
}

impl ReactorError {
    /// Every diagnostic carried by this failure.
    pub fn errors(&self) -> &[SourceError] {
        match self {
            ReactorError::Failed { errors, .. } => errors,
            ReactorError::Internal(error) => std::slice::from_ref(error),
        }
    }

    /// Phase the build stopped in, if it failed on user input.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ReactorError::Failed { phase, .. } => Some(*phase),
            ReactorError::Internal(_) => None,
        }
    }

    /// Diagnostics of one kind.
    pub fn errors_of(&self, kind: ErrorKind) -> Vec<&SourceError> {
        self.errors().iter().filter(|error| error.kind == kind).collect()
    }
}

/// Formats diagnostics with their locations, labels and notes.
///
/// ```text
/// error: duplicate definition: typedef 't1' is already defined
///   --> m.yang:6:3
///   --> m.yang:3:3: first defined here
///    = note: ...
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticFormatter {
    skip_notes: bool,
}

impl DiagnosticFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formatter that leaves out notes.
    pub fn without_notes() -> Self {
        Self { skip_notes: true }
    }

    /// Formats one diagnostic.
    pub fn format(&self, error: &SourceError) -> String {
        let mut output = format!("{}: {}: {}\n", error.severity, error.kind.name(), error.message);
        output.push_str(&format!("  --> {}\n", error.location));
        for label in &error.labels {
            output.push_str(&format!("  --> {}: {}\n", label.location, label.message));
        }
        if !self.skip_notes {
            for note in &error.notes {
                output.push_str(&format!("   = note: {}\n", note));
            }
        }
        output
    }

    /// Formats every diagnostic of a failed build.
    pub fn format_all(&self, errors: &[SourceError]) -> String {
        let mut output = String::new();
        for error in errors {
            output.push_str(&self.format(error));
            output.push('\n');
        }
        output
    }
}
