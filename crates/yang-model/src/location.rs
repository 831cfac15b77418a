//! Source location tracking for diagnostics.
//!
//! Raw statements arrive from an external parser already tagged with the
//! position they were read from. The reactor never inspects source text, so a
//! location is only a source name plus a line/column pair, cheap to clone into
//! every context and diagnostic.
//!
//! # Examples
//!
//! ```
//! # use yang_model::SourceLocation;
//! let location = SourceLocation::new("m1.yang", 4, 5);
//! assert_eq!(location.to_string(), "m1.yang:4:5");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Position of a statement inside a named source.
///
/// Line and column are 1-based. A line of 0 means the position inside the
/// source is not known; only the source name is reported then.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Name of the source (usually a file name)
    pub source: Arc<str>,
    /// 1-based line, 0 when unknown
    pub line: u32,
    /// 1-based column, 0 when unknown
    pub column: u32,
}

impl SourceLocation {
    /// Create a location inside `source`.
    pub fn new(source: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            source: source.into(),
            line,
            column,
        }
    }

    /// Location used for diagnostics not tied to any source.
    pub fn unknown() -> Self {
        Self::new("<unknown>", 0, 0)
    }

    /// Location pointing at a whole source.
    pub fn of_source(source: impl Into<Arc<str>>) -> Self {
        Self::new(source, 0, 0)
    }

    /// Whether the line/column information is present.
    pub fn has_position(&self) -> bool {
        self.line > 0
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_position() {
            write!(f, "{}:{}:{}", self.source, self.line, self.column)
        } else {
            write!(f, "{}", self.source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_position() {
        let location = SourceLocation::new("a.yang", 12, 3);
        assert_eq!(location.to_string(), "a.yang:12:3");
    }

    #[test]
    fn test_display_without_position() {
        let location = SourceLocation::of_source("a.yang");
        assert!(!location.has_position());
        assert_eq!(location.to_string(), "a.yang");
    }

    #[test]
    fn test_ordering_follows_source_then_line() {
        let first = SourceLocation::new("a.yang", 2, 1);
        let second = SourceLocation::new("a.yang", 10, 1);
        let other = SourceLocation::new("b.yang", 1, 1);
        assert!(first < second);
        assert!(second < other);
    }
}
