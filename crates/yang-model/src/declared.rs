//! Declared statements: the source as written, with typed arguments.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::argument::Argument;
use crate::identifier::Keyword;
use crate::location::SourceLocation;

/// Immutable declared statement.
///
/// Holds only what was written in the source: no inherited or expanded
/// content. Shared by every effective statement created from it, including
/// copies produced by `uses` and `augment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredStatement {
    keyword: Keyword,
    raw_argument: Option<String>,
    argument: Argument,
    location: SourceLocation,
    substatements: Vec<Arc<DeclaredStatement>>,
}

impl DeclaredStatement {
    pub fn new(
        keyword: Keyword,
        raw_argument: Option<String>,
        argument: Argument,
        location: SourceLocation,
        substatements: Vec<Arc<DeclaredStatement>>,
    ) -> Self {
        Self {
            keyword,
            raw_argument,
            argument,
            location,
            substatements,
        }
    }

    pub fn keyword(&self) -> &Keyword {
        &self.keyword
    }

    pub fn raw_argument(&self) -> Option<&str> {
        self.raw_argument.as_deref()
    }

    pub fn argument(&self) -> &Argument {
        &self.argument
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn substatements(&self) -> &[Arc<DeclaredStatement>] {
        &self.substatements
    }

    /// First declared substatement with core keyword `name`.
    pub fn find_first(&self, name: &str) -> Option<&Arc<DeclaredStatement>> {
        self.substatements.iter().find(|stmt| stmt.keyword.is(name))
    }
}
