//! Build phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The ordered phases every build walks through.
///
/// ```text
/// INIT → SOURCE_PRE_LINKAGE → SOURCE_LINKAGE → STATEMENT_DEFINITION
///      → FULL_DECLARATION → EFFECTIVE_MODEL
/// ```
///
/// Phases never regress. Each statement support is bound to the phase in
/// which its statements are first materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Sources read, no statements materialized
    Init,
    /// Module headers: names, revisions, namespaces, prefixes
    SourcePreLinkage,
    /// Imports, includes and belongs-to resolved
    SourceLinkage,
    /// Definitions (typedef, grouping, identity, data nodes) bound
    StatementDefinition,
    /// Every statement materialized and validated
    FullDeclaration,
    /// Expansion finished, effective model built
    EffectiveModel,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Init,
        Phase::SourcePreLinkage,
        Phase::SourceLinkage,
        Phase::StatementDefinition,
        Phase::FullDeclaration,
        Phase::EffectiveModel,
    ];

    pub fn next(self) -> Option<Phase> {
        Self::ALL.get(self as usize + 1).copied()
    }

    pub fn previous(self) -> Option<Phase> {
        (self as usize).checked_sub(1).map(|index| Self::ALL[index])
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Init => "INIT",
            Phase::SourcePreLinkage => "SOURCE_PRE_LINKAGE",
            Phase::SourceLinkage => "SOURCE_LINKAGE",
            Phase::StatementDefinition => "STATEMENT_DEFINITION",
            Phase::FullDeclaration => "FULL_DECLARATION",
            Phase::EffectiveModel => "EFFECTIVE_MODEL",
        }
    }

    /// Phases that run per-statement declaration hooks.
    pub fn has_declaration_hook(self) -> bool {
        !matches!(self, Phase::Init | Phase::EffectiveModel)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
