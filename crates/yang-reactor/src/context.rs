//! Statement contexts: the mutable nodes of one build.
//!
//! Contexts live in an arena owned by the build and refer to each other by
//! [`ContextId`]. A context is either declared (materialized from a raw
//! statement) or a copy (instantiated by `uses` or `augment`), in which case it
//! remembers its prototype.

use std::fmt;
use std::sync::Arc;

use yang_model::{Argument, CopyHistory, Keyword, RawStatement, SourceLocation};

use crate::namespace::NamespaceStorage;
use crate::phase::Phase;
use crate::support::StatementSupport;

/// Index of a statement context in its build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub(crate) u32);

impl ContextId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a source in its build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub(crate) u32);

impl SourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of the statement tree under construction.
pub(crate) struct StatementContext {
    pub keyword: Keyword,
    pub raw_argument: Option<String>,
    pub argument: Argument,
    pub location: SourceLocation,
    pub support: Arc<dyn StatementSupport>,
    pub source: SourceId,
    pub parent: Option<ContextId>,

    /// Materialized declared children, in declaration order
    pub declared: Vec<ContextId>,
    /// Children added by expansion, in insertion order
    pub effective: Vec<ContextId>,
    /// Raw children not materialized yet, by declaration index
    pub raw_children: Vec<Option<RawStatement>>,
    /// Keyword and location of every raw child as written
    pub child_keywords: Vec<(String, SourceLocation)>,
    /// Position among the parent's raw children
    pub raw_index: usize,

    pub storage: NamespaceStorage,
    /// Other roots whose tree-scoped bindings this root sees
    pub linked_roots: Vec<ContextId>,

    /// Last phase this context and its whole subtree completed
    pub completed: Option<Phase>,
    /// Last phase whose declaration hook ran on this context
    pub hooks_done: Option<Phase>,

    pub history: CopyHistory,
    pub prototype: Option<ContextId>,
    /// Root whose module this statement belongs to
    pub module_root: ContextId,

    pub unsupported: bool,
    /// Replaced by a refined copy
    pub removed: bool,
    /// Expansion altered this copy, so it cannot share its prototype's form
    pub modified: bool,
}

impl StatementContext {
    pub fn has_completed(&self, phase: Phase) -> bool {
        self.completed.is_some_and(|done| done >= phase)
    }

    pub fn hooks_reached(&self, phase: Phase) -> bool {
        self.hooks_done.is_some_and(|done| done >= phase)
    }

    pub fn is_copy(&self) -> bool {
        self.prototype.is_some()
    }

    /// Materialized children followed by expansion children.
    pub fn child_ids(&self) -> Vec<ContextId> {
        self.declared.iter().chain(&self.effective).copied().collect()
    }
}

impl fmt::Debug for StatementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementContext")
            .field("keyword", &self.keyword)
            .field("argument", &self.raw_argument)
            .field("location", &self.location)
            .field("parent", &self.parent)
            .field("completed", &self.completed)
            .field("prototype", &self.prototype)
            .finish_non_exhaustive()
    }
}
