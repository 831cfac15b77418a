//! Statement supports and their registry.
//!
//! A [`StatementSupport`] describes everything the reactor needs to know about
//! one keyword: how to parse its argument, which substatements it accepts, what
//! to do at each phase, and how to produce its effective form. Supports are
//! registered in a [`SupportRegistry`] together with the phase in which their
//! statements are first materialized; the registry is immutable once a
//! [`Reactor`](crate::Reactor) is built and is shared by all of its builds.

use indexmap::IndexMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use yang_model::{Argument, EffectiveKind, Keyword, SourceLocation};

use crate::build::{Stmt, StmtMut};
use crate::effective::EffectiveInput;
use crate::error::{ErrorKind, SourceError, SourceResult};
use crate::namespace::Namespace;
use crate::phase::Phase;
use crate::validator::SubstatementValidator;

/// What the argument parser of a new statement can see.
pub struct ParseContext<'a> {
    pub keyword: &'a Keyword,
    pub location: &'a SourceLocation,
    /// The statement the new one is being attached to; `None` for roots
    pub parent: Option<Stmt<'a>>,
}

impl<'a> ParseContext<'a> {
    /// Argument syntax error at the statement being parsed.
    pub fn error(&self, message: impl Into<String>) -> SourceError {
        SourceError::new(ErrorKind::ArgumentSyntax, self.location.clone(), message)
    }

    /// The raw argument, or an error if the statement has none.
    pub fn require<'r>(&self, raw: Option<&'r str>) -> SourceResult<&'r str> {
        raw.ok_or_else(|| self.error(format!("statement '{}' requires an argument", self.keyword)))
    }
}

/// Which children a grouping or augment expansion copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopyPolicy {
    /// Instantiated at the expansion site (schema nodes, extension instances)
    SchemaTree,
    /// Copied along with a copied parent
    Substatement,
    /// Never copied (already expanded, or meaningful only where declared)
    Ignore,
}

/// Behaviour of one statement keyword.
///
/// Hooks receive the statement as a [`StmtMut`]: they may read the tree,
/// bind namespace entries, mark the statement unsupported and register
/// inference actions. Hook errors are collected; only internal errors abort
/// the build.
pub trait StatementSupport: Send + Sync {
    /// Parse the raw argument into its typed form.
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument>;

    fn validator(&self) -> Option<&SubstatementValidator> {
        None
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Substatement
    }

    /// The statement was attached to the tree, by materialization or copy.
    fn on_statement_added(&self, _stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        Ok(())
    }

    fn on_pre_linkage_declared(&self, _stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        Ok(())
    }

    fn on_linkage_declared(&self, _stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        Ok(())
    }

    fn on_statement_definition_declared(&self, _stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        Ok(())
    }

    /// The full subtree is available. Copies never run declaration hooks,
    /// only `on_statement_added`.
    fn on_full_definition_declared(&self, _stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        Ok(())
    }

    /// Whether this statement removes its parent from the effective model
    /// (an `if-feature` naming an unsupported feature).
    fn prunes_parent(&self, _stmt: Stmt<'_>) -> bool {
        false
    }

    /// Whether a copy may reuse the effective statement of its prototype.
    /// Only consulted when both have identical copy histories and modules.
    fn shares_prototype(&self, _copy: Stmt<'_>, _prototype: Stmt<'_>) -> bool {
        true
    }

    /// Produce the kind payload of the effective statement. Substatements
    /// are already built and available from `input`.
    fn build_effective(&self, _input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        Ok(EffectiveKind::Other)
    }
}

/// A support together with its materialization phase.
#[derive(Clone)]
pub struct RegisteredSupport {
    pub phase: Phase,
    pub support: Arc<dyn StatementSupport>,
}

/// Phases in which a namespace accepts new bindings.
///
/// Without `until` a namespace stays writable until the build ends; with it,
/// bindings are refused once the build has moved past `until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceWindow {
    pub name: &'static str,
    pub from: Phase,
    pub until: Option<Phase>,
}

/// Immutable table of statement supports and namespace behaviours.
#[derive(Clone, Default)]
pub struct SupportRegistry {
    supports: IndexMap<Keyword, RegisteredSupport>,
    namespaces: HashMap<TypeId, NamespaceWindow>,
    unknown: Option<Arc<dyn StatementSupport>>,
}

impl SupportRegistry {
    pub fn get(&self, keyword: &Keyword) -> Option<&RegisteredSupport> {
        self.supports.get(keyword)
    }

    /// Whether a core keyword has a support.
    pub fn is_known(&self, keyword: &str) -> bool {
        self.supports.contains_key(&Keyword::yang(keyword))
    }

    pub fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.supports.keys()
    }

    /// Fallback support for keywords without a dedicated one.
    pub fn unknown_support(&self) -> Option<&Arc<dyn StatementSupport>> {
        self.unknown.as_ref()
    }

    /// Phase from which namespace `N` may be written.
    pub fn namespace_phase<N: Namespace>(&self) -> Option<Phase> {
        self.namespace_window::<N>().map(|window| window.from)
    }

    pub fn namespace_window<N: Namespace>(&self) -> Option<NamespaceWindow> {
        self.namespaces.get(&TypeId::of::<N>()).copied()
    }

    pub(crate) fn insert_support(
        &mut self,
        keyword: Keyword,
        registered: RegisteredSupport,
    ) -> bool {
        self.supports.insert(keyword, registered).is_some()
    }

    pub(crate) fn insert_namespace<N: Namespace>(&mut self, from: Phase, until: Option<Phase>) {
        let window = NamespaceWindow {
            name: N::NAME,
            from,
            until,
        };
        self.namespaces.insert(TypeId::of::<N>(), window);
    }

    pub(crate) fn set_unknown(&mut self, support: Arc<dyn StatementSupport>) {
        self.unknown = Some(support);
    }
}

impl std::fmt::Debug for SupportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupportRegistry")
            .field("supports", &self.supports.keys().map(ToString::to_string).collect::<Vec<_>>())
            .field(
                "namespaces",
                &self.namespaces.values().map(|window| window.name).collect::<Vec<_>>(),
            )
            .field("unknown", &self.unknown.is_some())
            .finish()
    }
}
