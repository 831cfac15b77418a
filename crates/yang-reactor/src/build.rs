//! Per-build state and the views statement supports operate on.
//!
//! [`BuildState`] owns the context arena, the global namespace storage and the
//! pending inference actions of one build. Supports never see it directly:
//! they get a [`Stmt`] (read-only, `Copy`) or a [`StmtMut`] (a context plus
//! exclusive access to the build) positioned at one statement.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::trace;
use yang_model::{Argument, CopyHistory, CopyType, Keyword, SourceLocation};

use crate::config::ReactorConfig;
use crate::context::{ContextId, SourceId, StatementContext};
use crate::error::{ErrorKind, ReactorError, SourceError, SourceResult};
use crate::inference::{ActionBuilder, InferenceAction, InferenceEngine};
use crate::namespace::{Binding, Namespace, NamespaceScope, NamespaceStorage, PutOutcome};
use crate::phase::Phase;
use crate::source::LoadedSource;
use crate::support::{CopyPolicy, StatementSupport, SupportRegistry};

pub(crate) struct SourceState {
    pub name: String,
    pub requested: bool,
    /// Raw tree until the root statement is materialized
    pub raw: Option<yang_model::RawStatement>,
    pub root: Option<ContextId>,
}

pub(crate) struct BuildState {
    pub registry: Arc<SupportRegistry>,
    pub config: Arc<ReactorConfig>,
    pub phase: Phase,
    pub contexts: Vec<StatementContext>,
    pub sources: Vec<SourceState>,
    pub global: NamespaceStorage,
    pub engine: InferenceEngine,
    pub diagnostics: Vec<SourceError>,
    /// Contexts created since hooks last ran
    pub fresh: Vec<ContextId>,
}

impl BuildState {
    pub fn new(
        registry: Arc<SupportRegistry>,
        config: Arc<ReactorConfig>,
        sources: Vec<LoadedSource>,
    ) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| SourceState {
                name: source.name,
                requested: source.requested,
                raw: Some(source.root),
                root: None,
            })
            .collect();
        Self {
            registry,
            config,
            phase: Phase::Init,
            contexts: Vec::new(),
            sources,
            global: NamespaceStorage::default(),
            engine: InferenceEngine::default(),
            diagnostics: Vec::new(),
            fresh: Vec::new(),
        }
    }

    pub fn ctx(&self, id: ContextId) -> &StatementContext {
        &self.contexts[id.index()]
    }

    pub fn ctx_mut(&mut self, id: ContextId) -> &mut StatementContext {
        &mut self.contexts[id.index()]
    }

    pub fn stmt(&self, id: ContextId) -> Stmt<'_> {
        Stmt { state: self, id }
    }

    pub fn roots(&self) -> Vec<ContextId> {
        self.sources.iter().filter_map(|source| source.root).collect()
    }

    pub fn root_of(&self, mut id: ContextId) -> ContextId {
        while let Some(parent) = self.ctx(id).parent {
            id = parent;
        }
        id
    }

    /// Record a user-input diagnostic; internal violations abort the build.
    pub fn report(&mut self, error: SourceError) -> Result<(), ReactorError> {
        if error.is_internal() {
            return Err(ReactorError::Internal(error));
        }
        trace!(
            kind = error.kind.name(),
            location = %error.location,
            "diagnostic: {}",
            error.message
        );
        self.diagnostics.push(error);
        Ok(())
    }

    /// Push a new context created by materialization or copy.
    pub fn push_context(&mut self, context: StatementContext) -> ContextId {
        let id = ContextId(self.contexts.len() as u32);
        self.contexts.push(context);
        self.fresh.push(id);
        id
    }

    pub fn lookup<N: Namespace>(
        &self,
        from: ContextId,
        key: &N::Key,
    ) -> Option<&Binding<N::Value>> {
        match N::SCOPE {
            NamespaceScope::StatementLocal => self.ctx(from).storage.get::<N>(key),
            NamespaceScope::SourceLocal => self.ctx(self.root_of(from)).storage.get::<N>(key),
            NamespaceScope::Global => self.global.get::<N>(key),
            NamespaceScope::TreeScoped => {
                let mut current = from;
                loop {
                    if let Some(binding) = self.ctx(current).storage.get::<N>(key) {
                        return Some(binding);
                    }
                    match self.ctx(current).parent {
                        Some(parent) => current = parent,
                        None => return self.lookup_linked::<N>(current, key),
                    }
                }
            }
        }
    }

    /// Tree-scoped lookup continued through roots linked to `root`.
    fn lookup_linked<N: Namespace>(
        &self,
        root: ContextId,
        key: &N::Key,
    ) -> Option<&Binding<N::Value>> {
        let mut visited = HashSet::from([root]);
        let mut queue: Vec<ContextId> = self.ctx(root).linked_roots.clone();
        while let Some(next) = queue.pop() {
            if !visited.insert(next) {
                continue;
            }
            if let Some(binding) = self.ctx(next).storage.get::<N>(key) {
                return Some(binding);
            }
            queue.extend(self.ctx(next).linked_roots.iter().copied());
        }
        None
    }

    /// Where a binding of `N` put from `from` is stored; `None` is global.
    fn anchor<N: Namespace>(&self, from: ContextId) -> Option<ContextId> {
        match N::SCOPE {
            NamespaceScope::StatementLocal | NamespaceScope::TreeScoped => Some(from),
            NamespaceScope::SourceLocal => Some(self.root_of(from)),
            NamespaceScope::Global => None,
        }
    }

    pub fn bindings<N: Namespace>(
        &self,
        from: ContextId,
    ) -> Option<&IndexMap<N::Key, Binding<N::Value>>> {
        match self.anchor::<N>(from) {
            Some(anchor) => self.ctx(anchor).storage.all::<N>(),
            None => self.global.all::<N>(),
        }
    }

    /// Bind `key` in `N`. The namespace must be registered and open in the
    /// current phase, and the anchoring statement must not have completed
    /// EFFECTIVE_MODEL; anything else is an internal error.
    pub fn put<N: Namespace>(
        &mut self,
        from: ContextId,
        key: N::Key,
        value: N::Value,
        origin: SourceLocation,
    ) -> SourceResult<()> {
        let Some(window) = self.registry.namespace_window::<N>() else {
            return Err(SourceError::internal(
                origin,
                format!("namespace '{}' is not registered", N::NAME),
            ));
        };
        if window.from > self.phase {
            return Err(SourceError::internal(
                origin,
                format!(
                    "namespace '{}' is not available before {}, current phase is {}",
                    N::NAME,
                    window.from,
                    self.phase
                ),
            ));
        }
        if let Some(until) = window.until.filter(|until| *until < self.phase) {
            return Err(SourceError::internal(
                origin,
                format!(
                    "namespace '{}' is sealed after {until}, current phase is {}",
                    N::NAME,
                    self.phase
                ),
            ));
        }

        let anchor = self.anchor::<N>(from);
        if let Some(anchor) = anchor {
            if self.ctx(anchor).has_completed(Phase::EffectiveModel) {
                return Err(SourceError::internal(
                    origin,
                    format!("binding {} '{key}' on a statement that completed the build", N::NAME),
                ));
            }
        }

        trace!(namespace = N::NAME, key = %key, "bind");
        let binding = Binding {
            value,
            origin: origin.clone(),
        };
        let storage = match anchor {
            Some(anchor) => &mut self.ctx_mut(anchor).storage,
            None => &mut self.global,
        };
        match storage.put::<N>(key.clone(), binding) {
            PutOutcome::Inserted | PutOutcome::Unchanged | PutOutcome::Replaced => Ok(()),
            PutOutcome::Conflict(existing) => Err(SourceError::new(
                ErrorKind::DuplicateDefinition,
                origin,
                format!("{} '{key}' is already defined", N::NAME),
            )
            .with_label(existing.origin, "first defined here")),
            PutOutcome::Corrupted => Err(SourceError::internal(
                origin,
                format!("storage of namespace '{}' holds a foreign keyspace", N::NAME),
            )),
        }
    }

    /// Instantiate `original` and its copyable subtree as a child of `parent`.
    ///
    /// Unsupported and removed statements are skipped, as are children whose
    /// support has [`CopyPolicy::Ignore`]. Returns `None` if `original` itself
    /// was skipped.
    pub fn copy_subtree(
        &mut self,
        original: ContextId,
        parent: ContextId,
        copy: CopyType,
        module_root: ContextId,
    ) -> SourceResult<Option<ContextId>> {
        let source = self.ctx(original);
        if source.unsupported || source.removed {
            return Ok(None);
        }
        self.ensure_open(parent)?;

        let context = StatementContext {
            keyword: source.keyword.clone(),
            raw_argument: source.raw_argument.clone(),
            argument: source.argument.clone(),
            location: source.location.clone(),
            support: source.support.clone(),
            source: self.ctx(parent).source,
            parent: Some(parent),
            declared: Vec::new(),
            effective: Vec::new(),
            raw_children: Vec::new(),
            child_keywords: Vec::new(),
            raw_index: 0,
            storage: NamespaceStorage::default(),
            linked_roots: Vec::new(),
            completed: Some(Phase::FullDeclaration),
            hooks_done: Some(Phase::FullDeclaration),
            history: source.history.append(copy),
            prototype: Some(original),
            module_root,
            unsupported: false,
            removed: false,
            modified: false,
        };
        let children = source.child_ids();
        let id = self.push_context(context);
        self.ctx_mut(parent).effective.push(id);
        trace!(original = %original, copy = %id, parent = %parent, "copied statement");

        for child in children {
            if self.ctx(child).support.copy_policy() == CopyPolicy::Ignore {
                continue;
            }
            self.copy_subtree(child, id, copy, module_root)?;
        }
        Ok(Some(id))
    }

    /// Fail if `id` can no longer gain children.
    pub fn ensure_open(&self, id: ContextId) -> SourceResult<()> {
        let ctx = self.ctx(id);
        if ctx.has_completed(self.phase) {
            return Err(SourceError::internal(
                ctx.location.clone(),
                format!("statement {id} already completed {}", self.phase),
            ));
        }
        Ok(())
    }

    /// Flag copies from `id` upwards as altered by expansion.
    pub fn mark_modified(&mut self, id: ContextId) {
        let mut current = Some(id);
        while let Some(next) = current {
            let ctx = self.ctx_mut(next);
            if !ctx.is_copy() || ctx.modified {
                break;
            }
            ctx.modified = true;
            current = ctx.parent;
        }
    }
}

/// Read-only view of one statement during a build.
#[derive(Clone, Copy)]
pub struct Stmt<'a> {
    state: &'a BuildState,
    id: ContextId,
}

impl<'a> Stmt<'a> {
    pub(crate) fn new(state: &'a BuildState, id: ContextId) -> Self {
        Self { state, id }
    }

    fn ctx(&self) -> &'a StatementContext {
        self.state.ctx(self.id)
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Another statement of the same build.
    pub fn at(&self, id: ContextId) -> Stmt<'a> {
        Stmt { state: self.state, id }
    }

    pub fn keyword(&self) -> &'a Keyword {
        &self.ctx().keyword
    }

    pub fn raw_argument(&self) -> Option<&'a str> {
        self.ctx().raw_argument.as_deref()
    }

    pub fn argument(&self) -> &'a Argument {
        &self.ctx().argument
    }

    pub fn location(&self) -> &'a SourceLocation {
        &self.ctx().location
    }

    pub fn source(&self) -> SourceId {
        self.ctx().source
    }

    pub fn source_name(&self) -> &'a str {
        &self.state.sources[self.ctx().source.index()].name
    }

    pub fn parent(&self) -> Option<Stmt<'a>> {
        self.ctx().parent.map(|id| self.at(id))
    }

    /// Ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Stmt<'a>> {
        std::iter::successors(self.parent(), |stmt| stmt.parent())
    }

    pub fn root(&self) -> Stmt<'a> {
        self.at(self.state.root_of(self.id))
    }

    pub fn is_root(&self) -> bool {
        self.ctx().parent.is_none()
    }

    /// Root of the module this statement belongs to; for copies, the module
    /// of the expansion site.
    pub fn module_root(&self) -> Stmt<'a> {
        self.at(self.ctx().module_root)
    }

    /// Declared and expansion children, without removed ones.
    pub fn children(&self) -> impl Iterator<Item = Stmt<'a>> {
        let state = self.state;
        let ctx = self.ctx();
        ctx.declared
            .iter()
            .chain(&ctx.effective)
            .map(move |id| Stmt { state, id: *id })
            .filter(|stmt| !stmt.ctx().removed)
    }

    /// Keywords and locations of the substatements as written, including
    /// those that failed to materialize.
    pub fn written_children(&self) -> &'a [(String, SourceLocation)] {
        &self.ctx().child_keywords
    }

    pub fn declared_children(&self) -> impl Iterator<Item = Stmt<'a>> {
        let state = self.state;
        self.ctx().declared.iter().map(move |id| Stmt { state, id: *id })
    }

    pub fn children_named(&self, name: &'a str) -> impl Iterator<Item = Stmt<'a>> {
        self.children().filter(move |stmt| stmt.keyword().is(name))
    }

    pub fn first_child(&self, name: &str) -> Option<Stmt<'a>> {
        self.children().find(|stmt| stmt.keyword().is(name))
    }

    /// Argument text of the first child `name`.
    pub fn child_argument(&self, name: &str) -> Option<&'a str> {
        self.first_child(name)?.raw_argument()
    }

    pub fn is_copy(&self) -> bool {
        self.ctx().is_copy()
    }

    pub fn history(&self) -> CopyHistory {
        self.ctx().history
    }

    pub fn prototype(&self) -> Option<Stmt<'a>> {
        self.ctx().prototype.map(|id| self.at(id))
    }

    /// The declared statement this one was ultimately copied from.
    pub fn original(&self) -> Stmt<'a> {
        let mut current = *self;
        while let Some(prototype) = current.prototype() {
            current = prototype;
        }
        current
    }

    pub fn is_unsupported(&self) -> bool {
        self.ctx().unsupported
    }

    pub fn is_removed(&self) -> bool {
        self.ctx().removed
    }

    pub fn is_modified(&self) -> bool {
        self.ctx().modified
    }

    pub fn has_completed(&self, phase: Phase) -> bool {
        self.ctx().has_completed(phase)
    }

    pub fn support(&self) -> &'a Arc<dyn StatementSupport> {
        &self.ctx().support
    }

    pub fn copy_policy(&self) -> CopyPolicy {
        self.ctx().support.copy_policy()
    }

    /// Visible binding of `key` in `N`, per the namespace's scope.
    pub fn lookup<N: Namespace>(&self, key: &N::Key) -> Option<&'a N::Value> {
        self.lookup_binding::<N>(key).map(|binding| &binding.value)
    }

    pub fn lookup_binding<N: Namespace>(&self, key: &N::Key) -> Option<&'a Binding<N::Value>> {
        self.state.lookup::<N>(self.id, key)
    }

    /// Bindings of `N` stored where this statement would store them.
    pub fn bindings<N: Namespace>(&self) -> Option<&'a IndexMap<N::Key, Binding<N::Value>>> {
        self.state.bindings::<N>(self.id)
    }

    pub fn config(&self) -> &'a ReactorConfig {
        &self.state.config
    }

    pub fn registry(&self) -> &'a SupportRegistry {
        &self.state.registry
    }

    /// Phase the build is currently in.
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Error of `kind` located at this statement.
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) -> SourceError {
        SourceError::new(kind, self.location().clone(), message)
    }
}

impl std::fmt::Debug for Stmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?} at {}", self.keyword(), self.raw_argument(), self.location())
    }
}

/// One statement with exclusive access to its build.
pub struct StmtMut<'a> {
    state: &'a mut BuildState,
    id: ContextId,
}

impl<'a> StmtMut<'a> {
    pub(crate) fn new(state: &'a mut BuildState, id: ContextId) -> Self {
        Self { state, id }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn view(&self) -> Stmt<'_> {
        Stmt::new(&*self.state, self.id)
    }

    /// Reborrow positioned at another statement.
    pub fn at(&mut self, id: ContextId) -> StmtMut<'_> {
        StmtMut { state: &mut *self.state, id }
    }

    /// Bind `key` to `value` where this statement's scope of `N` says.
    pub fn add_to_ns<N: Namespace>(&mut self, key: N::Key, value: N::Value) -> SourceResult<()> {
        let origin = self.state.ctx(self.id).location.clone();
        self.state.put::<N>(self.id, key, value, origin)
    }

    /// Bind with `at` as the anchoring statement and this one as origin.
    pub fn add_to_ns_at<N: Namespace>(
        &mut self,
        at: ContextId,
        key: N::Key,
        value: N::Value,
    ) -> SourceResult<()> {
        let origin = self.state.ctx(self.id).location.clone();
        self.state.put::<N>(at, key, value, origin)
    }

    /// Exclude this statement and its subtree from the effective model,
    /// flagging the parent modified.
    pub fn set_unsupported(&mut self) -> SourceResult<()> {
        let ctx = self.state.ctx(self.id);
        if ctx.has_completed(Phase::EffectiveModel) {
            return Err(SourceError::internal(
                ctx.location.clone(),
                "statement marked unsupported after it completed the build",
            ));
        }
        trace!(stmt = %self.id, keyword = %ctx.keyword, "unsupported");
        let parent = ctx.parent;
        self.state.ctx_mut(self.id).unsupported = true;
        if let Some(parent) = parent {
            self.state.mark_modified(parent);
        }
        Ok(())
    }

    /// Make tree-scoped bindings of this statement's root and `other`'s root
    /// visible to each other.
    pub fn link_roots(&mut self, other: ContextId) {
        let mine = self.state.root_of(self.id);
        let theirs = self.state.root_of(other);
        if mine == theirs {
            return;
        }
        for (from, to) in [(mine, theirs), (theirs, mine)] {
            let linked = &mut self.state.ctx_mut(from).linked_roots;
            if !linked.contains(&to) {
                linked.push(to);
            }
        }
    }

    /// Start an inference action owned by this statement.
    pub fn new_inference_action(&self, phase: Phase) -> SourceResult<ActionBuilder> {
        if phase < self.state.phase {
            return Err(SourceError::internal(
                self.state.ctx(self.id).location.clone(),
                format!(
                    "inference action for {phase} registered in {}",
                    self.state.phase
                ),
            ));
        }
        Ok(ActionBuilder::new(self.id, phase))
    }

    /// Register `action` with the prerequisites declared on `builder`.
    pub fn apply_action(
        &mut self,
        builder: ActionBuilder,
        action: impl InferenceAction,
    ) -> SourceResult<()> {
        self.state.register_action(builder, Box::new(action))
    }

    /// Copy `original` (and its copyable subtree) under `parent`.
    pub fn copy_as_child(
        &mut self,
        original: ContextId,
        parent: ContextId,
        copy: CopyType,
        module_root: ContextId,
    ) -> SourceResult<Option<ContextId>> {
        let copied = self.state.copy_subtree(original, parent, copy, module_root)?;
        if copied.is_some() {
            self.state.mark_modified(parent);
        }
        Ok(copied)
    }

    /// Drop `id` from its parent's children, flagging the parent modified.
    pub fn remove(&mut self, id: ContextId) -> SourceResult<()> {
        if let Some(parent) = self.state.ctx(id).parent {
            self.state.ensure_open(parent)?;
            self.state.mark_modified(parent);
        }
        self.state.ctx_mut(id).removed = true;
        Ok(())
    }

    /// Record a diagnostic without failing the current hook or action.
    pub fn report(&mut self, error: SourceError) {
        self.state.diagnostics.push(error);
    }
}
