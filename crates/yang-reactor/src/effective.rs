//! Effective model construction.
//!
//! Runs once every source completed EFFECTIVE_MODEL. Effective statements are
//! built bottom-up and memoized per context; a support may ask for the
//! effective form of any other statement (a typedef's base, a leafref target)
//! and gets it built on demand. Asking for a statement that is still being
//! built is a circular dependency.
//!
//! Pruned statements (unsupported, replaced by refine, or disabled by an
//! `if-feature`) and their subtrees are left out. A statement with a failed
//! substatement fails with the same error, so one problem is reported once.
//! A copy whose expansion left it identical to its prototype reuses the
//! prototype's effective statement.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;
use yang_model::{DeclaredStatement, EffectiveModel, EffectiveStatement};

use crate::build::{BuildState, Stmt};
use crate::config::ReactorConfig;
use crate::context::ContextId;
use crate::error::{ErrorKind, ReactorError, SourceError, SourceResult};
use crate::phase::Phase;

/// What [`StatementSupport::build_effective`](crate::StatementSupport::build_effective)
/// can see while producing one effective statement.
pub struct EffectiveInput<'b, 'a> {
    builder: &'b mut EffectiveModelBuilder<'a>,
    stmt: Stmt<'a>,
    substatements: &'b [Arc<EffectiveStatement>],
}

impl<'b, 'a> EffectiveInput<'b, 'a> {
    pub fn stmt(&self) -> Stmt<'a> {
        self.stmt
    }

    /// Already built substatements, pruned ones excluded.
    pub fn substatements(&self) -> &[Arc<EffectiveStatement>] {
        self.substatements
    }

    /// First built substatement with core keyword `name`.
    pub fn substatement(&self, name: &str) -> Option<&Arc<EffectiveStatement>> {
        self.substatements.iter().find(|stmt| stmt.keyword().is(name))
    }

    /// Effective form of another statement of the build; `None` if pruned.
    pub fn effective_of(&mut self, id: ContextId) -> SourceResult<Option<Arc<EffectiveStatement>>> {
        self.builder.build(id)
    }

    pub fn config(&self) -> &'a ReactorConfig {
        self.stmt.config()
    }

    /// Error located at the statement being built.
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) -> SourceError {
        self.stmt.error(kind, message)
    }
}

pub(crate) struct EffectiveModelBuilder<'a> {
    state: &'a BuildState,
    built: HashMap<ContextId, Option<Arc<EffectiveStatement>>>,
    failed: HashMap<ContextId, SourceError>,
    declared: HashMap<ContextId, Arc<DeclaredStatement>>,
    in_progress: HashSet<ContextId>,
    errors: Vec<SourceError>,
    shared: usize,
}

impl<'a> EffectiveModelBuilder<'a> {
    pub fn new(state: &'a BuildState) -> Self {
        Self {
            state,
            built: HashMap::new(),
            failed: HashMap::new(),
            declared: HashMap::new(),
            in_progress: HashSet::new(),
            errors: Vec::new(),
            shared: 0,
        }
    }

    /// Build the roots of every requested source.
    pub fn build_model(mut self) -> Result<EffectiveModel, ReactorError> {
        let requested: Vec<ContextId> = self
            .state
            .sources
            .iter()
            .filter(|source| source.requested)
            .filter_map(|source| source.root)
            .collect();

        let mut roots = Vec::new();
        for root in requested {
            if let Ok(Some(effective)) = self.build(root) {
                roots.push(effective);
            }
        }

        if let Some(internal) = self.errors.iter().find(|error| error.is_internal()) {
            return Err(ReactorError::Internal(internal.clone()));
        }
        if !self.errors.is_empty() {
            return Err(ReactorError::Failed {
                phase: Phase::EffectiveModel,
                errors: self.errors,
            });
        }
        debug!(statements = self.built.len(), shared = self.shared, "effective model built");
        Ok(EffectiveModel::new(roots))
    }

    fn record(&mut self, id: ContextId, error: SourceError) -> SourceError {
        if !self.errors.contains(&error) {
            self.errors.push(error.clone());
        }
        self.failed.insert(id, error.clone());
        error
    }

    pub fn build(&mut self, id: ContextId) -> SourceResult<Option<Arc<EffectiveStatement>>> {
        if let Some(done) = self.built.get(&id) {
            return Ok(done.clone());
        }
        if let Some(error) = self.failed.get(&id) {
            return Err(error.clone());
        }
        let stmt = self.state.stmt(id);
        if is_pruned(stmt) {
            self.built.insert(id, None);
            return Ok(None);
        }
        if !self.in_progress.insert(id) {
            let message = match stmt.raw_argument() {
                Some(argument) => {
                    format!("circular dependency involving {} '{argument}'", stmt.keyword())
                }
                None => format!("circular dependency involving '{}'", stmt.keyword()),
            };
            return Err(stmt.error(ErrorKind::InvalidStatement, message));
        }

        let result = self.build_uncached(stmt);
        self.in_progress.remove(&id);
        match result {
            Ok(effective) => {
                self.built.insert(id, effective.clone());
                Ok(effective)
            }
            Err(error) => Err(self.record(id, error)),
        }
    }

    fn build_uncached(&mut self, stmt: Stmt<'a>) -> SourceResult<Option<Arc<EffectiveStatement>>> {
        if let Some(prototype) = stmt.prototype() {
            if can_share(stmt, prototype) {
                self.shared += 1;
                return self.build(prototype.id());
            }
        }

        let mut substatements = Vec::new();
        let mut failure = None;
        for child in stmt.children() {
            // Keep going after a failure so siblings report their errors too.
            match self.build(child.id()) {
                Ok(Some(effective)) => substatements.push(effective),
                Ok(None) => {}
                Err(error) => {
                    failure.get_or_insert(error);
                }
            }
        }
        if let Some(error) = failure {
            return Err(error);
        }

        let declared = self.declared_of(stmt.original());
        let support = stmt.support().clone();
        let kind = {
            let mut input = EffectiveInput {
                builder: self,
                stmt,
                substatements: &substatements,
            };
            support.build_effective(&mut input)?
        };

        Ok(Some(Arc::new(EffectiveStatement::new(
            stmt.keyword().clone(),
            stmt.argument().clone(),
            stmt.location().clone(),
            Some(declared),
            stmt.history(),
            substatements,
            kind,
        ))))
    }

    /// Declared form of a declared statement and its declared subtree.
    fn declared_of(&mut self, stmt: Stmt<'a>) -> Arc<DeclaredStatement> {
        if let Some(done) = self.declared.get(&stmt.id()) {
            return done.clone();
        }
        let substatements = stmt
            .declared_children()
            .map(|child| self.declared_of(child))
            .collect();
        let declared = Arc::new(DeclaredStatement::new(
            stmt.keyword().clone(),
            stmt.raw_argument().map(str::to_string),
            stmt.argument().clone(),
            stmt.location().clone(),
            substatements,
        ));
        self.declared.insert(stmt.id(), declared.clone());
        declared
    }
}

fn is_pruned(stmt: Stmt<'_>) -> bool {
    stmt.is_unsupported()
        || stmt.is_removed()
        || stmt
            .children()
            .any(|child| !child.is_unsupported() && child.support().prunes_parent(child))
}

fn can_share(copy: Stmt<'_>, prototype: Stmt<'_>) -> bool {
    !copy.is_modified()
        && copy.history() == prototype.history()
        && copy.module_root().id() == prototype.module_root().id()
        && copy.support().shares_prototype(copy, prototype)
}
