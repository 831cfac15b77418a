//! Inference actions and the per-phase fixpoint that runs them.
//!
//! An action is registered by a statement for one phase, together with its
//! prerequisites: statements that must exist and have completed some phase,
//! and statements the action will mutate. Mutation targets cannot complete
//! the prerequisite phase until every action that reserved them has run,
//! which is how a `uses` keeps its parent open until the grouping is copied
//! in. The owner of an action is not blocked by it.
//!
//! # Fixpoint
//!
//! Each round first re-runs unresolved prerequisites (bindings may have
//! appeared), then applies every ready action. Newly created statements get
//! their hooks run right after the action that created them. When no action
//! is ready, every statement that can complete the phase does so, which may
//! satisfy further prerequisites. The loop ends when a round makes no
//! progress; actions still pending then fail with the prerequisites they
//! were waiting for.

use std::fmt;
use std::mem;

use tracing::{debug, trace};

use crate::build::{BuildState, Stmt, StmtMut};
use crate::context::ContextId;
use crate::error::{ReactorError, SourceError, SourceResult};
use crate::namespace::Namespace;
use crate::phase::Phase;

/// Handle to one prerequisite of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prereq(usize);

type Finder = Box<dyn Fn(Stmt<'_>) -> Option<ContextId>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequirementKind {
    /// Target must have completed the phase
    Completed,
    /// Target is reserved until the action ran
    Mutation,
}

struct Requirement {
    describe: String,
    kind: RequirementKind,
    phase: Phase,
    find: Finder,
    found: Option<ContextId>,
}

/// Prerequisites of an action under construction.
pub struct ActionBuilder {
    owner: ContextId,
    phase: Phase,
    requirements: Vec<Requirement>,
}

impl ActionBuilder {
    pub(crate) fn new(owner: ContextId, phase: Phase) -> Self {
        Self {
            owner,
            phase,
            requirements: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn push(
        &mut self,
        describe: String,
        kind: RequirementKind,
        phase: Phase,
        find: Finder,
    ) -> Prereq {
        self.requirements.push(Requirement {
            describe,
            kind,
            phase,
            find,
            found: None,
        });
        Prereq(self.requirements.len() - 1)
    }

    /// Require the statement `find` returns (from the owner's point of view)
    /// to have completed `phase`. `describe` names it in failure messages.
    pub fn requires_ctx(
        &mut self,
        describe: impl Into<String>,
        phase: Phase,
        find: impl Fn(Stmt<'_>) -> Option<ContextId> + 'static,
    ) -> Prereq {
        self.push(describe.into(), RequirementKind::Completed, phase, Box::new(find))
    }

    /// Require the statement bound to `key` in `N`, looked up from `at`.
    pub fn requires_ns<N>(&mut self, at: ContextId, key: N::Key, phase: Phase) -> Prereq
    where
        N: Namespace<Value = ContextId>,
    {
        let describe = format!("{} '{}'", N::NAME, key);
        self.requires_ctx(describe, phase, move |stmt| stmt.at(at).lookup::<N>(&key).copied())
    }

    /// Require `id` to have completed `phase`.
    pub fn requires_completed(&mut self, id: ContextId, phase: Phase) -> Prereq {
        self.requires_ctx(format!("statement {id}"), phase, move |_| Some(id))
    }

    /// Reserve `id`: it cannot complete `phase` before this action ran.
    pub fn mutates_ctx(&mut self, id: ContextId, phase: Phase) -> Prereq {
        self.push(
            format!("statement {id}"),
            RequirementKind::Mutation,
            phase,
            Box::new(move |_| Some(id)),
        )
    }

    /// Reserve the statement `find` returns, once it exists.
    pub fn mutates_found(
        &mut self,
        describe: impl Into<String>,
        phase: Phase,
        find: impl Fn(Stmt<'_>) -> Option<ContextId> + 'static,
    ) -> Prereq {
        self.push(describe.into(), RequirementKind::Mutation, phase, Box::new(find))
    }
}

/// Prerequisites as resolved when the action is applied.
pub struct Resolved {
    found: Vec<ContextId>,
}

impl Resolved {
    /// The statement that satisfied `prereq`.
    pub fn get(&self, prereq: Prereq) -> ContextId {
        self.found[prereq.0]
    }
}

/// Prerequisites an action was still waiting for when its phase ended.
///
/// A prerequisite is either missing (its lookup never found a statement) or
/// blocked (the statement exists but never completed the required phase,
/// which is how a dependency cycle shows).
#[derive(Debug, Clone)]
pub struct Unresolved {
    failed: Vec<FailedPrereq>,
}

#[derive(Debug, Clone)]
struct FailedPrereq {
    prereq: Prereq,
    describe: String,
    found: Option<ContextId>,
}

impl Unresolved {
    pub fn contains(&self, prereq: Prereq) -> bool {
        self.failed.iter().any(|failed| failed.prereq == prereq)
    }

    /// Whether `prereq` failed because nothing was ever found for it.
    pub fn is_missing(&self, prereq: Prereq) -> bool {
        self.failed
            .iter()
            .any(|failed| failed.prereq == prereq && failed.found.is_none())
    }

    /// The statement `prereq` found if it failed because that statement
    /// never completed the required phase.
    pub fn blocked_on(&self, prereq: Prereq) -> Option<ContextId> {
        self.failed
            .iter()
            .find(|failed| failed.prereq == prereq)
            .and_then(|failed| failed.found)
    }

    pub fn is_blocked(&self, prereq: Prereq) -> bool {
        self.blocked_on(prereq).is_some()
    }

    /// Descriptions of the failed prerequisites.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|failed| failed.describe.as_str())
    }
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.descriptions().collect();
        f.write_str(&names.join(", "))
    }
}

/// Deferred work of a statement.
pub trait InferenceAction: 'static {
    /// Run the action; every prerequisite is satisfied.
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()>;

    /// The phase ended with prerequisites still unsatisfied.
    fn prerequisite_failed(self: Box<Self>, stmt: Stmt<'_>, unresolved: &Unresolved) -> SourceError;
}

struct PendingAction {
    owner: ContextId,
    phase: Phase,
    requirements: Vec<Requirement>,
    action: Box<dyn InferenceAction>,
}

#[derive(Default)]
pub(crate) struct InferenceEngine {
    actions: Vec<PendingAction>,
    reservations: std::collections::HashMap<(ContextId, Phase), usize>,
}

impl InferenceEngine {
    pub fn reserved(&self, id: ContextId, phase: Phase) -> bool {
        self.reservations.get(&(id, phase)).is_some_and(|count| *count > 0)
    }

    pub fn pending_for(&self, phase: Phase) -> usize {
        self.actions.iter().filter(|action| action.phase == phase).count()
    }
}

impl BuildState {
    pub fn register_action(
        &mut self,
        builder: ActionBuilder,
        action: Box<dyn InferenceAction>,
    ) -> SourceResult<()> {
        trace!(
            owner = %builder.owner,
            phase = %builder.phase,
            prerequisites = builder.requirements.len(),
            "action registered"
        );
        self.engine.actions.push(PendingAction {
            owner: builder.owner,
            phase: builder.phase,
            requirements: builder.requirements,
            action,
        });
        Ok(())
    }

    /// Run actions of the current phase until no further progress is made.
    pub fn run_fixpoint(&mut self) -> Result<(), ReactorError> {
        let phase = self.phase;
        let mut rounds = 0usize;
        loop {
            rounds += 1;
            self.refresh_requirements(phase)?;
            if self.apply_ready(phase)? {
                continue;
            }
            if self.complete_roots(phase) {
                continue;
            }
            break;
        }
        debug!(
            phase = %phase,
            rounds,
            pending = self.engine.pending_for(phase),
            "fixpoint reached"
        );
        self.fail_pending(phase)
    }

    fn refresh_requirements(&mut self, phase: Phase) -> Result<(), ReactorError> {
        let mut actions = mem::take(&mut self.engine.actions);
        let mut violation = None;
        'actions: for action in actions.iter_mut().filter(|action| action.phase == phase) {
            for requirement in action.requirements.iter_mut().filter(|r| r.found.is_none()) {
                let Some(found) = (requirement.find)(self.stmt(action.owner)) else {
                    continue;
                };
                requirement.found = Some(found);
                if requirement.kind == RequirementKind::Mutation {
                    if self.ctx(found).has_completed(requirement.phase) {
                        violation = Some(SourceError::internal(
                            self.ctx(action.owner).location.clone(),
                            format!(
                                "mutation of {} registered after it completed {}",
                                requirement.describe, requirement.phase
                            ),
                        ));
                        break 'actions;
                    }
                    *self.engine.reservations.entry((found, requirement.phase)).or_default() += 1;
                }
            }
        }
        actions.append(&mut self.engine.actions);
        self.engine.actions = actions;
        match violation {
            Some(error) => Err(ReactorError::Internal(error)),
            None => Ok(()),
        }
    }

    fn is_ready(&self, action: &PendingAction) -> bool {
        action.requirements.iter().all(|requirement| match requirement.found {
            None => false,
            Some(found) => match requirement.kind {
                RequirementKind::Completed => self.ctx(found).has_completed(requirement.phase),
                RequirementKind::Mutation => true,
            },
        })
    }

    /// Apply every ready action of `phase`; returns whether any was applied.
    fn apply_ready(&mut self, phase: Phase) -> Result<bool, ReactorError> {
        let mut applied = false;
        let mut index = 0;
        while index < self.engine.actions.len() {
            let candidate = &self.engine.actions[index];
            if candidate.phase != phase || !self.is_ready(candidate) {
                index += 1;
                continue;
            }
            let action = self.engine.actions.remove(index);
            self.apply_action(action)?;
            self.run_fresh_hooks()?;
            applied = true;
        }
        Ok(applied)
    }

    fn apply_action(&mut self, action: PendingAction) -> Result<(), ReactorError> {
        let PendingAction {
            owner,
            requirements,
            action,
            ..
        } = action;
        self.release(&requirements);
        let Some(found) = requirements.iter().map(|requirement| requirement.found).collect() else {
            return Err(ReactorError::Internal(SourceError::internal(
                self.ctx(owner).location.clone(),
                "action applied with unresolved prerequisites",
            )));
        };
        let resolved = Resolved { found };
        trace!(owner = %owner, "applying action");
        let result = action.apply(&mut StmtMut::new(self, owner), &resolved);
        match result {
            Ok(()) => Ok(()),
            Err(error) => self.report(error),
        }
    }

    fn release(&mut self, requirements: &[Requirement]) {
        for requirement in requirements {
            if requirement.kind != RequirementKind::Mutation {
                continue;
            }
            let Some(found) = requirement.found else { continue };
            if let Some(count) = self.engine.reservations.get_mut(&(found, requirement.phase)) {
                *count = count.saturating_sub(1);
            }
        }
    }

    /// Complete `phase` wherever possible; returns whether anything changed.
    fn complete_roots(&mut self, phase: Phase) -> bool {
        let mut progressed = false;
        for root in self.roots() {
            self.try_complete(root, phase, &mut progressed);
        }
        progressed
    }

    /// A statement completes a phase once its hooks ran, nothing reserves it,
    /// and all of its children completed.
    fn try_complete(&mut self, id: ContextId, phase: Phase, progressed: &mut bool) -> bool {
        if self.ctx(id).has_completed(phase) {
            return true;
        }
        let mut complete = self.ctx(id).hooks_reached(phase.min(Phase::FullDeclaration))
            && !self.engine.reserved(id, phase);
        for child in self.ctx(id).child_ids() {
            complete &= self.try_complete(child, phase, progressed);
        }
        if complete {
            self.ctx_mut(id).completed = Some(phase);
            *progressed = true;
        }
        complete
    }

    /// Turn actions of `phase` that never became ready into diagnostics.
    fn fail_pending(&mut self, phase: Phase) -> Result<(), ReactorError> {
        let (failed, remaining): (Vec<_>, Vec<_>) =
            mem::take(&mut self.engine.actions)
                .into_iter()
                .partition(|action| action.phase == phase);
        self.engine.actions = remaining;

        for pending in failed {
            self.release(&pending.requirements);
            let unresolved = Unresolved {
                failed: pending
                    .requirements
                    .iter()
                    .enumerate()
                    .filter(|(_, requirement)| match requirement.found {
                        None => true,
                        Some(found) => {
                            requirement.kind == RequirementKind::Completed
                                && !self.ctx(found).has_completed(requirement.phase)
                        }
                    })
                    .map(|(index, requirement)| FailedPrereq {
                        prereq: Prereq(index),
                        describe: requirement.describe.clone(),
                        found: requirement.found,
                    })
                    .collect(),
            };
            debug!(owner = %pending.owner, waiting_for = %unresolved, "action failed");
            let error = pending
                .action
                .prerequisite_failed(self.stmt(pending.owner), &unresolved);
            self.report(error)?;
        }
        Ok(())
    }
}
