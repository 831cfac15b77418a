//! `augment`, top-level and inside `uses`.
//!
//! An augment body is a template: once the augment itself completed
//! EFFECTIVE_MODEL (its own `uses` are expanded) its schema tree is copied
//! under the target node. The target is reserved as soon as it exists, so a
//! module being augmented cannot complete before the augmentation landed.

use tracing::trace;
use yang_model::{Argument, AugmentEffective, CopyType, EffectiveKind, SchemaNodeIdentifier};
use yang_reactor::{
    ContextId, CopyPolicy, EffectiveInput, ErrorKind, InferenceAction, ParseContext, Phase, Prereq,
    ReactorBuilder, Resolved, SourceError, SourceResult, StatementSupport, Stmt, StmtMut,
    SubstatementValidator, Unresolved,
};

use super::feature::is_enabled;
use super::{kw, with_status, DATA_DEFS};
use crate::arguments;
use crate::resolve::{descend, resolve_absolute};

pub struct AugmentSupport {
    validator: SubstatementValidator,
}

impl AugmentSupport {
    pub fn new() -> Self {
        let validator = with_status(SubstatementValidator::builder())
            .optional("when")
            .any("if-feature")
            .all(DATA_DEFS, yang_reactor::Cardinality::Any)
            .any("case")
            .any("action")
            .any("notification")
            .build();
        Self { validator }
    }
}

impl Default for AugmentSupport {
    fn default() -> Self {
        Self::new()
    }
}

/// Where an augment sits, which decides how its target path is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Directly under a module or submodule; absolute target
    TopLevel,
    /// Under a `uses`; descendant target relative to the uses' parent
    Uses,
}

fn placement(stmt: Stmt<'_>) -> Option<Placement> {
    let parent = stmt.parent()?;
    if parent.is_root() {
        Some(Placement::TopLevel)
    } else if parent.keyword().is("uses") {
        Some(Placement::Uses)
    } else {
        None
    }
}

fn target_of<'a>(
    augment: Stmt<'a>,
    placement: Placement,
    target: &SchemaNodeIdentifier,
) -> Option<Stmt<'a>> {
    match placement {
        Placement::TopLevel => resolve_absolute(augment, &target.steps),
        Placement::Uses => {
            let site = augment.parent()?.parent()?;
            descend(site, &target.steps, augment)
        }
    }
}

impl StatementSupport for AugmentSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        let wrap = Argument::SchemaNodeId as fn(SchemaNodeIdentifier) -> Argument;
        let argument = arguments::parsed(raw, ctx, wrap)?;
        let top_level = ctx.parent.is_some_and(|parent| parent.is_root());
        match &argument {
            Argument::SchemaNodeId(id) if id.absolute != top_level => Err(ctx.error(format!(
                "augment target '{id}' must be {} path here",
                if top_level { "an absolute" } else { "a descendant" }
            ))),
            _ => Ok(argument),
        }
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let Argument::SchemaNodeId(target) = view.argument().clone() else {
            return Ok(());
        };
        let Some(placement) = placement(view) else {
            return Err(view.error(
                ErrorKind::InvalidStatement,
                format!("augment '{target}' must appear at the top level or inside a uses"),
            ));
        };

        let id = stmt.id();
        let mut action = stmt.new_inference_action(Phase::EffectiveModel)?;
        action.requires_completed(id, Phase::EffectiveModel);
        let wanted = target.clone();
        let found = action.mutates_found(
            format!("augment target '{target}'"),
            Phase::EffectiveModel,
            move |augment| target_of(augment, placement, &wanted).map(|node| node.id()),
        );
        stmt.apply_action(action, ApplyAugment { target, placement, found })
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        match input.stmt().argument() {
            Argument::SchemaNodeId(target) => Ok(EffectiveKind::Augment(AugmentEffective {
                target: target.clone(),
            })),
            _ => Err(SourceError::internal(
                input.stmt().location().clone(),
                "augment with an unparsed argument",
            )),
        }
    }
}

struct ApplyAugment {
    target: SchemaNodeIdentifier,
    placement: Placement,
    found: Prereq,
}

impl InferenceAction for ApplyAugment {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        let node = resolved.get(self.found);
        let view = stmt.view();
        let module_root = view.module_root().id();
        let enabled = is_enabled(view);
        let copy_type = match self.placement {
            Placement::TopLevel => CopyType::AddedByAugmentation,
            Placement::Uses => CopyType::AddedByUsesAugmentation,
        };
        let children: Vec<ContextId> = view
            .children()
            .filter(|child| child.copy_policy() == CopyPolicy::SchemaTree)
            .map(|child| child.id())
            .collect();

        for child in children {
            let Some(copy) = stmt.copy_as_child(child, node, copy_type, module_root)? else {
                continue;
            };
            if !enabled {
                stmt.at(copy).set_unsupported()?;
            }
        }
        trace!(target = %self.target, enabled, "augment applied");
        Ok(())
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        unresolved: &Unresolved,
    ) -> SourceError {
        let message = if unresolved.is_missing(self.found) {
            format!("augment target '{}' not found", self.target)
        } else {
            format!("augment '{}' could not be completed: waiting for {unresolved}", self.target)
        };
        stmt.error(ErrorKind::UnresolvedReference, message)
    }
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    builder.add_statement_support(Phase::FullDeclaration, kw("augment"), AugmentSupport::new())
}
