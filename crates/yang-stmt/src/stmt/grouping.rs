//! `grouping`, `uses` and `refine`.
//!
//! # Design
//!
//! A `uses` waits in EFFECTIVE_MODEL until its grouping completed the phase,
//! which means every `uses` nested in the grouping has been expanded, then
//! copies the grouping's schema tree under its own parent. The parent is
//! reserved meanwhile so it cannot complete early. Copies are attributed to
//! the module containing the `uses`. A grouping that uses itself, directly
//! or through other groupings, never completes and is reported as circular.
//!
//! A `refine` becomes ready once the node it names exists under the parent,
//! i.e. after the expansion, and replaces or adds properties on that copy.

use tracing::trace;
use yang_model::{Argument, CopyType, EffectiveKind, QName, SchemaNodeIdentifier};
use yang_reactor::{
    ContextId, CopyPolicy, EffectiveInput, ErrorKind, InferenceAction, ParseContext, Phase, Prereq,
    ReactorBuilder, Resolved, SourceError, SourceResult, StatementSupport, Stmt, StmtMut,
    SubstatementValidator, Unresolved,
};

use super::feature::is_enabled;
use super::{data_body, kw, with_status};
use crate::arguments;
use crate::namespaces::GroupingNs;
use crate::resolve::{descend, find_definition, module_qname};

pub struct GroupingSupport {
    validator: SubstatementValidator,
}

impl GroupingSupport {
    pub fn new() -> Self {
        Self {
            validator: data_body(with_status(SubstatementValidator::builder())).build(),
        }
    }
}

impl Default for GroupingSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for GroupingSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::identifier(raw, ctx)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_statement_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let (Some(parent), Some(name)) = (view.parent(), view.raw_argument()) else {
            return Ok(());
        };
        let (parent, name, id) = (parent.id(), name.to_string(), stmt.id());
        stmt.add_to_ns_at::<GroupingNs>(parent, name, id)
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        match module_qname(stmt) {
            Some(module) => Ok(EffectiveKind::Grouping(QName::new(
                module,
                stmt.raw_argument().unwrap_or_default(),
            ))),
            None => Err(SourceError::internal(
                stmt.location().clone(),
                "grouping without a module identity",
            )),
        }
    }
}

pub struct UsesSupport {
    validator: SubstatementValidator,
}

impl UsesSupport {
    pub fn new() -> Self {
        let validator = with_status(SubstatementValidator::builder())
            .optional("when")
            .any("if-feature")
            .any("refine")
            .any("augment")
            .build();
        Self { validator }
    }
}

impl Default for UsesSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for UsesSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::qname(raw, ctx).map(Argument::QName)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let (Argument::QName(qname), Some(parent)) = (view.argument().clone(), view.parent()) else {
            return Ok(());
        };
        let name = view.raw_argument().unwrap_or_default().to_string();
        let parent = parent.id();

        let mut action = stmt.new_inference_action(Phase::EffectiveModel)?;
        let grouping = action.requires_ctx(
            format!("grouping '{name}'"),
            Phase::EffectiveModel,
            move |stmt| find_definition::<GroupingNs>(stmt, &qname),
        );
        action.mutates_ctx(parent, Phase::EffectiveModel);
        stmt.apply_action(action, ExpandUses { name, parent, grouping })
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        match input.stmt().argument() {
            Argument::QName(qname) => Ok(EffectiveKind::Uses(qname.clone())),
            _ => Err(SourceError::internal(
                input.stmt().location().clone(),
                "uses with an unparsed argument",
            )),
        }
    }
}

struct ExpandUses {
    name: String,
    parent: ContextId,
    grouping: Prereq,
}

impl InferenceAction for ExpandUses {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        let grouping = resolved.get(self.grouping);
        let view = stmt.view();
        let module_root = view.module_root().id();
        let enabled = is_enabled(view);
        let children: Vec<ContextId> = view
            .at(grouping)
            .children()
            .filter(|child| child.copy_policy() == CopyPolicy::SchemaTree)
            .map(|child| child.id())
            .collect();

        let mut copied = 0usize;
        for child in children {
            let Some(copy) =
                stmt.copy_as_child(child, self.parent, CopyType::AddedByUses, module_root)?
            else {
                continue;
            };
            if !enabled {
                stmt.at(copy).set_unsupported()?;
            }
            copied += 1;
        }
        trace!(grouping = %self.name, copied, enabled, "uses expanded");
        Ok(())
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        unresolved: &Unresolved,
    ) -> SourceError {
        let Some(grouping) = unresolved.blocked_on(self.grouping) else {
            return stmt.error(
                ErrorKind::UnresolvedReference,
                format!("grouping '{}' not found", self.name),
            );
        };
        if reaches_uses_cycle(stmt.at(grouping), &mut Vec::new()) {
            stmt.error(
                ErrorKind::InvalidStatement,
                format!("grouping '{}' is part of a circular uses chain", self.name),
            )
        } else {
            stmt.error(
                ErrorKind::UnresolvedReference,
                format!("grouping '{}' could not be expanded", self.name),
            )
        }
    }
}

/// Whether expanding `grouping` leads back into a grouping on `path`.
fn reaches_uses_cycle(grouping: Stmt<'_>, path: &mut Vec<ContextId>) -> bool {
    if path.contains(&grouping.id()) {
        return true;
    }
    path.push(grouping.id());
    let mut used = Vec::new();
    used_groupings(grouping, &mut used);
    let cyclic = used.into_iter().any(|target| reaches_uses_cycle(target, path));
    path.pop();
    cyclic
}

/// Groupings named by the `uses` statements in `stmt`'s subtree, nested
/// grouping definitions excluded.
fn used_groupings<'a>(stmt: Stmt<'a>, used: &mut Vec<Stmt<'a>>) {
    for child in stmt.children() {
        if child.keyword().is("grouping") {
            continue;
        }
        if child.keyword().is("uses") {
            if let Argument::QName(qname) = child.argument() {
                if let Some(target) = find_definition::<GroupingNs>(child, qname) {
                    used.push(child.at(target));
                }
            }
        }
        used_groupings(child, used);
    }
}

/// Properties a refine replaces on its target.
const REPLACED: &[&str] = &[
    "description",
    "reference",
    "config",
    "mandatory",
    "presence",
    "default",
    "min-elements",
    "max-elements",
];

/// Properties a refine adds to those of its target.
const ADDED: &[&str] = &["must", "if-feature"];

pub struct RefineSupport {
    validator: SubstatementValidator,
}

impl RefineSupport {
    pub fn new() -> Self {
        let validator = SubstatementValidator::builder()
            .optional("description")
            .optional("reference")
            .optional("config")
            .optional("mandatory")
            .optional("presence")
            .any("default")
            .optional("min-elements")
            .optional("max-elements")
            .any("must")
            .any("if-feature")
            .build();
        Self { validator }
    }
}

impl Default for RefineSupport {
    fn default() -> Self {
        Self::new()
    }
}

fn schema_node_id(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    let wrap = Argument::SchemaNodeId as fn(SchemaNodeIdentifier) -> Argument;
    let argument = arguments::parsed(raw, ctx, wrap)?;
    if let Argument::SchemaNodeId(id) = &argument {
        if id.absolute {
            return Err(ctx.error(format!("refine target '{id}' must be a descendant path")));
        }
    }
    Ok(argument)
}

impl StatementSupport for RefineSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        schema_node_id(raw, ctx)
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
        if !view.parent().is_some_and(|parent| parent.keyword().is("uses")) {
            return Ok(());
        }

        let mut action = stmt.new_inference_action(Phase::EffectiveModel)?;
        let steps = target.steps.clone();
        let found = action.mutates_found(
            format!("refine target '{target}'"),
            Phase::EffectiveModel,
            move |refine| {
                let site = refine.parent()?.parent()?;
                descend(site, &steps, refine).map(|node| node.id())
            },
        );
        stmt.apply_action(action, ApplyRefine { target, found })
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        match input.stmt().argument() {
            Argument::SchemaNodeId(id) => Ok(EffectiveKind::Refine(id.clone())),
            _ => Err(SourceError::internal(
                input.stmt().location().clone(),
                "refine with an unparsed argument",
            )),
        }
    }
}

struct ApplyRefine {
    target: SchemaNodeIdentifier,
    found: Prereq,
}

impl InferenceAction for ApplyRefine {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        let node = resolved.get(self.found);
        let view = stmt.view();
        let module_root = view.module_root().id();
        let target = view.at(node);

        let mut plan: Vec<(ContextId, Vec<ContextId>)> = Vec::new();
        let mut rejected = Vec::new();
        for property in view.children().filter(|property| !property.is_unsupported()) {
            let keyword = property.keyword();
            if keyword.is_extension() || ADDED.iter().any(|name| keyword.is(name)) {
                plan.push((property.id(), Vec::new()));
            } else if REPLACED.iter().any(|name| keyword.is(name)) {
                let replaced = target
                    .children()
                    .filter(|existing| existing.keyword() == keyword)
                    .map(|existing| existing.id())
                    .collect();
                plan.push((property.id(), replaced));
            } else {
                rejected.push(property.error(
                    ErrorKind::InvalidStatement,
                    format!("'{keyword}' cannot be refined"),
                ));
            }
        }

        for (property, replaced) in plan {
            for existing in replaced {
                stmt.remove(existing)?;
            }
            stmt.copy_as_child(property, node, CopyType::AddedByUses, module_root)?;
        }
        for error in rejected {
            stmt.report(error);
        }
        trace!(target = %self.target, "refine applied");
        Ok(())
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        _unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(
            ErrorKind::UnresolvedReference,
            format!("refine target '{}' not found", self.target),
        )
    }
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    builder
        .add_statement_support(Phase::StatementDefinition, kw("grouping"), GroupingSupport::new())
        .add_statement_support(Phase::FullDeclaration, kw("uses"), UsesSupport::new())
        .add_statement_support(Phase::FullDeclaration, kw("refine"), RefineSupport::new())
}
