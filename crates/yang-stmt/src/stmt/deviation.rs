//! `deviation` and `deviate`.
//!
//! # Design
//!
//! A deviation names an absolute schema node and carries one or more
//! `deviate` statements. Each `deviate` reserves the target in
//! EFFECTIVE_MODEL as soon as it exists and then edits it:
//!
//! - `not-supported` removes the target from the schema tree
//! - `add` copies properties onto it; singular properties must be absent
//! - `replace` swaps existing properties for the given ones (`config`,
//!   `mandatory`, `min-elements` and `max-elements` exist implicitly)
//! - `delete` drops properties whose keyword and argument both match
//!
//! Properties are copied as statements of the deviating module, so their
//! references resolve where the deviation was written.

use tracing::{trace, warn};
use yang_model::{Argument, CopyType, DeviateKind, EffectiveKind, SchemaNodeIdentifier};
use yang_reactor::{
    ContextId, CopyPolicy, EffectiveInput, ErrorKind, InferenceAction, ParseContext, Phase, Prereq,
    ReactorBuilder, Resolved, SourceError, SourceResult, StatementSupport, Stmt, StmtMut,
    SubstatementValidator, Unresolved,
};

use super::{documented, kw};
use crate::arguments;
use crate::resolve::resolve_absolute;

pub struct DeviationSupport {
    validator: SubstatementValidator,
}

impl DeviationSupport {
    pub fn new() -> Self {
        Self {
            validator: documented(SubstatementValidator::builder()).at_least_one("deviate").build(),
        }
    }
}

impl Default for DeviationSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for DeviationSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        let wrap = Argument::SchemaNodeId as fn(SchemaNodeIdentifier) -> Argument;
        let argument = arguments::parsed(raw, ctx, wrap)?;
        if let Argument::SchemaNodeId(id) = &argument {
            if !id.absolute {
                return Err(ctx.error(format!("deviation target '{id}' must be an absolute path")));
            }
        }
        if !ctx.parent.is_some_and(|parent| parent.is_root()) {
            return Err(ctx.error("deviation must appear at the top level of a module"));
        }
        Ok(argument)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        match input.stmt().argument() {
            Argument::SchemaNodeId(target) => Ok(EffectiveKind::Deviation(target.clone())),
            _ => Err(SourceError::internal(
                input.stmt().location().clone(),
                "deviation with an unparsed argument",
            )),
        }
    }
}

/// Properties that may appear only once on a node.
const SINGULAR: &[&str] = &["units", "config", "mandatory", "min-elements", "max-elements"];

/// Properties every node has even when not written.
const IMPLICIT: &[&str] = &["config", "mandatory", "min-elements", "max-elements"];

/// Node kinds a deviated property may be applied to.
fn valid_targets(property: &str) -> Option<&'static [&'static str]> {
    let targets: &'static [&'static str] = match property {
        "config" => &["container", "leaf", "leaf-list", "list", "choice", "anydata", "anyxml"],
        "default" => &["leaf", "leaf-list", "choice"],
        "mandatory" => &["leaf", "choice", "anydata", "anyxml"],
        "min-elements" | "max-elements" => &["list", "leaf-list"],
        "must" => &[
            "container",
            "leaf",
            "leaf-list",
            "list",
            "anydata",
            "anyxml",
            "notification",
            "input",
            "output",
        ],
        "type" | "units" => &["leaf", "leaf-list"],
        "unique" => &["list"],
        _ => return None,
    };
    Some(targets)
}

pub struct DeviateSupport {
    not_supported: SubstatementValidator,
    add: SubstatementValidator,
    replace: SubstatementValidator,
    delete: SubstatementValidator,
}

impl DeviateSupport {
    pub fn new() -> Self {
        let builder = SubstatementValidator::builder;
        Self {
            not_supported: SubstatementValidator::empty(),
            add: builder()
                .optional("config")
                .any("default")
                .optional("mandatory")
                .optional("max-elements")
                .optional("min-elements")
                .any("must")
                .any("unique")
                .optional("units")
                .build(),
            replace: builder()
                .optional("config")
                .optional("default")
                .optional("mandatory")
                .optional("max-elements")
                .optional("min-elements")
                .optional("type")
                .optional("units")
                .build(),
            delete: builder()
                .any("default")
                .any("must")
                .any("unique")
                .optional("units")
                .build(),
        }
    }

    fn validator_for(&self, kind: DeviateKind) -> &SubstatementValidator {
        match kind {
            DeviateKind::NotSupported => &self.not_supported,
            DeviateKind::Add => &self.add,
            DeviateKind::Replace => &self.replace,
            DeviateKind::Delete => &self.delete,
        }
    }
}

impl Default for DeviateSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for DeviateSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::parsed(raw, ctx, Argument::Deviate as fn(DeviateKind) -> Argument)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let Argument::Deviate(kind) = *view.argument() else {
            return Ok(());
        };
        let registry = view.registry();
        let errors = self.validator_for(kind).validate(
            view.keyword(),
            view.location(),
            view.written_children(),
            |keyword| registry.is_known(keyword),
        );
        let target = match view.parent().map(|parent| parent.argument()) {
            Some(Argument::SchemaNodeId(target)) => Some(target.clone()),
            _ => None,
        };
        if !errors.is_empty() {
            for error in errors {
                stmt.report(error);
            }
            return Ok(());
        }
        let Some(target) = target else {
            return Ok(());
        };

        let mut action = stmt.new_inference_action(Phase::EffectiveModel)?;
        let steps = target.steps.clone();
        let found = action.mutates_found(
            format!("deviation target '{target}'"),
            Phase::EffectiveModel,
            move |deviate| resolve_absolute(deviate, &steps).map(|node| node.id()),
        );
        stmt.apply_action(action, ApplyDeviate { kind, target, found })
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        match input.stmt().argument() {
            Argument::Deviate(kind) => Ok(EffectiveKind::Deviate(*kind)),
            _ => Err(SourceError::internal(
                input.stmt().location().clone(),
                "deviate with an unparsed argument",
            )),
        }
    }
}

/// One planned change to the target: statements to drop, then a property
/// to copy in.
struct Edit {
    remove: Vec<ContextId>,
    add: Option<ContextId>,
}

struct ApplyDeviate {
    kind: DeviateKind,
    target: SchemaNodeIdentifier,
    found: Prereq,
}

impl ApplyDeviate {
    fn plan(&self, deviate: Stmt<'_>, target: Stmt<'_>) -> (Vec<Edit>, Vec<SourceError>) {
        let mut edits = Vec::new();
        let mut errors = Vec::new();
        let path = &self.target;
        for property in deviate.children().filter(|property| !property.is_unsupported()) {
            let keyword = property.keyword();
            let core = !keyword.is_extension();
            let allowed = valid_targets(&keyword.name)
                .map_or(true, |targets| targets.iter().any(|name| target.keyword().is(name)));
            if core && !allowed {
                errors.push(property.error(
                    ErrorKind::InvalidStatement,
                    format!("'{path}' is not a valid deviation target for '{keyword}'"),
                ));
                continue;
            }

            let existing: Vec<Stmt<'_>> = target
                .children()
                .filter(|child| child.keyword() == keyword && !child.is_unsupported())
                .collect();
            match self.kind {
                DeviateKind::NotSupported => {}
                DeviateKind::Add => {
                    let singular = SINGULAR.iter().any(|name| keyword.is(name))
                        || (keyword.is("default") && target.keyword().is("leaf"));
                    if core && singular && !existing.is_empty() {
                        errors.push(property.error(
                            ErrorKind::InvalidStatement,
                            format!(
                                "deviation cannot add '{keyword}' to '{path}': already defined"
                            ),
                        ));
                    } else {
                        edits.push(Edit {
                            remove: Vec::new(),
                            add: Some(property.id()),
                        });
                    }
                }
                DeviateKind::Replace => {
                    if keyword.is("default") && target.keyword().is("leaf-list") {
                        warn!(
                            target = %path,
                            location = %property.location(),
                            "a leaf-list default cannot be replaced, ignoring"
                        );
                    } else if existing.is_empty() && !IMPLICIT.iter().any(|name| keyword.is(name)) {
                        errors.push(property.error(
                            ErrorKind::InvalidStatement,
                            format!(
                                "deviation cannot replace '{keyword}' in '{path}': not defined"
                            ),
                        ));
                    } else {
                        edits.push(Edit {
                            remove: existing.iter().map(|child| child.id()).collect(),
                            add: Some(property.id()),
                        });
                    }
                }
                DeviateKind::Delete => {
                    let matching = existing
                        .iter()
                        .find(|child| child.raw_argument() == property.raw_argument());
                    match matching {
                        Some(child) => edits.push(Edit {
                            remove: vec![child.id()],
                            add: None,
                        }),
                        None => warn!(
                            target = %path,
                            keyword = %keyword,
                            argument = property.raw_argument().unwrap_or_default(),
                            "nothing to delete"
                        ),
                    }
                }
            }
        }
        (edits, errors)
    }
}

impl InferenceAction for ApplyDeviate {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        let node = resolved.get(self.found);
        if self.kind == DeviateKind::NotSupported {
            trace!(target = %self.target, "deviated to not supported");
            return stmt.at(node).set_unsupported();
        }

        let view = stmt.view();
        let target = view.at(node);
        let module_root = target.module_root().id();
        let (edits, errors) = self.plan(view, target);

        for edit in edits {
            for existing in edit.remove {
                stmt.remove(existing)?;
            }
            if let Some(property) = edit.add {
                stmt.copy_as_child(property, node, CopyType::Original, module_root)?;
            }
        }
        for error in errors {
            stmt.report(error);
        }
        trace!(target = %self.target, kind = %self.kind, "deviation applied");
        Ok(())
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        _unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(
            ErrorKind::UnresolvedReference,
            format!("deviation target '{}' not found", self.target),
        )
    }
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    builder
        .add_statement_support(Phase::FullDeclaration, kw("deviation"), DeviationSupport::new())
        .add_statement_support(Phase::FullDeclaration, kw("deviate"), DeviateSupport::new())
}
