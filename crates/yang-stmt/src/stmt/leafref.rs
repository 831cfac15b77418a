//! Leafref `path` resolution.
//!
//! The target of a path is looked up once the whole schema tree exists, in
//! EFFECTIVE_MODEL: absolute paths start at the top level of the module the
//! first step's prefix names, relative ones climb from the referring leaf.
//! Paths inside groupings and augment bodies are templates and are only
//! resolved where they are instantiated. Relative paths in typedefs have no
//! referring leaf and are left unresolved.

use tracing::trace;
use yang_model::{Argument, PathExpression};
use yang_reactor::{
    ContextId, ErrorKind, InferenceAction, ParseContext, Phase, Prereq, ReactorBuilder, Resolved,
    SelfKey, SourceError, SourceResult, StatementSupport, Stmt, StmtMut, Unresolved,
};

use super::kw;
use crate::arguments;
use crate::namespaces::LeafrefTargetNs;
use crate::resolve::{
    data_parent, find_data_child, in_template, module_root_of, prefix_module, step_qname,
};

pub struct PathSupport;

fn path(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    arguments::parsed(raw, ctx, Argument::Path as fn(PathExpression) -> Argument)
}

fn is_leaf(stmt: Stmt<'_>) -> bool {
    stmt.keyword().is("leaf") || stmt.keyword().is("leaf-list")
}

/// Leaf or leaf-list `path` points to, seen from the path statement.
pub fn resolve_path<'a>(stmt: Stmt<'a>, path: &PathExpression) -> Option<Stmt<'a>> {
    let start = if path.absolute {
        let first = path.steps.first()?;
        let module = prefix_module(stmt, first.prefix.as_deref())?;
        stmt.at(module_root_of(stmt, &module)?)
    } else {
        let mut node = stmt.ancestors().find(|ancestor| is_leaf(*ancestor))?;
        for _ in 0..path.parents {
            node = data_parent(node)?;
        }
        node
    };
    let target = path.steps.iter().try_fold(start, |current, step| {
        let qname = step_qname(stmt, step)?;
        find_data_child(current, &qname)
    })?;
    is_leaf(target).then_some(target)
}

impl PathSupport {
    fn register_resolution(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let Argument::Path(path) = view.argument().clone() else {
            return Ok(());
        };
        if in_template(view) {
            return Ok(());
        }
        if !path.absolute && view.ancestors().any(|ancestor| ancestor.keyword().is("typedef")) {
            return Ok(());
        }

        let mut action = stmt.new_inference_action(Phase::EffectiveModel)?;
        let wanted = path.clone();
        let target = action.requires_ctx(
            format!("leafref path '{path}'"),
            Phase::FullDeclaration,
            move |stmt| resolve_path(stmt, &wanted).map(|target| target.id()),
        );
        // The target binding is written onto this statement.
        action.mutates_ctx(stmt.id(), Phase::EffectiveModel);
        stmt.apply_action(action, ResolveLeafref { path, target })
    }
}

impl StatementSupport for PathSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        path(raw, ctx)
    }

    fn on_statement_added(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        if stmt.view().is_copy() {
            self.register_resolution(stmt)
        } else {
            Ok(())
        }
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        self.register_resolution(stmt)
    }
}

struct ResolveLeafref {
    path: PathExpression,
    target: Prereq,
}

impl InferenceAction for ResolveLeafref {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        let target: ContextId = resolved.get(self.target);
        trace!(path = %self.path, target = %target, "leafref resolved");
        stmt.add_to_ns::<LeafrefTargetNs>(SelfKey, target)
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        _unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(
            ErrorKind::UnresolvedReference,
            format!("leafref path '{}' does not point to a leaf or leaf-list", self.path),
        )
    }
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    builder.add_statement_support(Phase::StatementDefinition, kw("path"), PathSupport)
}
