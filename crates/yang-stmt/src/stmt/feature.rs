//! `feature` and `if-feature`.
//!
//! Features referenced by an `if-feature` must exist. Whether they are
//! supported comes from [`ReactorConfig::supported_features`]: a statement
//! whose `if-feature` expression evaluates to false is pruned from the
//! effective model together with its subtree, and schema nodes a disabled
//! `uses` or `augment` copies are marked unsupported.
//!
//! [`ReactorConfig::supported_features`]: yang_reactor::ReactorConfig

use yang_model::{Argument, EffectiveKind, IfFeatureExpr, NodeStep, QName};
use yang_reactor::{
    ErrorKind, EffectiveInput, InferenceAction, ParseContext, Phase, PrefixToModuleNameNs,
    ReactorBuilder, Resolved, SourceError, SourceResult, StatementSupport, Stmt, StmtMut,
    SubstatementValidator, Unresolved,
};

use super::{kw, with_status};
use crate::arguments;
use crate::namespaces::FeatureNs;
use crate::resolve::{declaring_module_name, find_definition, module_qname, step_qname};

pub struct FeatureSupport {
    validator: SubstatementValidator,
}

impl FeatureSupport {
    pub fn new() -> Self {
        Self {
            validator: with_status(SubstatementValidator::builder()).any("if-feature").build(),
        }
    }
}

impl Default for FeatureSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for FeatureSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::identifier(raw, ctx)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn on_statement_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let Some(name) = view.raw_argument().map(str::to_string) else {
            return Ok(());
        };
        let (root, id) = (view.root().id(), stmt.id());
        stmt.add_to_ns_at::<FeatureNs>(root, name, id)
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        match module_qname(stmt) {
            Some(module) => Ok(EffectiveKind::Feature(QName::new(
                module,
                stmt.raw_argument().unwrap_or_default(),
            ))),
            None => Err(SourceError::internal(
                stmt.location().clone(),
                "feature without a module identity",
            )),
        }
    }
}

/// Name of the module a feature reference points into, as the feature set
/// of the configuration names it.
fn feature_module(stmt: Stmt<'_>, step: &NodeStep) -> Option<String> {
    match &step.prefix {
        Some(prefix) => stmt.original().lookup::<PrefixToModuleNameNs>(prefix).cloned(),
        None => declaring_module_name(stmt).map(str::to_string),
    }
}

/// Value of an `if-feature` statement under the configured feature set.
pub fn evaluate(stmt: Stmt<'_>, expr: &IfFeatureExpr) -> bool {
    let features = &stmt.config().supported_features;
    expr.evaluate(&mut |step| {
        feature_module(stmt, step).is_some_and(|module| features.is_enabled(&module, &step.name))
    })
}

/// Whether every `if-feature` of `stmt` holds.
pub fn is_enabled(stmt: Stmt<'_>) -> bool {
    stmt.children_named("if-feature").all(|if_feature| match if_feature.argument() {
        Argument::IfFeature(expr) => evaluate(if_feature, expr),
        _ => true,
    })
}

pub struct IfFeatureSupport;

fn if_feature(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    arguments::parsed(raw, ctx, Argument::IfFeature as fn(IfFeatureExpr) -> Argument)
}

impl StatementSupport for IfFeatureSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        if_feature(raw, ctx)
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let Argument::IfFeature(expr) = view.argument() else {
            return Ok(());
        };
        let mut references = Vec::new();
        for step in expr.features() {
            let Some(qname) = step_qname(view, step) else {
                return Err(view.error(
                    ErrorKind::UnresolvedReference,
                    format!("prefix of feature '{step}' is not bound to any module"),
                ));
            };
            references.push((step.to_string(), qname));
        }

        let mut action = stmt.new_inference_action(Phase::FullDeclaration)?;
        for (name, qname) in references {
            action.requires_ctx(
                format!("feature '{name}'"),
                Phase::StatementDefinition,
                move |stmt| find_definition::<FeatureNs>(stmt, &qname),
            );
        }
        stmt.apply_action(action, CheckFeatures)
    }

    fn prunes_parent(&self, stmt: Stmt<'_>) -> bool {
        match stmt.argument() {
            Argument::IfFeature(expr) => !evaluate(stmt, expr),
            _ => false,
        }
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        match input.stmt().argument() {
            Argument::IfFeature(expr) => Ok(EffectiveKind::IfFeature(expr.clone())),
            _ => Err(SourceError::internal(
                input.stmt().location().clone(),
                "if-feature with an unparsed argument",
            )),
        }
    }
}

/// Only checks that the referenced features exist.
struct CheckFeatures;

impl InferenceAction for CheckFeatures {
    fn apply(self: Box<Self>, _stmt: &mut StmtMut<'_>, _resolved: &Resolved) -> SourceResult<()> {
        Ok(())
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(ErrorKind::UnresolvedReference, format!("{unresolved} not found"))
    }
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    builder
        .add_statement_support(Phase::StatementDefinition, kw("feature"), FeatureSupport::new())
        .add_statement_support(Phase::StatementDefinition, kw("if-feature"), IfFeatureSupport)
}
