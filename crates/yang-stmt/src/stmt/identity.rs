//! `identity` and `base`.

use yang_model::{Argument, EffectiveKind, IdentityEffective, QName};
use yang_reactor::{
    EffectiveInput, ErrorKind, InferenceAction, ParseContext, Phase, Prereq, ReactorBuilder,
    Resolved, SelfKey, SourceError, SourceResult, StatementSupport, Stmt, StmtMut,
    SubstatementValidator, Unresolved,
};

use super::{kw, with_status};
use crate::arguments;
use crate::namespaces::{IdentityBaseNs, IdentityNs};
use crate::resolve::{find_definition, module_qname};

pub struct IdentitySupport {
    validator: SubstatementValidator,
}

impl IdentitySupport {
    pub fn new() -> Self {
        Self {
            validator: with_status(SubstatementValidator::builder())
                .any("if-feature")
                .any("base")
                .build(),
        }
    }
}

impl Default for IdentitySupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for IdentitySupport {
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
        stmt.add_to_ns_at::<IdentityNs>(root, name, id)
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        let Some(module) = module_qname(stmt) else {
            return Err(SourceError::internal(
                stmt.location().clone(),
                "identity without a module identity",
            ));
        };
        let bases = input
            .substatements()
            .iter()
            .filter_map(|sub| match sub.kind() {
                EffectiveKind::Base(base) => Some(base.clone()),
                _ => None,
            })
            .collect();
        Ok(EffectiveKind::Identity(IdentityEffective {
            qname: QName::new(module, stmt.raw_argument().unwrap_or_default()),
            bases,
        }))
    }
}

/// `base` of an identity or of an `identityref` type.
pub struct BaseSupport;

impl StatementSupport for BaseSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::qname(raw, ctx).map(Argument::QName)
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let Argument::QName(qname) = view.argument().clone() else {
            return Ok(());
        };
        let name = view.raw_argument().unwrap_or_default().to_string();
        // The identity being defined, when this base belongs to one.
        let defining = view
            .parent()
            .filter(|parent| parent.keyword().is("identity"))
            .map(|parent| parent.id());

        let mut action = stmt.new_inference_action(Phase::FullDeclaration)?;
        let identity = action.requires_ctx(
            format!("identity '{name}'"),
            Phase::StatementDefinition,
            move |stmt| find_definition::<IdentityNs>(stmt, &qname),
        );
        stmt.apply_action(
            action,
            ResolveBase {
                name,
                defining,
                identity,
            },
        )
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        match input.stmt().argument() {
            Argument::QName(qname) => Ok(EffectiveKind::Base(qname.clone())),
            _ => Err(SourceError::internal(
                input.stmt().location().clone(),
                "base with an unparsed argument",
            )),
        }
    }
}

struct ResolveBase {
    name: String,
    defining: Option<yang_reactor::ContextId>,
    identity: Prereq,
}

impl InferenceAction for ResolveBase {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        let identity = resolved.get(self.identity);
        if self.defining == Some(identity) {
            return Err(stmt.view().error(
                ErrorKind::InvalidStatement,
                format!("identity '{}' is derived from itself", self.name),
            ));
        }
        stmt.add_to_ns::<IdentityBaseNs>(SelfKey, identity)
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        _unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(ErrorKind::UnresolvedReference, format!("identity '{}' not found", self.name))
    }
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    builder
        .add_statement_support(Phase::StatementDefinition, kw("identity"), IdentitySupport::new())
        .add_statement_support(Phase::StatementDefinition, kw("base"), BaseSupport)
}
