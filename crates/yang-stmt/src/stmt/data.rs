//! Schema tree nodes: data nodes, choices and cases, and operations.
//!
//! Every schema node binds itself in its parent's [`SchemaTreeNs`] when it is
//! attached, including when it is attached as a copy, so expansion sites see
//! the instantiated names.

use yang_model::{Argument, EffectiveKind, QName, SchemaNodeEffective, SchemaNodeKind};
use yang_reactor::{
    Cardinality, CopyPolicy, EffectiveInput, ErrorKind, ParseContext, Phase, ReactorBuilder,
    SourceError, SourceResult, StatementSupport, Stmt, StmtMut, SubstatementValidator,
    ValidatorBuilder,
};

use super::{data_body, kw, with_status, DATA_DEFS};
use crate::arguments;
use crate::namespaces::SchemaTreeNs;
use crate::resolve::{effective_config, node_qname};

/// Nodes a choice accepts without an explicit `case`.
const SHORTHAND_CASES: &[&str] = &[
    "container",
    "leaf",
    "leaf-list",
    "list",
    "choice",
    "anydata",
    "anyxml",
];

pub struct SchemaNodeSupport {
    kind: SchemaNodeKind,
    validator: SubstatementValidator,
}

fn conditional(builder: ValidatorBuilder) -> ValidatorBuilder {
    with_status(builder).optional("when").any("if-feature")
}

fn validator_for(kind: SchemaNodeKind) -> SubstatementValidator {
    let builder = SubstatementValidator::builder();
    let builder = match kind {
        SchemaNodeKind::Container => data_body(conditional(builder))
            .optional("presence")
            .optional("config")
            .any("must"),
        SchemaNodeKind::Leaf => conditional(builder)
            .mandatory("type")
            .optional("units")
            .optional("default")
            .optional("config")
            .optional("mandatory")
            .any("must"),
        SchemaNodeKind::LeafList => conditional(builder)
            .mandatory("type")
            .optional("units")
            .any("default")
            .optional("config")
            .optional("min-elements")
            .optional("max-elements")
            .optional("ordered-by")
            .any("must"),
        SchemaNodeKind::List => data_body(conditional(builder))
            .optional("key")
            .any("unique")
            .optional("config")
            .optional("min-elements")
            .optional("max-elements")
            .optional("ordered-by")
            .any("must"),
        SchemaNodeKind::Choice => conditional(builder)
            .optional("default")
            .optional("config")
            .optional("mandatory")
            .any("case")
            .all(SHORTHAND_CASES, Cardinality::Any),
        SchemaNodeKind::Case => conditional(builder).all(DATA_DEFS, Cardinality::Any),
        SchemaNodeKind::Anydata | SchemaNodeKind::Anyxml => conditional(builder)
            .optional("config")
            .optional("mandatory")
            .any("must"),
        SchemaNodeKind::Rpc | SchemaNodeKind::Action => with_status(builder)
            .any("if-feature")
            .optional("input")
            .optional("output")
            .any("typedef")
            .any("grouping"),
        SchemaNodeKind::Input | SchemaNodeKind::Output => data_body(builder).any("must"),
        SchemaNodeKind::Notification => {
            data_body(with_status(builder)).any("if-feature").any("must")
        }
    };
    builder.build()
}

impl SchemaNodeSupport {
    pub fn new(kind: SchemaNodeKind) -> Self {
        Self {
            kind,
            validator: validator_for(kind),
        }
    }

    fn takes_argument(&self) -> bool {
        !matches!(self.kind, SchemaNodeKind::Input | SchemaNodeKind::Output)
    }

    fn check_config(&self, stmt: Stmt<'_>) -> SourceResult<()> {
        if !self.kind.is_data_node() {
            return Ok(());
        }
        let explicit = stmt.first_child("config").and_then(|config| config.argument().as_bool());
        let inherited = stmt.parent().and_then(effective_config);
        if explicit == Some(true) && inherited == Some(false) {
            let config = stmt.first_child("config").unwrap_or(stmt);
            return Err(config.error(
                ErrorKind::InvalidStatement,
                format!(
                    "{} '{}' cannot be config true under a node with config false",
                    self.kind.keyword(),
                    stmt.raw_argument().unwrap_or_default()
                ),
            ));
        }
        Ok(())
    }

    fn keys(&self, input: &EffectiveInput<'_, '_>, qname: &QName) -> SourceResult<Vec<QName>> {
        let Some(Argument::Keys(names)) = input.substatement("key").map(|key| key.argument()) else {
            return Ok(Vec::new());
        };
        names
            .iter()
            .map(|name| {
                let defined = input.substatements().iter().any(|child| {
                    child
                        .schema_node()
                        .is_some_and(|node| {
                            node.node == SchemaNodeKind::Leaf && node.qname.local_name == *name
                        })
                });
                if defined {
                    Ok(QName::new(qname.module.clone(), name.clone()))
                } else {
                    Err(input.error(
                        ErrorKind::InvalidStatement,
                        format!("key leaf '{name}' is not defined in list '{}'", qname.local_name),
                    ))
                }
            })
            .collect()
    }
}

impl StatementSupport for SchemaNodeSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        if self.takes_argument() {
            arguments::identifier(raw, ctx)
        } else {
            arguments::none(raw, ctx)
        }
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::SchemaTree
    }

    fn on_statement_added(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let (Some(parent), Some(qname)) = (view.parent(), node_qname(view)) else {
            return Ok(());
        };
        let (parent, id) = (parent.id(), stmt.id());
        stmt.add_to_ns_at::<SchemaTreeNs>(parent, qname, id)
    }

    fn shares_prototype(&self, copy: Stmt<'_>, prototype: Stmt<'_>) -> bool {
        // Leafref targets and inherited config depend on where the copy sits.
        !contains_leafref(copy) && effective_config(copy) == effective_config(prototype)
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        let Some(qname) = node_qname(stmt) else {
            return Err(SourceError::internal(
                stmt.location().clone(),
                "schema node without a module identity",
            ));
        };
        self.check_config(stmt)?;

        let facets = yang_model::Facets::collect(input.substatements());
        let min_elements = match input.substatement("min-elements").map(|min| min.argument()) {
            Some(Argument::Unsigned(min)) => *min,
            _ => 0,
        };
        let type_definition = if self.kind.is_typed() {
            input.substatement("type").and_then(|ty| ty.type_definition().cloned())
        } else {
            None
        };
        let keys = match self.kind {
            SchemaNodeKind::List => self.keys(input, &qname)?,
            _ => Vec::new(),
        };

        Ok(EffectiveKind::SchemaNode(SchemaNodeEffective {
            qname,
            node: self.kind,
            config: effective_config(stmt),
            mandatory: facets.mandatory.unwrap_or(false) || min_elements > 0,
            type_definition,
            keys,
        }))
    }
}

/// Whether a leafref `path` appears anywhere under `stmt`.
fn contains_leafref(stmt: Stmt<'_>) -> bool {
    stmt.children()
        .any(|child| child.keyword().is("path") || contains_leafref(child))
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    use SchemaNodeKind::*;
    [
        Container,
        Leaf,
        LeafList,
        List,
        Choice,
        Case,
        Anydata,
        Anyxml,
        Rpc,
        Action,
        Input,
        Output,
        Notification,
    ]
    .into_iter()
    .fold(builder, |builder, kind| {
        builder.add_statement_support(
            Phase::StatementDefinition,
            kw(kind.keyword()),
            SchemaNodeSupport::new(kind),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_requires_type() {
        let validator = validator_for(SchemaNodeKind::Leaf);
        assert_eq!(validator.cardinality("type"), Some(Cardinality::Mandatory));
        assert_eq!(validator.cardinality("key"), None);
    }

    #[test]
    fn test_choice_accepts_shorthand_but_not_uses() {
        let validator = validator_for(SchemaNodeKind::Choice);
        assert_eq!(validator.cardinality("leaf"), Some(Cardinality::Any));
        assert_eq!(validator.cardinality("case"), Some(Cardinality::Any));
        assert_eq!(validator.cardinality("uses"), None);
    }

    #[test]
    fn test_operations_take_no_config() {
        for kind in [SchemaNodeKind::Rpc, SchemaNodeKind::Input, SchemaNodeKind::Notification] {
            assert_eq!(validator_for(kind).cardinality("config"), None, "{kind:?}");
        }
    }
}
