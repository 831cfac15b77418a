//! `extension` definitions and the opaque support for statements without a
//! dedicated one.
//!
//! Extension instances (`prefix:keyword`) with no registered support, and
//! core keywords nobody registered under the lenient policy, are kept as
//! [`UnknownEffective`] statements. When the keyword names an `extension`
//! the source can see through its imports, the definition is recorded.
//! Under the strict policy an instance of an extension its module does not
//! define is an unknown statement.

use yang_model::{Argument, EffectiveKind, ExtensionEffective, Keyword, QName, UnknownEffective};
use yang_reactor::{
    CopyPolicy, EffectiveInput, ErrorKind, ParseContext, Phase, ReactorBuilder, SelfKey,
    SourceError, SourceResult, StatementSupport, Stmt, StmtMut, SubstatementValidator,
    UnknownStatementPolicy,
};

use super::{kw, with_status};
use crate::arguments;
use crate::namespaces::{ExtensionNs, ModuleQNameNs, PrefixToModuleNs};
use crate::resolve::module_qname;

pub struct ExtensionSupport {
    validator: SubstatementValidator,
}

impl ExtensionSupport {
    pub fn new() -> Self {
        Self {
            validator: with_status(SubstatementValidator::builder()).optional("argument").build(),
        }
    }
}

impl Default for ExtensionSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for ExtensionSupport {
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
        let Some(name) = view.raw_argument().map(str::to_string) else {
            return Ok(());
        };
        let (root, id) = (view.root().id(), stmt.id());
        stmt.add_to_ns_at::<ExtensionNs>(root, name, id)
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        let Some(module) = module_qname(stmt) else {
            return Err(SourceError::internal(
                stmt.location().clone(),
                "extension without a module identity",
            ));
        };
        let argument = input.substatement("argument");
        Ok(EffectiveKind::Extension(ExtensionEffective {
            qname: QName::new(module, stmt.raw_argument().unwrap_or_default()),
            argument: argument
                .and_then(|argument| argument.argument().as_str())
                .map(str::to_string),
            yin_element: argument
                .and_then(|argument| argument.find_first("yin-element"))
                .and_then(|yin| yin.argument().as_bool())
                .unwrap_or(false),
        }))
    }
}

/// Opaque statement: argument kept as text, substatements kept as written.
pub struct UnknownStatementSupport;

/// The `extension` statement defining `keyword`, when the source of `stmt`
/// imports (or is) the module that declares it.
pub fn extension_definition(stmt: Stmt<'_>, keyword: &Keyword) -> Option<QName> {
    let module = keyword.module.as_deref()?;
    let origin = stmt.original();
    let roots = origin.bindings::<PrefixToModuleNs>()?;
    roots.values().find_map(|binding| {
        let root = origin.at(binding.value);
        if root.raw_argument() != Some(module) || !root.keyword().is("module") {
            return None;
        }
        root.lookup::<ExtensionNs>(&keyword.name)?;
        let qname_module = root.lookup::<ModuleQNameNs>(&SelfKey)?;
        Some(QName::new(qname_module.clone(), keyword.name.clone()))
    })
}

impl StatementSupport for UnknownStatementSupport {
    fn parse_argument(&self, raw: Option<&str>, _ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        Ok(raw.map_or(Argument::None, |raw| Argument::String(raw.to_string())))
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::SchemaTree
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let keyword = view.keyword();
        let Some(module) = keyword.module.as_deref() else {
            return Ok(());
        };
        if view.config().unknown_statements != UnknownStatementPolicy::Strict
            || extension_definition(view, keyword).is_some()
        {
            return Ok(());
        }
        Err(view.error(
            ErrorKind::UnknownStatement,
            format!("extension '{}' is not defined by module '{module}'", keyword.name),
        ))
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        Ok(EffectiveKind::Unknown(UnknownEffective {
            keyword: stmt.keyword().clone(),
            argument: stmt.raw_argument().map(str::to_string),
            definition: extension_definition(stmt, stmt.keyword()),
        }))
    }
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    builder
        .add_statement_support(Phase::StatementDefinition, kw("extension"), ExtensionSupport::new())
        .add_statement_support(
            Phase::StatementDefinition,
            kw("argument"),
            super::meta::PropertySupport::new(arguments::identifier)
                .with_validator(SubstatementValidator::builder().optional("yin-element").build()),
        )
        .unknown_statement_support(UnknownStatementSupport)
}
