//! RFC 8040 `yang-data` support.
//!
//! `rc:yang-data` defines a data template outside the schema tree and is
//! only meaningful at the top level of a module or submodule. Every instance
//! binds its name in [`YangDataNs`] first; instances found anywhere else are
//! then marked unsupported and dropped from the effective model. The binding
//! stays, so a nested instance still claims its name.

use tracing::debug;
use yang_model::{Argument, EffectiveKind, ExtensionInstance, Keyword};
use yang_reactor::{
    CopyPolicy, EffectiveInput, ParseContext, Phase, ReactorBuilder, SourceResult, StatementSupport,
    StmtMut, SubstatementValidator,
};

use crate::arguments;
use crate::namespaces::YangDataNs;

/// Module defining the `yang-data` extension.
pub const IETF_RESTCONF: &str = "ietf-restconf";

pub fn yang_data_keyword() -> Keyword {
    Keyword::extension(IETF_RESTCONF, "yang-data")
}

pub struct YangDataSupport {
    validator: SubstatementValidator,
}

impl YangDataSupport {
    pub fn new() -> Self {
        let validator = SubstatementValidator::builder()
            .optional("container")
            .any("uses")
            .optional("choice")
            .build();
        Self { validator }
    }
}

impl Default for YangDataSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for YangDataSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::identifier(raw, ctx)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let Some(name) = view.raw_argument().map(str::to_string) else {
            return Ok(());
        };
        let top_level = view.parent().is_some_and(|parent| parent.is_root());
        let id = stmt.id();
        stmt.add_to_ns::<YangDataNs>(name.clone(), id)?;
        if !top_level {
            debug!(
                yang_data = %name,
                location = %stmt.view().location(),
                "yang-data outside the top level ignored"
            );
            stmt.set_unsupported()?;
        }
        Ok(())
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        Ok(EffectiveKind::ExtensionInstance(ExtensionInstance {
            definition: stmt.keyword().clone(),
            argument: stmt.raw_argument().map(str::to_string),
        }))
    }
}

/// Add `yang-data` support to a reactor under construction.
pub fn with_rfc8040(builder: ReactorBuilder) -> ReactorBuilder {
    builder
        .add_namespace::<YangDataNs>(Phase::FullDeclaration)
        .add_statement_support(Phase::FullDeclaration, yang_data_keyword(), YangDataSupport::new())
}
