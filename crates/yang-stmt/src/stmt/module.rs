//! Module linkage: `module`, `submodule` and the statements that tie sources
//! together.
//!
//! # Design
//!
//! In SOURCE_PRE_LINKAGE every module announces its identifier, namespace and
//! own prefix, and every import and `belongs-to` records the module *name*
//! behind its prefix so extension keywords can be resolved. In SOURCE_LINKAGE
//! imports, includes and `belongs-to` resolve the announced roots through
//! inference actions; a source may therefore import a module supplied after
//! it.

use tracing::debug;
use yang_model::{
    Argument, EffectiveKind, ImportEffective, ModuleEffective, Revision, SourceIdentifier,
    SubmoduleEffective, XmlNamespace, YangVersion,
};
use yang_reactor::{
    ContextId, CopyPolicy, EffectiveInput, ErrorKind, InferenceAction, ParseContext, Phase,
    PrefixToModuleNameNs, Prereq, ReactorBuilder, Resolved, SelfKey, SourceError, SourceResult,
    StatementSupport, Stmt, StmtMut, SubstatementValidator, Unresolved,
};

use super::meta::PropertySupport;
use super::{data_body, documented, kw};
use crate::arguments;
use crate::namespaces::{
    ImportTargetNs, IncludedSubmoduleNs, ModuleNs, ModuleQNameNs, NamespaceToModuleNs,
    PrefixToModuleNs, SubmoduleNs,
};
use crate::resolve::{find_by_identifier, find_module, source_identifier};

/// Statements allowed in the body of a module or submodule.
const BODY: &[&str] = &["extension", "feature", "identity", "augment", "rpc", "deviation"];

fn linkage_header(builder: yang_reactor::ValidatorBuilder) -> yang_reactor::ValidatorBuilder {
    documented(builder)
        .optional("yang-version")
        .optional("organization")
        .optional("contact")
        .any("import")
        .any("include")
        .any("revision")
}

fn body(builder: yang_reactor::ValidatorBuilder) -> yang_reactor::ValidatorBuilder {
    data_body(builder).all(BODY, yang_reactor::Cardinality::Any)
}

fn revision_date(stmt: Stmt<'_>) -> Option<Revision> {
    stmt.first_child("revision-date")
        .and_then(|date| date.argument().as_revision().cloned())
}

fn yang_version(input: &EffectiveInput<'_, '_>) -> YangVersion {
    match input.substatement("yang-version").map(|version| version.argument()) {
        Some(Argument::YangVersion(version)) => *version,
        _ => YangVersion::default(),
    }
}

fn own_qname_module(input: &EffectiveInput<'_, '_>) -> SourceResult<yang_model::QNameModule> {
    input
        .stmt()
        .lookup::<ModuleQNameNs>(&SelfKey)
        .cloned()
        .ok_or_else(|| {
            SourceError::internal(
                input.stmt().location().clone(),
                "module identity was never bound",
            )
        })
}

pub struct ModuleSupport {
    validator: SubstatementValidator,
}

impl ModuleSupport {
    pub fn new() -> Self {
        let validator = body(linkage_header(SubstatementValidator::builder()))
            .mandatory("namespace")
            .mandatory("prefix")
            .build();
        Self { validator }
    }
}

impl Default for ModuleSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for ModuleSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::identifier(raw, ctx)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_pre_linkage_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let id = stmt.id();
        let identifier = source_identifier(view);
        let Some(namespace) = view.first_child("namespace").and_then(|ns| match ns.argument() {
            Argument::Namespace(namespace) => Some(namespace.clone()),
            _ => None,
        }) else {
            return Err(view.error(
                ErrorKind::SubstatementValidation,
                format!(
                    "missing mandatory substatement 'namespace' in module '{}'",
                    identifier.name
                ),
            ));
        };
        let prefix = view.child_argument("prefix").map(str::to_string);
        let qname_module = yang_model::QNameModule::new(namespace, identifier.revision.clone());

        debug!(module = %identifier, namespace = %qname_module, "module declared");
        stmt.add_to_ns::<ModuleNs>(identifier.clone(), id)?;
        stmt.add_to_ns::<NamespaceToModuleNs>(qname_module.clone(), id)?;
        stmt.add_to_ns::<ModuleQNameNs>(SelfKey, qname_module)?;
        if let Some(prefix) = prefix {
            stmt.add_to_ns::<PrefixToModuleNs>(prefix.clone(), id)?;
            stmt.add_to_ns::<PrefixToModuleNameNs>(prefix, identifier.name)?;
        }
        Ok(())
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        let identifier = source_identifier(stmt);
        let qname_module = own_qname_module(input)?;
        let imports = input
            .substatements()
            .iter()
            .filter_map(|sub| match sub.kind() {
                EffectiveKind::Import(import) => Some(import.clone()),
                _ => None,
            })
            .collect();

        let mut included: Vec<(&str, ContextId)> = stmt
            .bindings::<IncludedSubmoduleNs>()
            .map(|bindings| {
                bindings
                    .iter()
                    .map(|(name, binding)| (name.as_str(), binding.value))
                    .collect()
            })
            .unwrap_or_default();
        included.sort_by(|left, right| left.0.cmp(right.0));
        let mut submodules = Vec::new();
        for (_, submodule) in included {
            if let Some(effective) = input.effective_of(submodule)? {
                submodules.push(effective);
            }
        }

        Ok(EffectiveKind::Module(ModuleEffective {
            name: identifier.name,
            qname_module,
            prefix: stmt.child_argument("prefix").unwrap_or_default().to_string(),
            yang_version: yang_version(input),
            revision: identifier.revision,
            imports,
            submodules,
        }))
    }
}

pub struct SubmoduleSupport {
    validator: SubstatementValidator,
}

impl SubmoduleSupport {
    pub fn new() -> Self {
        let validator = body(linkage_header(SubstatementValidator::builder()))
            .mandatory("belongs-to")
            .build();
        Self { validator }
    }
}

impl Default for SubmoduleSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for SubmoduleSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::identifier(raw, ctx)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_pre_linkage_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let identifier = source_identifier(stmt.view());
        debug!(submodule = %identifier, "submodule declared");
        let id = stmt.id();
        stmt.add_to_ns::<SubmoduleNs>(identifier, id)
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        let identifier = source_identifier(stmt);
        Ok(EffectiveKind::Submodule(SubmoduleEffective {
            name: identifier.name,
            revision: identifier.revision,
            belongs_to: stmt.child_argument("belongs-to").unwrap_or_default().to_string(),
            qname_module: own_qname_module(input)?,
        }))
    }
}

pub struct ImportSupport {
    validator: SubstatementValidator,
}

impl ImportSupport {
    pub fn new() -> Self {
        let validator = documented(SubstatementValidator::builder())
            .mandatory("prefix")
            .optional("revision-date")
            .build();
        Self { validator }
    }
}

impl Default for ImportSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for ImportSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::identifier(raw, ctx)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_pre_linkage_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let (Some(module), Some(prefix)) = (view.raw_argument(), view.child_argument("prefix"))
        else {
            return Ok(());
        };
        let (module, prefix) = (module.to_string(), prefix.to_string());
        stmt.add_to_ns::<PrefixToModuleNameNs>(prefix, module)
    }

    fn on_linkage_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let Some(prefix) = view.child_argument("prefix").map(str::to_string) else {
            return Ok(());
        };
        let requested =
            SourceIdentifier::new(view.raw_argument().unwrap_or_default(), revision_date(view));

        let mut action = stmt.new_inference_action(Phase::SourceLinkage)?;
        let wanted = requested.clone();
        let target = action.requires_ctx(
            format!("module '{requested}'"),
            Phase::SourcePreLinkage,
            move |stmt| find_module(stmt, &wanted.name, wanted.revision.as_ref()),
        );
        stmt.apply_action(
            action,
            ResolveImport {
                requested,
                prefix,
                target,
            },
        )
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        let Some(target) = stmt.lookup::<ImportTargetNs>(&SelfKey) else {
            return Err(SourceError::internal(stmt.location().clone(), "import was never resolved"));
        };
        Ok(EffectiveKind::Import(ImportEffective {
            module: source_identifier(stmt.at(*target)),
            prefix: stmt.child_argument("prefix").unwrap_or_default().to_string(),
        }))
    }
}

struct ResolveImport {
    requested: SourceIdentifier,
    prefix: String,
    target: Prereq,
}

impl InferenceAction for ResolveImport {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        let target = resolved.get(self.target);
        debug!(module = %self.requested, prefix = %self.prefix, "import resolved");
        stmt.add_to_ns::<ImportTargetNs>(SelfKey, target)?;
        stmt.add_to_ns::<PrefixToModuleNs>(self.prefix, target)
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        _unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(
            ErrorKind::UnresolvedReference,
            format!("imported module '{}' was not found", self.requested),
        )
    }
}

pub struct IncludeSupport {
    validator: SubstatementValidator,
}

impl IncludeSupport {
    pub fn new() -> Self {
        let validator = documented(SubstatementValidator::builder())
            .optional("revision-date")
            .build();
        Self { validator }
    }
}

impl Default for IncludeSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for IncludeSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::identifier(raw, ctx)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_linkage_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let requested =
            SourceIdentifier::new(view.raw_argument().unwrap_or_default(), revision_date(view));
        let including = view.root();
        let module = if including.keyword().is("submodule") {
            including.child_argument("belongs-to")
        } else {
            including.raw_argument()
        };
        let module = module.unwrap_or_default().to_string();

        let mut action = stmt.new_inference_action(Phase::SourceLinkage)?;
        let wanted = requested.clone();
        let target = action.requires_ctx(
            format!("submodule '{requested}'"),
            Phase::SourcePreLinkage,
            move |stmt| {
                find_by_identifier::<SubmoduleNs>(stmt, &wanted.name, wanted.revision.as_ref())
            },
        );
        stmt.apply_action(
            action,
            ResolveInclude {
                requested,
                module,
                target,
            },
        )
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        let name = stmt.raw_argument().unwrap_or_default();
        let identifier = stmt
            .lookup::<IncludedSubmoduleNs>(&name.to_string())
            .map(|submodule| source_identifier(stmt.at(*submodule)))
            .unwrap_or_else(|| SourceIdentifier::new(name, revision_date(stmt)));
        Ok(EffectiveKind::Include(identifier))
    }
}

struct ResolveInclude {
    requested: SourceIdentifier,
    /// Module the including source belongs to
    module: String,
    target: Prereq,
}

impl InferenceAction for ResolveInclude {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        let target = resolved.get(self.target);
        let belongs_to = stmt
            .view()
            .at(target)
            .child_argument("belongs-to")
            .unwrap_or_default()
            .to_string();
        if belongs_to != self.module {
            return Err(stmt.view().error(
                ErrorKind::InvalidStatement,
                format!(
                    "submodule '{}' belongs to '{belongs_to}', not to '{}'",
                    self.requested.name, self.module
                ),
            ));
        }
        debug!(submodule = %self.requested, module = %self.module, "include resolved");
        stmt.link_roots(target);
        stmt.add_to_ns::<IncludedSubmoduleNs>(self.requested.name, target)
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        _unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(
            ErrorKind::UnresolvedReference,
            format!("included submodule '{}' was not found", self.requested),
        )
    }
}

pub struct BelongsToSupport {
    validator: SubstatementValidator,
}

impl BelongsToSupport {
    pub fn new() -> Self {
        Self {
            validator: SubstatementValidator::builder().mandatory("prefix").build(),
        }
    }
}

impl Default for BelongsToSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for BelongsToSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::identifier(raw, ctx)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_pre_linkage_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let (Some(module), Some(prefix)) = (view.raw_argument(), view.child_argument("prefix"))
        else {
            return Ok(());
        };
        let (module, prefix) = (module.to_string(), prefix.to_string());
        stmt.add_to_ns::<PrefixToModuleNameNs>(prefix, module)
    }

    fn on_linkage_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let Some(prefix) = view.child_argument("prefix").map(str::to_string) else {
            return Ok(());
        };
        let module = view.raw_argument().unwrap_or_default().to_string();
        let submodule = view.root().raw_argument().unwrap_or_default().to_string();
        let root = view.root().id();

        let mut action = stmt.new_inference_action(Phase::SourceLinkage)?;
        let wanted = module.clone();
        let target = action.requires_ctx(
            format!("module '{module}'"),
            Phase::SourcePreLinkage,
            move |stmt| find_module(stmt, &wanted, None),
        );
        stmt.apply_action(
            action,
            ResolveBelongsTo {
                module,
                submodule,
                prefix,
                root,
                target,
            },
        )
    }
}

struct ResolveBelongsTo {
    module: String,
    submodule: String,
    prefix: String,
    /// Root of the submodule
    root: ContextId,
    target: Prereq,
}

impl InferenceAction for ResolveBelongsTo {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        let target = resolved.get(self.target);
        let Some(qname_module) = stmt.view().at(target).lookup::<ModuleQNameNs>(&SelfKey).cloned()
        else {
            return Err(SourceError::internal(
                stmt.view().location().clone(),
                format!("module '{}' completed pre-linkage without an identity", self.module),
            ));
        };
        stmt.add_to_ns_at::<ModuleQNameNs>(self.root, SelfKey, qname_module)?;
        stmt.add_to_ns::<PrefixToModuleNs>(self.prefix, target)?;
        stmt.link_roots(target);
        Ok(())
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        _unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(
            ErrorKind::UnresolvedReference,
            format!("module '{}' of submodule '{}' was not found", self.module, self.submodule),
        )
    }
}

fn namespace(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    arguments::parsed(raw, ctx, Argument::Namespace as fn(XmlNamespace) -> Argument)
}

fn revision(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    arguments::parsed(raw, ctx, Argument::Revision as fn(Revision) -> Argument)
}

fn version(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    arguments::parsed(raw, ctx, Argument::YangVersion as fn(YangVersion) -> Argument)
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    let phase = Phase::SourcePreLinkage;
    builder
        .add_statement_support(phase, kw("module"), ModuleSupport::new())
        .add_statement_support(phase, kw("submodule"), SubmoduleSupport::new())
        .add_statement_support(phase, kw("import"), ImportSupport::new())
        .add_statement_support(phase, kw("include"), IncludeSupport::new())
        .add_statement_support(phase, kw("belongs-to"), BelongsToSupport::new())
        .add_statement_support(phase, kw("namespace"), PropertySupport::new(namespace))
        .add_statement_support(phase, kw("prefix"), PropertySupport::new(arguments::identifier))
        .add_statement_support(phase, kw("yang-version"), PropertySupport::new(version))
        .add_statement_support(
            phase,
            kw("revision"),
            PropertySupport::new(revision)
                .with_validator(documented(SubstatementValidator::builder()).build()),
        )
        .add_statement_support(phase, kw("revision-date"), PropertySupport::new(revision))
}
