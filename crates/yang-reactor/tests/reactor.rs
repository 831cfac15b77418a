//! Reactor behaviour exercised through a small toy vocabulary:
//!
//! - `module NAME`: root, binds itself by name
//! - `def NAME`: binds a definition by name, visible build-wide
//! - `ref NAME`: needs the definition to exist
//! - `node NAME`: plain container for other statements
//! - `copy NAME`: instantiates the definition's children into its parent

use yang_model::{
    statement, Argument, CopyType, EffectiveKind, EffectiveModel, Keyword, ModuleEffective,
    QNameModule, RawStatement, SourceLocation, YangVersion,
};
use yang_reactor::*;

namespace! { ToyModuleNs: String => ContextId, "module", Global }
namespace! { DefNs: String => ContextId, "definition", Global }
namespace! { ResolvedNs: SelfKey => ContextId, "resolved", StatementLocal }
namespace! { UnregisteredNs: String => u32, "unregistered", Global }
namespace! { StampNs: String => u32, "stamp", Global }

fn text_argument(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    Ok(Argument::Identifier(ctx.require(raw)?.to_string()))
}

struct ModuleSupport;

impl StatementSupport for ModuleSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        text_argument(raw, ctx)
    }

    fn on_pre_linkage_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let name = stmt.view().raw_argument().unwrap_or_default().to_string();
        let id = stmt.id();
        stmt.add_to_ns::<ToyModuleNs>(name, id)
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let name = input.stmt().raw_argument().unwrap_or_default().to_string();
        let namespace = format!("urn:toy:{name}").parse().unwrap();
        Ok(EffectiveKind::Module(ModuleEffective {
            prefix: name.clone(),
            name,
            qname_module: QNameModule::new(namespace, None),
            yang_version: YangVersion::V1,
            revision: None,
            imports: Vec::new(),
            submodules: Vec::new(),
        }))
    }
}

struct DefSupport;

impl StatementSupport for DefSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        text_argument(raw, ctx)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_statement_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let name = stmt.view().raw_argument().unwrap_or_default().to_string();
        let id = stmt.id();
        stmt.add_to_ns::<DefNs>(name, id)
    }
}

struct RefSupport;

struct ResolveRef {
    name: String,
    target: Prereq,
}

impl InferenceAction for ResolveRef {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        stmt.add_to_ns::<ResolvedNs>(SelfKey, resolved.get(self.target))
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        _unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(
            ErrorKind::UnresolvedReference,
            format!("definition '{}' not found", self.name),
        )
    }
}

impl StatementSupport for RefSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        text_argument(raw, ctx)
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let name = stmt.view().raw_argument().unwrap_or_default().to_string();
        let mut action = stmt.new_inference_action(Phase::FullDeclaration)?;
        let target =
            action.requires_ns::<DefNs>(stmt.id(), name.clone(), Phase::StatementDefinition);
        stmt.apply_action(action, ResolveRef { name, target })
    }
}

struct NodeSupport;

impl StatementSupport for NodeSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        text_argument(raw, ctx)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::SchemaTree
    }
}

struct CopySupport;

struct Instantiate {
    name: String,
    definition: Prereq,
    parent: ContextId,
}

impl InferenceAction for Instantiate {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        let definition = resolved.get(self.definition);
        let children: Vec<ContextId> =
            stmt.view().at(definition).children().map(|child| child.id()).collect();
        let module_root = stmt.view().module_root().id();
        for child in children {
            stmt.copy_as_child(child, self.parent, CopyType::AddedByUses, module_root)?;
        }
        Ok(())
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        _unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(
            ErrorKind::UnresolvedReference,
            format!("definition '{}' not found", self.name),
        )
    }
}

impl StatementSupport for CopySupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        text_argument(raw, ctx)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let name = stmt.view().raw_argument().unwrap_or_default().to_string();
        let parent = stmt.view().parent().map(|parent| parent.id()).unwrap();
        let mut action = stmt.new_inference_action(Phase::EffectiveModel)?;
        let definition =
            action.requires_ns::<DefNs>(stmt.id(), name.clone(), Phase::EffectiveModel);
        action.mutates_ctx(parent, Phase::EffectiveModel);
        stmt.apply_action(
            action,
            Instantiate {
                name,
                definition,
                parent,
            },
        )
    }
}

/// Opaque support for unknown keywords.
struct OpaqueSupport;

impl StatementSupport for OpaqueSupport {
    fn parse_argument(&self, raw: Option<&str>, _ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        Ok(raw.map_or(Argument::None, |text| Argument::String(text.to_string())))
    }
}

/// Misbehaving plugin: registers an action for a phase already finished.
struct LateSupport;

impl StatementSupport for LateSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        text_argument(raw, ctx)
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        stmt.new_inference_action(Phase::SourceLinkage).map(|_| ())
    }
}

/// Misbehaving plugin: writes a namespace nobody registered.
struct RogueSupport;

impl StatementSupport for RogueSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        text_argument(raw, ctx)
    }

    fn on_statement_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        stmt.add_to_ns::<UnregisteredNs>("x".to_string(), 1)
    }
}

/// Binds its argument in `StampNs`, which closes after STATEMENT_DEFINITION.
struct StampSupport {
    late: bool,
}

impl StatementSupport for StampSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        text_argument(raw, ctx)
    }

    fn on_statement_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        if self.late {
            return Ok(());
        }
        let name = stmt.view().raw_argument().unwrap_or_default().to_string();
        stmt.add_to_ns::<StampNs>(name, 1)
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        if !self.late {
            return Ok(());
        }
        let name = stmt.view().raw_argument().unwrap_or_default().to_string();
        stmt.add_to_ns::<StampNs>(name, 2)
    }
}

fn toy_builder() -> ReactorBuilder {
    Reactor::builder()
        .add_namespace::<ToyModuleNs>(Phase::SourcePreLinkage)
        .add_namespace::<DefNs>(Phase::StatementDefinition)
        .add_namespace::<ResolvedNs>(Phase::FullDeclaration)
        .add_namespace_until::<StampNs>(Phase::StatementDefinition, Phase::StatementDefinition)
        .add_statement_support(Phase::SourcePreLinkage, Keyword::yang("module"), ModuleSupport)
        .add_statement_support(Phase::StatementDefinition, Keyword::yang("def"), DefSupport)
        .add_statement_support(Phase::StatementDefinition, Keyword::yang("node"), NodeSupport)
        .add_statement_support(Phase::FullDeclaration, Keyword::yang("ref"), RefSupport)
        .add_statement_support(Phase::FullDeclaration, Keyword::yang("copy"), CopySupport)
        .add_statement_support(Phase::FullDeclaration, Keyword::yang("late"), LateSupport)
        .add_statement_support(Phase::StatementDefinition, Keyword::yang("rogue"), RogueSupport)
        .add_statement_support(
            Phase::StatementDefinition,
            Keyword::yang("stamp"),
            StampSupport { late: false },
        )
        .add_statement_support(
            Phase::StatementDefinition,
            Keyword::yang("late-stamp"),
            StampSupport { late: true },
        )
        .unknown_statement_support(OpaqueSupport)
}

fn build(reactor: &Reactor, roots: Vec<RawStatement>) -> Result<EffectiveModel, ReactorError> {
    let sources: Vec<InMemorySource> = roots.into_iter().map(InMemorySource::from_root).collect();
    let refs: Vec<&dyn StatementStreamSource> =
        sources.iter().map(|s| s as &dyn StatementStreamSource).collect();
    reactor.build(&refs, &[])
}

struct BrokenSource;

impl StatementStreamSource for BrokenSource {
    fn source_name(&self) -> &str {
        "broken.yang"
    }

    fn statements(&self) -> Result<RawStatement, SourceError> {
        Err(SourceError::new(
            ErrorKind::MissingSource,
            SourceLocation::of_source("broken.yang"),
            "file not found",
        ))
    }
}

// ===== Resolution =====

#[test]
fn test_forward_reference_across_sources_resolves() {
    let reactor = toy_builder().build();
    let user = statement! { module "a" { ref "shared"; } };
    let owner = statement! { module "b" { def "shared"; } };

    let model = build(&reactor, vec![user.clone(), owner.clone()]).unwrap();
    assert_eq!(model.modules().len(), 2);

    let reversed = build(&reactor, vec![owner, user]).unwrap();
    assert_eq!(model, reversed);
}

#[test]
fn test_missing_definition_reports_once() {
    let reactor = toy_builder().build();
    let error = build(&reactor, vec![statement! { module "a" { ref "nowhere"; } }]).unwrap_err();

    assert_eq!(error.phase(), Some(Phase::FullDeclaration));
    assert_eq!(error.errors().len(), 1);
    let diagnostic = &error.errors()[0];
    assert_eq!(diagnostic.kind, ErrorKind::UnresolvedReference);
    assert!(diagnostic.message.contains("nowhere"));
    assert_eq!(diagnostic.location.source.as_ref(), "a.yang");
}

#[test]
fn test_duplicate_definition_lists_both_locations() {
    let reactor = toy_builder().build();
    let error = build(
        &reactor,
        vec![statement! { module "a" { def "d"; node "n"; def "d"; } }],
    )
    .unwrap_err();

    assert_eq!(error.phase(), Some(Phase::StatementDefinition));
    let duplicates = error.errors_of(ErrorKind::DuplicateDefinition);
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].location.line, 4);
    assert_eq!(duplicates[0].labels[0].location.line, 2);
}

#[test]
fn test_missing_source_fails_before_linkage() {
    let reactor = toy_builder().build();
    let error = reactor.build(&[&BrokenSource], &[]).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::Init));
    assert_eq!(error.errors()[0].kind, ErrorKind::MissingSource);
}

// ===== Expansion =====

#[test]
fn test_copy_instantiates_definition_children_into_parent() {
    let reactor = toy_builder().build();
    let model = build(
        &reactor,
        vec![statement! {
            module "a" {
                node "target" { copy "d"; }
                def "d" { node "inner"; node "other"; }
            }
        }],
    )
    .unwrap();

    let module = model.find_module("a", None).unwrap();
    let target = module.find_first("node").unwrap();
    let copied: Vec<_> = target
        .find_all("node")
        .map(|stmt| stmt.argument().as_str().unwrap().to_string())
        .collect();
    assert_eq!(copied, ["inner", "other"]);
    assert!(target.find_all("node").all(|stmt| stmt.history().is_added_by_uses()));
    assert!(module.find_first("def").unwrap().history().is_original());
}

#[test]
fn test_copy_of_missing_definition_fails_in_effective_model() {
    let reactor = toy_builder().build();
    let roots = vec![statement! { module "a" { node "t" { copy "ghost"; } } }];
    let error = build(&reactor, roots).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::EffectiveModel));
    assert_eq!(error.errors().len(), 1);
    assert!(error.errors()[0].message.contains("ghost"));
}

#[test]
fn test_effective_statements_keep_declared_form() {
    let reactor = toy_builder().build();
    let roots = vec![statement! { module "a" { node "n" { node "m"; } } }];
    let model = build(&reactor, roots).unwrap();
    let module = model.find_module("a", None).unwrap();
    let declared = module.declared().unwrap();
    assert_eq!(declared.substatements().len(), 1);
    assert_eq!(declared.substatements()[0].raw_argument(), Some("n"));
}

// ===== Unknown statements =====

#[test]
fn test_unknown_statement_is_preserved_when_lenient() {
    let reactor = toy_builder().build();
    let model = build(&reactor, vec![statement! { module "a" { frobnicate "x"; } }]).unwrap();
    let module = model.find_module("a", None).unwrap();
    let opaque = module.find_first("frobnicate").unwrap();
    assert_eq!(opaque.argument().as_str(), Some("x"));
}

#[test]
fn test_unknown_statement_is_rejected_when_strict() {
    let reactor = toy_builder().config(ReactorConfig::strict()).build();
    let error = build(&reactor, vec![statement! { module "a" { frobnicate "x"; } }]).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::FullDeclaration));
    assert_eq!(error.errors_of(ErrorKind::UnknownStatement).len(), 1);
}

#[test]
fn test_unbound_extension_prefix_is_unresolved() {
    let reactor = toy_builder().build();
    let error = build(&reactor, vec![statement! { module "a" { "ext:thing" "x"; } }]).unwrap_err();
    assert_eq!(error.errors_of(ErrorKind::UnresolvedReference).len(), 1);
}

// ===== Internal consistency =====

#[test]
fn test_action_for_finished_phase_is_internal_error() {
    let reactor = toy_builder().build();
    let error = build(&reactor, vec![statement! { module "a" { late "x"; } }]).unwrap_err();
    assert!(matches!(error, ReactorError::Internal(_)));
    assert!(error.phase().is_none());
}

#[test]
fn test_unregistered_namespace_is_internal_error() {
    let reactor = toy_builder().build();
    let error = build(&reactor, vec![statement! { module "a" { rogue "x"; } }]).unwrap_err();
    assert!(matches!(error, ReactorError::Internal(_)));
}

#[test]
fn test_sealed_namespace_rejects_late_bindings() {
    let reactor = toy_builder().build();
    build(&reactor, vec![statement! { module "a" { stamp "x"; } }]).unwrap();

    let error = build(&reactor, vec![statement! { module "a" { "late-stamp" "x"; } }]).unwrap_err();
    match error {
        ReactorError::Internal(internal) => {
            assert!(internal.message.contains("namespace 'stamp' is sealed after"))
        }
        other => panic!("expected an internal error, got {other:?}"),
    }
}

// ===== Determinism =====

#[test]
fn test_repeated_builds_are_equal() {
    let reactor = toy_builder().build();
    let sources = || {
        vec![
            statement! { module "a" { ref "d"; node "n" { copy "d"; } } },
            statement! { module "b" { def "d" { node "x"; } } },
        ]
    };
    let first = build(&reactor, sources()).unwrap();
    let second = build(&reactor, sources()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_later_registration_replaces_earlier() {
    let reactor = toy_builder()
        .add_statement_support(Phase::FullDeclaration, Keyword::yang("late"), OpaqueSupport)
        .build();
    assert!(build(&reactor, vec![statement! { module "a" { late "x"; } }]).is_ok());
}
