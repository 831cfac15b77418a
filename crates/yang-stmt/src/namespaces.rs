//! The namespaces YANG statements bind during a build.
//!
//! # Linkage (global and source-local)
//!
//! Modules and submodules announce themselves by identifier in
//! SOURCE_PRE_LINKAGE; imports, includes and `belongs-to` resolve against
//! those bindings in SOURCE_LINKAGE and record the prefixes of a source.
//!
//! # Definitions (tree-scoped)
//!
//! Typedefs and groupings are bound on the parent of the defining statement,
//! so inner scopes shadow outer ones. Identities, features and extensions are
//! bound on the module root. Keys are local names: a definition belongs to
//! the module whose tree it is bound in, and references into another module
//! start their lookup at that module's root.
//!
//! # Per statement
//!
//! Schema tree children are keyed by qualified name on their parent, because
//! augmentation adds children from other modules. Resolved references (a
//! type's typedef, an import's module, a leafref's target) are bound on the
//! referring statement itself.

use yang_model::{QName, QNameModule, SourceIdentifier};
use yang_reactor::{namespace, ContextId, Phase, ReactorBuilder, SelfKey};

namespace! {
    /// Module roots by identifier.
    pub ModuleNs: SourceIdentifier => ContextId, "module", Global
}

namespace! {
    /// Submodule roots by identifier.
    pub SubmoduleNs: SourceIdentifier => ContextId, "submodule", Global
}

namespace! {
    /// Module roots by namespace and revision.
    pub NamespaceToModuleNs: QNameModule => ContextId, "module namespace", Global
}

namespace! {
    /// Namespace a module or submodule root places its names in.
    pub ModuleQNameNs: SelfKey => QNameModule, "module identity", StatementLocal
}

namespace! {
    /// Prefix to module root, for the source's own prefix and its imports.
    pub PrefixToModuleNs: String => ContextId, "prefix", SourceLocal
}

namespace! {
    /// Submodules included by a module, by name.
    pub IncludedSubmoduleNs: String => ContextId, "included submodule", SourceLocal
}

namespace! {
    /// Module an `import` resolved to.
    pub ImportTargetNs: SelfKey => ContextId, "import target", StatementLocal
}

namespace! {
    pub TypeNs: String => ContextId, "typedef", TreeScoped
}

namespace! {
    pub GroupingNs: String => ContextId, "grouping", TreeScoped
}

namespace! {
    pub IdentityNs: String => ContextId, "identity", TreeScoped
}

namespace! {
    pub FeatureNs: String => ContextId, "feature", TreeScoped
}

namespace! {
    pub ExtensionNs: String => ContextId, "extension", TreeScoped
}

namespace! {
    /// Schema tree children of a statement.
    pub SchemaTreeNs: QName => ContextId, "schema node", StatementLocal
}

namespace! {
    /// Typedef a derived `type` refers to.
    pub TypeBaseNs: SelfKey => ContextId, "type base", StatementLocal
}

namespace! {
    /// Identity a `base` statement refers to.
    pub IdentityBaseNs: SelfKey => ContextId, "identity base", StatementLocal
}

namespace! {
    /// Leaf or leaf-list a leafref `path` points to.
    pub LeafrefTargetNs: SelfKey => ContextId, "leafref target", StatementLocal
}

namespace! {
    /// RFC 8040 yang-data templates of a module, by name.
    pub YangDataNs: String => ContextId, "yang-data", SourceLocal
}

/// Register the core YANG namespaces with the phase they become writable in.
/// Source identities are sealed once every selected source has declared itself.
pub fn register_namespaces(builder: ReactorBuilder) -> ReactorBuilder {
    builder
        .add_namespace_until::<ModuleNs>(Phase::SourcePreLinkage, Phase::SourcePreLinkage)
        .add_namespace_until::<SubmoduleNs>(Phase::SourcePreLinkage, Phase::SourcePreLinkage)
        .add_namespace_until::<NamespaceToModuleNs>(
            Phase::SourcePreLinkage,
            Phase::SourcePreLinkage,
        )
        .add_namespace::<ModuleQNameNs>(Phase::SourcePreLinkage)
        .add_namespace::<PrefixToModuleNs>(Phase::SourcePreLinkage)
        .add_namespace::<IncludedSubmoduleNs>(Phase::SourceLinkage)
        .add_namespace::<ImportTargetNs>(Phase::SourceLinkage)
        .add_namespace::<TypeNs>(Phase::StatementDefinition)
        .add_namespace::<GroupingNs>(Phase::StatementDefinition)
        .add_namespace::<IdentityNs>(Phase::StatementDefinition)
        .add_namespace::<FeatureNs>(Phase::StatementDefinition)
        .add_namespace::<ExtensionNs>(Phase::StatementDefinition)
        .add_namespace::<SchemaTreeNs>(Phase::StatementDefinition)
        .add_namespace::<TypeBaseNs>(Phase::FullDeclaration)
        .add_namespace::<IdentityBaseNs>(Phase::FullDeclaration)
        .add_namespace::<LeafrefTargetNs>(Phase::EffectiveModel)
}
