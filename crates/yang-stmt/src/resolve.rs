//! Name and schema-tree resolution over a build in progress.
//!
//! References are resolved lexically: a copied statement resolves prefixes
//! and definitions where it was declared. Schema tree names of a copy, on the
//! other hand, belong to the module it was copied into.

use std::iter;

use yang_model::{Argument, NodeStep, QName, QNameModule, SourceIdentifier};
use yang_reactor::{ContextId, Namespace, SelfKey, Stmt};

use crate::namespaces::{
    IncludedSubmoduleNs, ModuleNs, ModuleQNameNs, NamespaceToModuleNs, PrefixToModuleNs,
    SchemaTreeNs,
};

/// Schema tree statements, data nodes and operations alike.
pub const SCHEMA_NODES: &[&str] = &[
    "container",
    "leaf",
    "leaf-list",
    "list",
    "choice",
    "case",
    "anydata",
    "anyxml",
    "rpc",
    "action",
    "input",
    "output",
    "notification",
];

pub fn is_schema_node(stmt: Stmt<'_>) -> bool {
    SCHEMA_NODES.iter().any(|name| stmt.keyword().is(name))
}

/// Choice and case are not data nodes: data paths step through them.
fn is_transparent(stmt: Stmt<'_>) -> bool {
    stmt.keyword().is("choice") || stmt.keyword().is("case")
}

/// Namespace of the module `stmt` belongs to (for copies, the module it was
/// copied into).
pub fn module_qname(stmt: Stmt<'_>) -> Option<QNameModule> {
    stmt.module_root().lookup::<ModuleQNameNs>(&SelfKey).cloned()
}

/// Name of the module `stmt` was declared in; the parent module for
/// statements of a submodule.
pub fn declaring_module_name(stmt: Stmt<'_>) -> Option<&str> {
    let root = stmt.original().root();
    if root.keyword().is("submodule") {
        root.child_argument("belongs-to")
    } else {
        root.raw_argument()
    }
}

/// Identifier of a module or submodule root: its name and latest revision.
pub fn source_identifier(root: Stmt<'_>) -> SourceIdentifier {
    let revision = root
        .children_named("revision")
        .filter_map(|revision| revision.argument().as_revision().cloned())
        .max();
    SourceIdentifier::new(root.raw_argument().unwrap_or_default(), revision)
}

/// Module root by name, exact revision or (without one) the latest.
pub fn find_module(
    stmt: Stmt<'_>,
    name: &str,
    revision: Option<&yang_model::Revision>,
) -> Option<ContextId> {
    find_by_identifier::<ModuleNs>(stmt, name, revision)
}

/// Same lookup over any identifier-keyed namespace.
pub fn find_by_identifier<N>(
    stmt: Stmt<'_>,
    name: &str,
    revision: Option<&yang_model::Revision>,
) -> Option<ContextId>
where
    N: Namespace<Key = SourceIdentifier, Value = ContextId>,
{
    stmt.bindings::<N>()?
        .iter()
        .filter(|(id, _)| id.matches(name, revision))
        .max_by(|left, right| left.0.cmp(right.0))
        .map(|(_, binding)| binding.value)
}

/// Namespace of the module bound to `prefix` where `stmt` was declared, or
/// of `stmt`'s own module without a prefix.
pub fn prefix_module(stmt: Stmt<'_>, prefix: Option<&str>) -> Option<QNameModule> {
    match prefix {
        None => module_qname(stmt),
        Some(prefix) => {
            let origin = stmt.original();
            let root = origin.lookup::<PrefixToModuleNs>(&prefix.to_string())?;
            origin.at(*root).lookup::<ModuleQNameNs>(&SelfKey).cloned()
        }
    }
}

/// Root of the module defining names in `module`.
pub fn module_root_of(stmt: Stmt<'_>, module: &QNameModule) -> Option<ContextId> {
    stmt.lookup::<NamespaceToModuleNs>(module).copied()
}

/// Definition named `qname` visible from where `stmt` was declared.
///
/// Names of the declaring module resolve through the lexical scope chain;
/// names of other modules through their module root.
pub fn find_definition<N>(stmt: Stmt<'_>, qname: &QName) -> Option<ContextId>
where
    N: Namespace<Key = String, Value = ContextId>,
{
    let origin = stmt.original();
    if module_qname(origin).as_ref() == Some(&qname.module) {
        return origin.lookup::<N>(&qname.local_name).copied();
    }
    let root = module_root_of(origin, &qname.module)?;
    origin.at(root).lookup::<N>(&qname.local_name).copied()
}

/// Qualified name of a schema node.
pub fn node_qname(stmt: Stmt<'_>) -> Option<QName> {
    let local = match stmt.argument() {
        Argument::Identifier(name) => name.clone(),
        Argument::None => stmt.keyword().name.clone(),
        _ => return None,
    };
    Some(QName::new(module_qname(stmt)?, local))
}

/// Roots of the submodules a module root includes.
fn included_roots<'a>(root: Stmt<'a>) -> Vec<Stmt<'a>> {
    if !root.is_root() {
        return Vec::new();
    }
    root.bindings::<IncludedSubmoduleNs>()
        .map(|bindings| bindings.values().map(|binding| root.at(binding.value)).collect())
        .unwrap_or_default()
}

fn visible(stmt: Stmt<'_>) -> bool {
    !stmt.is_removed() && !stmt.is_unsupported()
}

/// Schema tree child of `parent` named `qname`. Top-level nodes of included
/// submodules count as children of the module.
pub fn find_schema_child<'a>(parent: Stmt<'a>, qname: &QName) -> Option<Stmt<'a>> {
    iter::once(parent)
        .chain(included_roots(parent))
        .find_map(|scope| scope.lookup::<SchemaTreeNs>(qname).map(|id| scope.at(*id)))
        .filter(|found| visible(*found))
}

/// Schema tree children of `parent`, including those of included submodules.
pub fn schema_children<'a>(parent: Stmt<'a>) -> Vec<Stmt<'a>> {
    iter::once(parent)
        .chain(included_roots(parent))
        .flat_map(|scope| scope.children())
        .filter(|child| is_schema_node(*child) && visible(*child))
        .collect()
}

/// Data node child of `parent` named `qname`, looking through choices and
/// cases.
pub fn find_data_child<'a>(parent: Stmt<'a>, qname: &QName) -> Option<Stmt<'a>> {
    if let Some(found) = find_schema_child(parent, qname) {
        if !is_transparent(found) {
            return Some(found);
        }
    }
    schema_children(parent)
        .into_iter()
        .filter(|child| is_transparent(*child))
        .find_map(|child| find_data_child(child, qname))
}

/// Qualified name of a path step, taking the prefix from `origin`'s scope.
pub fn step_qname(origin: Stmt<'_>, step: &NodeStep) -> Option<QName> {
    Some(QName::new(prefix_module(origin, step.prefix.as_deref())?, step.name.clone()))
}

/// Follow schema node identifier steps from `start`.
pub fn descend<'a>(start: Stmt<'a>, steps: &[NodeStep], origin: Stmt<'_>) -> Option<Stmt<'a>> {
    steps.iter().try_fold(start, |current, step| {
        let qname = step_qname(origin, step)?;
        find_schema_child(current, &qname)
    })
}

/// Target of an absolute schema node identifier.
pub fn resolve_absolute<'a>(origin: Stmt<'a>, steps: &[NodeStep]) -> Option<Stmt<'a>> {
    let first = steps.first()?;
    let module = prefix_module(origin, first.prefix.as_deref())?;
    let root = origin.at(module_root_of(origin, &module)?);
    descend(root, steps, origin)
}

/// Nearest ancestor that is a data node, skipping choices and cases.
pub fn data_parent(stmt: Stmt<'_>) -> Option<Stmt<'_>> {
    stmt.ancestors().find(|ancestor| !is_transparent(*ancestor))
}

/// Keywords whose bodies are templates for statements instantiated elsewhere.
const TEMPLATES: &[&str] = &["grouping", "augment", "deviate"];

/// Whether `stmt` sits inside a template body.
pub fn in_template(stmt: Stmt<'_>) -> bool {
    stmt.ancestors()
        .any(|ancestor| TEMPLATES.iter().any(|name| ancestor.keyword().is(name)))
}

/// Nodes under these keywords carry no config property.
const OUTSIDE_CONFIG: &[&str] = &["rpc", "action", "notification", "input", "output"];

/// Effective `config` of a schema node: its own `config` statement, else the
/// nearest ancestor's, else true. `None` inside templates, operations,
/// notifications and extension bodies.
pub fn effective_config(stmt: Stmt<'_>) -> Option<bool> {
    if in_template(stmt) {
        return None;
    }
    let chain: Vec<Stmt<'_>> = iter::once(stmt).chain(stmt.ancestors()).collect();
    if chain
        .iter()
        .any(|node| {
            node.keyword().is_extension()
                || OUTSIDE_CONFIG.iter().any(|name| node.keyword().is(name))
        })
    {
        return None;
    }
    let explicit = chain.iter().find_map(|node| {
        node.first_child("config")
            .and_then(|config| config.argument().as_bool())
    });
    Some(explicit.unwrap_or(true))
}
