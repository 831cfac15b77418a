//! The root output of a build.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::effective::{EffectiveKind, EffectiveStatement};
use crate::identifier::{QName, Revision, SourceIdentifier, XmlNamespace};

/// Immutable, fully resolved schema model.
///
/// Holds the requested modules of one build, ordered by identifier, plus
/// aggregate indices over every identity and extension they (and their
/// submodules) define. Models are plain immutable data: clone the `Arc`s to
/// share them across threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveModel {
    modules: Vec<Arc<EffectiveStatement>>,
    #[serde(skip)]
    by_identifier: BTreeMap<SourceIdentifier, usize>,
    #[serde(skip)]
    identities: IndexMap<QName, Arc<EffectiveStatement>>,
    #[serde(skip)]
    extensions: IndexMap<QName, Arc<EffectiveStatement>>,
}

impl EffectiveModel {
    /// Assemble a model from module roots. Statements that are not modules
    /// are ignored.
    pub fn new(roots: impl IntoIterator<Item = Arc<EffectiveStatement>>) -> Self {
        let mut keyed: Vec<(SourceIdentifier, Arc<EffectiveStatement>)> = roots
            .into_iter()
            .filter_map(|root| {
                let module = root.as_module()?;
                let id = SourceIdentifier::new(module.name.clone(), module.revision.clone());
                Some((id, root))
            })
            .collect();
        keyed.sort_by(|left, right| left.0.cmp(&right.0));

        let mut modules = Vec::with_capacity(keyed.len());
        let mut by_identifier = BTreeMap::new();
        let mut identities = IndexMap::new();
        let mut extensions = IndexMap::new();
        for (id, root) in keyed {
            index_definitions(&root, &mut identities, &mut extensions);
            if let Some(module) = root.as_module() {
                for submodule in &module.submodules {
                    index_definitions(submodule, &mut identities, &mut extensions);
                }
            }
            by_identifier.insert(id, modules.len());
            modules.push(root);
        }

        Self {
            modules,
            by_identifier,
            identities,
            extensions,
        }
    }

    /// Modules ordered by identifier.
    pub fn modules(&self) -> &[Arc<EffectiveStatement>] {
        &self.modules
    }

    /// Module by name and revision; without a revision the latest one.
    pub fn find_module(
        &self,
        name: &str,
        revision: Option<&Revision>,
    ) -> Option<&Arc<EffectiveStatement>> {
        match revision {
            Some(revision) => self
                .by_identifier
                .get(&SourceIdentifier::new(name, Some(revision.clone())))
                .map(|index| &self.modules[*index]),
            None => self
                .by_identifier
                .iter()
                .filter(|(id, _)| id.name == name)
                .last()
                .map(|(_, index)| &self.modules[*index]),
        }
    }

    /// Module by namespace and revision; without a revision the latest one.
    pub fn find_module_by_namespace(
        &self,
        namespace: &XmlNamespace,
        revision: Option<&Revision>,
    ) -> Option<&Arc<EffectiveStatement>> {
        self.modules
            .iter()
            .filter(|root| {
                root.as_module().is_some_and(|module| {
                    module.qname_module.namespace == *namespace
                        && revision.map_or(true, |wanted| module.revision.as_ref() == Some(wanted))
                })
            })
            .last()
    }

    pub fn identities(&self) -> &IndexMap<QName, Arc<EffectiveStatement>> {
        &self.identities
    }

    pub fn identity(&self, qname: &QName) -> Option<&Arc<EffectiveStatement>> {
        self.identities.get(qname)
    }

    /// Identities naming `base` directly or transitively as a base.
    pub fn derived_identities(&self, base: &QName) -> Vec<&Arc<EffectiveStatement>> {
        let mut derived = Vec::new();
        let mut frontier = vec![base.clone()];
        while let Some(current) = frontier.pop() {
            for (qname, identity) in &self.identities {
                let EffectiveKind::Identity(info) = identity.kind() else {
                    continue;
                };
                let already = derived
                    .iter()
                    .any(|seen: &&Arc<EffectiveStatement>| seen.qname() == Some(qname));
                if info.bases.contains(&current) && !already {
                    derived.push(identity);
                    frontier.push(qname.clone());
                }
            }
        }
        derived
    }

    pub fn extensions(&self) -> &IndexMap<QName, Arc<EffectiveStatement>> {
        &self.extensions
    }
}

fn index_definitions(
    root: &Arc<EffectiveStatement>,
    identities: &mut IndexMap<QName, Arc<EffectiveStatement>>,
    extensions: &mut IndexMap<QName, Arc<EffectiveStatement>>,
) {
    for stmt in root.substatements() {
        match stmt.kind() {
            EffectiveKind::Identity(identity) => {
                identities.insert(identity.qname.clone(), stmt.clone());
            }
            EffectiveKind::Extension(extension) => {
                extensions.insert(extension.qname.clone(), stmt.clone());
            }
            _ => {}
        }
    }
}
