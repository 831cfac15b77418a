//! Statement-stream sources and library selection.
//!
//! Sources are handed to the reactor already parsed. A build reads every
//! source once, extracts its linkage header with [`SourceInfo::extract`], and
//! admits library sources only when some requested source needs them.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;
use yang_model::{RawStatement, Revision, SourceIdentifier, SourceLocation};

use crate::error::{ErrorKind, SourceError};

/// Something that can produce the raw statement tree of one source.
pub trait StatementStreamSource {
    /// Name used in locations and diagnostics.
    fn source_name(&self) -> &str;

    /// The root statement of this source.
    fn statements(&self) -> Result<RawStatement, SourceError>;
}

/// A source held in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    name: String,
    root: RawStatement,
}

impl InMemorySource {
    /// Wrap `root`, giving statements without a location a synthetic one.
    pub fn new(name: impl Into<String>, mut root: RawStatement) -> Self {
        let name = name.into();
        root.assign_locations(&name);
        Self { name, root }
    }

    /// Source named after its module, `<arg>.yang`.
    pub fn from_root(root: RawStatement) -> Self {
        let name = format!("{}.yang", root.argument().unwrap_or("unnamed"));
        Self::new(name, root)
    }

    pub fn root(&self) -> &RawStatement {
        &self.root
    }
}

impl StatementStreamSource for InMemorySource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn statements(&self) -> Result<RawStatement, SourceError> {
        Ok(self.root.clone())
    }
}

impl<S: StatementStreamSource + ?Sized> StatementStreamSource for &S {
    fn source_name(&self) -> &str {
        (**self).source_name()
    }

    fn statements(&self) -> Result<RawStatement, SourceError> {
        (**self).statements()
    }
}

impl<S: StatementStreamSource + ?Sized> StatementStreamSource for Box<S> {
    fn source_name(&self) -> &str {
        (**self).source_name()
    }

    fn statements(&self) -> Result<RawStatement, SourceError> {
        (**self).statements()
    }
}

/// Reference to another source by name and optional exact revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceDependency {
    pub name: String,
    pub revision: Option<Revision>,
}

impl SourceDependency {
    fn matches(&self, id: &SourceIdentifier) -> bool {
        id.matches(&self.name, self.revision.as_ref())
    }
}

/// Kind of the root statement of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Module,
    Submodule { belongs_to: String },
}

/// Linkage header of a raw source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub identifier: SourceIdentifier,
    pub kind: SourceKind,
    pub imports: Vec<SourceDependency>,
    pub includes: Vec<SourceDependency>,
}

impl SourceInfo {
    /// Read the header of `root`.
    ///
    /// Malformed revisions are skipped here; the statement supports report
    /// them properly once the source is processed.
    pub fn extract(root: &RawStatement) -> Option<SourceInfo> {
        let kind = match root.keyword.as_str() {
            "module" => SourceKind::Module,
            "submodule" => SourceKind::Submodule {
                belongs_to: root.child("belongs-to")?.argument()?.to_string(),
            },
            _ => return None,
        };
        let name = root.argument()?.to_string();
        let revision = root
            .children_named("revision")
            .filter_map(|stmt| stmt.argument()?.parse::<Revision>().ok())
            .max();

        let dependency = |stmt: &RawStatement| {
            Some(SourceDependency {
                name: stmt.argument()?.to_string(),
                revision: stmt
                    .child("revision-date")
                    .and_then(|date| date.argument()?.parse().ok()),
            })
        };

        Some(SourceInfo {
            identifier: SourceIdentifier::new(name, revision),
            imports: root.children_named("import").filter_map(dependency).collect(),
            includes: root.children_named("include").filter_map(dependency).collect(),
            kind,
        })
    }

    fn dependencies(&self) -> Vec<SourceDependency> {
        let mut dependencies: Vec<_> = self.imports.iter().chain(&self.includes).cloned().collect();
        if let SourceKind::Submodule { belongs_to } = &self.kind {
            dependencies.push(SourceDependency {
                name: belongs_to.clone(),
                revision: None,
            });
        }
        dependencies
    }
}

/// A source after reading, before it enters the reactor.
#[derive(Debug, Clone)]
pub(crate) struct LoadedSource {
    pub name: String,
    pub root: RawStatement,
    pub info: Option<SourceInfo>,
    pub requested: bool,
}

impl LoadedSource {
    pub fn read(
        source: &dyn StatementStreamSource,
        requested: bool,
    ) -> Result<LoadedSource, SourceError> {
        let mut root = source.statements().map_err(|error| {
            if error.kind == ErrorKind::MissingSource {
                error
            } else {
                SourceError::new(
                    ErrorKind::MissingSource,
                    SourceLocation::of_source(source.source_name()),
                    format!("source '{}' could not be read", source.source_name()),
                )
                .with_note(error.to_string())
            }
        })?;
        root.assign_locations(source.source_name());
        let info = SourceInfo::extract(&root);
        Ok(LoadedSource {
            name: source.source_name().to_string(),
            root,
            info,
            requested,
        })
    }

    fn sort_key(&self) -> (Option<SourceIdentifier>, String) {
        (self.info.as_ref().map(|info| info.identifier.clone()), self.name.clone())
    }
}

/// Requested sources plus the libraries they transitively need, ordered by
/// identifier so processing order never depends on submission order.
pub(crate) fn select_sources(
    requested: Vec<LoadedSource>,
    libraries: Vec<LoadedSource>,
) -> Vec<LoadedSource> {
    let requested_ids: HashSet<SourceIdentifier> = requested
        .iter()
        .filter_map(|source| source.info.as_ref().map(|info| info.identifier.clone()))
        .collect();

    let mut candidates: Vec<LoadedSource> = Vec::new();
    for library in libraries {
        let Some(info) = &library.info else {
            debug!(source = %library.name, "skipping library without a module header");
            continue;
        };
        if requested_ids.contains(&info.identifier) {
            debug!(
                source = %library.name,
                id = %info.identifier,
                "library shadowed by requested source"
            );
            continue;
        }
        candidates.push(library);
    }

    let mut pending: Vec<SourceDependency> = requested
        .iter()
        .filter_map(|source| source.info.as_ref())
        .flat_map(SourceInfo::dependencies)
        .collect();
    let mut seen: HashSet<SourceDependency> = pending.iter().cloned().collect();
    let mut picked: BTreeSet<usize> = BTreeSet::new();

    while let Some(dependency) = pending.pop() {
        for (index, candidate) in candidates.iter().enumerate() {
            let Some(info) = &candidate.info else { continue };
            if !dependency.matches(&info.identifier) || !picked.insert(index) {
                continue;
            }
            debug!(source = %candidate.name, id = %info.identifier, "library required");
            for next in info.dependencies() {
                if seen.insert(next.clone()) {
                    pending.push(next);
                }
            }
        }
    }

    let mut selected = requested;
    selected.extend(
        candidates
            .into_iter()
            .enumerate()
            .filter(|(index, _)| picked.contains(index))
            .map(|(_, source)| source),
    );
    selected.sort_by_key(LoadedSource::sort_key);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_model::statement;

    fn loaded(root: RawStatement, requested: bool) -> LoadedSource {
        let source = InMemorySource::from_root(root);
        LoadedSource::read(&source, requested).unwrap()
    }

    #[test]
    fn test_extract_module_header() {
        let root = statement! {
            module "a" {
                revision "2020-01-01";
                revision "2022-06-30";
                import "b" { prefix "b"; "revision-date" "2019-01-01"; }
                import "c" { prefix "c"; }
                include "a-sub";
            }
        };
        let info = SourceInfo::extract(&root).unwrap();
        assert_eq!(info.identifier.to_string(), "a@2022-06-30");
        assert_eq!(info.imports.len(), 2);
        assert_eq!(info.imports[0].revision.as_ref().unwrap().as_str(), "2019-01-01");
        assert!(info.imports[1].revision.is_none());
        assert_eq!(info.includes[0].name, "a-sub");
    }

    #[test]
    fn test_extract_rejects_other_roots() {
        assert!(SourceInfo::extract(&statement! { container "x"; }).is_none());
        assert!(SourceInfo::extract(&statement! { submodule "s"; }).is_none());
    }

    #[test]
    fn test_select_keeps_only_required_libraries() {
        let requested = vec![loaded(
            statement! { module "a" { import "b" { prefix "b"; } } },
            true,
        )];
        let libraries = vec![
            loaded(statement! { module "b" { import "c" { prefix "c"; } } }, false),
            loaded(statement! { module "c"; }, false),
            loaded(statement! { module "unused"; }, false),
        ];
        let selected = select_sources(requested, libraries);
        let names: Vec<_> = selected.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a.yang", "b.yang", "c.yang"]);
    }

    #[test]
    fn test_select_drops_library_duplicating_requested() {
        let requested = vec![loaded(statement! { module "a"; }, true)];
        let libraries = vec![loaded(statement! { module "a"; }, false)];
        let selected = select_sources(requested, libraries);
        assert_eq!(selected.len(), 1);
        assert!(selected[0].requested);
    }

    #[test]
    fn test_select_order_is_independent_of_submission() {
        let make = |order: &[&str]| {
            let requested = order
                .iter()
                .map(|name| loaded(RawStatement::new("module", Some(name)), true))
                .collect();
            select_sources(requested, Vec::new())
                .into_iter()
                .map(|s| s.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(make(&["z", "a", "m"]), make(&["m", "z", "a"]));
    }

    #[test]
    fn test_exact_revision_import_selects_only_that_revision() {
        let requested = vec![loaded(
            statement! { module "a" { import "b" { prefix "b"; "revision-date" "2000-01-01"; } } },
            true,
        )];
        let libraries = vec![
            loaded(statement! { module "b" { revision "2000-01-01"; } }, false),
            loaded(statement! { module "b" { revision "2010-01-01"; } }, false),
        ];
        let selected = select_sources(requested, libraries);
        assert_eq!(selected.len(), 2);
        assert_eq!(
            selected[1].info.as_ref().unwrap().identifier.to_string(),
            "b@2000-01-01"
        );
    }
}
