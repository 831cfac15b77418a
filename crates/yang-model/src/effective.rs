//! Effective statements: the fully resolved, immutable output nodes.
//!
//! Every effective statement is a generic node (keyword, typed argument,
//! ordered substatements) tagged with an [`EffectiveKind`] that carries the
//! category-specific data. Frequently queried facts are computed once at
//! construction: the [`Facets`] side-table and the kind payload both come from
//! scanning the substatements a single time.
//!
//! # Examples
//!
//! ```rust,ignore
//! let module = model.find_module("m1", None).unwrap();
//! let x = module.schema_child("x").unwrap();
//! let target = x.type_definition().unwrap().leafref_target().unwrap();
//! assert_eq!(target.builtin, BuiltinType::String);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::argument::{
    Argument, DeviateKind, IfFeatureExpr, SchemaNodeIdentifier, Status, YangVersion,
};
use crate::declared::DeclaredStatement;
use crate::identifier::{Keyword, QName, QNameModule, Revision, SourceIdentifier};
use crate::location::SourceLocation;
use crate::types::TypeDefinition;

/// How a statement came to exist at its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CopyType {
    /// Declared in place
    Original,
    /// Instantiated from a grouping by `uses`
    AddedByUses,
    /// Added to its parent by `augment`
    AddedByAugmentation,
    /// Added by an `augment` nested in `uses`
    AddedByUsesAugmentation,
}

/// Accumulated copy flags of a statement.
///
/// Two statements with equal histories were reached through the same kinds
/// of expansion, which is the precondition for sharing one effective node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CopyHistory {
    added_by_uses: bool,
    augmenting: bool,
}

impl CopyHistory {
    pub fn original() -> Self {
        Self::default()
    }

    /// History after one more copy of kind `copy`.
    pub fn append(self, copy: CopyType) -> Self {
        match copy {
            CopyType::Original => self,
            CopyType::AddedByUses => Self {
                added_by_uses: true,
                ..self
            },
            CopyType::AddedByAugmentation => Self {
                augmenting: true,
                ..self
            },
            CopyType::AddedByUsesAugmentation => Self {
                added_by_uses: true,
                augmenting: true,
            },
        }
    }

    pub fn is_added_by_uses(&self) -> bool {
        self.added_by_uses
    }

    pub fn is_augmenting(&self) -> bool {
        self.augmenting
    }

    pub fn is_original(&self) -> bool {
        !self.added_by_uses && !self.augmenting
    }
}

/// Typed side-table of the common single-valued substatements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facets {
    pub description: Option<String>,
    pub reference: Option<String>,
    pub status: Status,
    pub units: Option<String>,
    pub default: Option<String>,
    /// Explicit `config` substatement, not the inherited value
    pub config: Option<bool>,
    pub mandatory: Option<bool>,
    pub presence: Option<String>,
    pub if_features: Vec<IfFeatureExpr>,
}

impl Facets {
    /// Scan `substatements` once, keeping the first occurrence of each facet.
    pub fn collect(substatements: &[Arc<EffectiveStatement>]) -> Self {
        let mut facets = Facets::default();
        let mut status = None;
        for stmt in substatements {
            if stmt.keyword.is_extension() {
                continue;
            }
            let text = || stmt.argument.as_str().map(str::to_string);
            match (stmt.keyword.name.as_str(), &stmt.argument) {
                ("description", _) if facets.description.is_none() => facets.description = text(),
                ("reference", _) if facets.reference.is_none() => facets.reference = text(),
                ("units", _) if facets.units.is_none() => facets.units = text(),
                ("default", _) if facets.default.is_none() => facets.default = text(),
                ("presence", _) if facets.presence.is_none() => facets.presence = text(),
                ("status", Argument::Status(value)) if status.is_none() => status = Some(*value),
                ("config", Argument::Boolean(value)) if facets.config.is_none() => {
                    facets.config = Some(*value)
                }
                ("mandatory", Argument::Boolean(value)) if facets.mandatory.is_none() => {
                    facets.mandatory = Some(*value)
                }
                ("if-feature", Argument::IfFeature(expr)) => facets.if_features.push(expr.clone()),
                _ => {}
            }
        }
        facets.status = status.unwrap_or_default();
        facets
    }
}

/// Kind of a schema tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaNodeKind {
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
}

impl SchemaNodeKind {
    pub fn keyword(self) -> &'static str {
        match self {
            SchemaNodeKind::Container => "container",
            SchemaNodeKind::Leaf => "leaf",
            SchemaNodeKind::LeafList => "leaf-list",
            SchemaNodeKind::List => "list",
            SchemaNodeKind::Choice => "choice",
            SchemaNodeKind::Case => "case",
            SchemaNodeKind::Anydata => "anydata",
            SchemaNodeKind::Anyxml => "anyxml",
            SchemaNodeKind::Rpc => "rpc",
            SchemaNodeKind::Action => "action",
            SchemaNodeKind::Input => "input",
            SchemaNodeKind::Output => "output",
            SchemaNodeKind::Notification => "notification",
        }
    }

    /// Nodes that appear in data trees (instantiable, not operations).
    pub fn is_data_node(self) -> bool {
        matches!(
            self,
            SchemaNodeKind::Container
                | SchemaNodeKind::Leaf
                | SchemaNodeKind::LeafList
                | SchemaNodeKind::List
                | SchemaNodeKind::Anydata
                | SchemaNodeKind::Anyxml
        )
    }

    pub fn is_typed(self) -> bool {
        matches!(self, SchemaNodeKind::Leaf | SchemaNodeKind::LeafList)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNodeEffective {
    pub qname: QName,
    pub node: SchemaNodeKind,
    /// Effective config, inherited from ancestors; `None` outside config scope
    pub config: Option<bool>,
    pub mandatory: bool,
    pub type_definition: Option<Arc<TypeDefinition>>,
    pub keys: Vec<QName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEffective {
    pub module: SourceIdentifier,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEffective {
    pub name: String,
    pub qname_module: QNameModule,
    pub prefix: String,
    pub yang_version: YangVersion,
    pub revision: Option<Revision>,
    pub imports: Vec<ImportEffective>,
    /// Included submodules, ordered by name
    pub submodules: Vec<Arc<EffectiveStatement>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleEffective {
    pub name: String,
    pub revision: Option<Revision>,
    pub belongs_to: String,
    pub qname_module: QNameModule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityEffective {
    pub qname: QName,
    pub bases: Vec<QName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionEffective {
    pub qname: QName,
    pub argument: Option<String>,
    pub yin_element: bool,
}

/// Instance of an extension with a registered statement support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInstance {
    pub definition: Keyword,
    pub argument: Option<String>,
}

/// Opaque statement preserved without a dedicated support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownEffective {
    pub keyword: Keyword,
    pub argument: Option<String>,
    /// The `extension` statement defining the keyword, when it has one
    pub definition: Option<QName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugmentEffective {
    pub target: SchemaNodeIdentifier,
}

/// Category-specific payload of an effective statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveKind {
    Module(ModuleEffective),
    Submodule(SubmoduleEffective),
    Import(ImportEffective),
    Include(SourceIdentifier),
    SchemaNode(SchemaNodeEffective),
    Typedef(Arc<TypeDefinition>),
    Type(Arc<TypeDefinition>),
    Grouping(QName),
    Uses(QName),
    Augment(AugmentEffective),
    Refine(SchemaNodeIdentifier),
    /// Absolute target of a `deviation`
    Deviation(SchemaNodeIdentifier),
    Deviate(DeviateKind),
    Identity(IdentityEffective),
    Base(QName),
    Feature(QName),
    IfFeature(IfFeatureExpr),
    Extension(ExtensionEffective),
    ExtensionInstance(ExtensionInstance),
    Unknown(UnknownEffective),
    /// Statements fully described by keyword, argument and facets
    Other,
}

/// Immutable effective statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveStatement {
    keyword: Keyword,
    argument: Argument,
    location: SourceLocation,
    declared: Option<Arc<DeclaredStatement>>,
    history: CopyHistory,
    substatements: Vec<Arc<EffectiveStatement>>,
    facets: Facets,
    kind: EffectiveKind,
}

impl EffectiveStatement {
    pub fn new(
        keyword: Keyword,
        argument: Argument,
        location: SourceLocation,
        declared: Option<Arc<DeclaredStatement>>,
        history: CopyHistory,
        substatements: Vec<Arc<EffectiveStatement>>,
        kind: EffectiveKind,
    ) -> Self {
        let facets = Facets::collect(&substatements);
        Self {
            keyword,
            argument,
            location,
            declared,
            history,
            substatements,
            facets,
            kind,
        }
    }

    pub fn keyword(&self) -> &Keyword {
        &self.keyword
    }

    pub fn argument(&self) -> &Argument {
        &self.argument
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// Declared form this statement was built from.
    pub fn declared(&self) -> Option<&Arc<DeclaredStatement>> {
        self.declared.as_ref()
    }

    pub fn history(&self) -> CopyHistory {
        self.history
    }

    pub fn substatements(&self) -> &[Arc<EffectiveStatement>] {
        &self.substatements
    }

    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    pub fn kind(&self) -> &EffectiveKind {
        &self.kind
    }

    pub fn as_module(&self) -> Option<&ModuleEffective> {
        match &self.kind {
            EffectiveKind::Module(module) => Some(module),
            _ => None,
        }
    }

    pub fn schema_node(&self) -> Option<&SchemaNodeEffective> {
        match &self.kind {
            EffectiveKind::SchemaNode(node) => Some(node),
            _ => None,
        }
    }

    /// Qualified name of named definitions and schema nodes.
    pub fn qname(&self) -> Option<&QName> {
        match &self.kind {
            EffectiveKind::SchemaNode(node) => Some(&node.qname),
            EffectiveKind::Grouping(qname) | EffectiveKind::Feature(qname) => Some(qname),
            EffectiveKind::Identity(identity) => Some(&identity.qname),
            EffectiveKind::Extension(extension) => Some(&extension.qname),
            _ => None,
        }
    }

    /// Type of a leaf, leaf-list, `type` or `typedef` statement.
    pub fn type_definition(&self) -> Option<&Arc<TypeDefinition>> {
        match &self.kind {
            EffectiveKind::SchemaNode(node) => node.type_definition.as_ref(),
            EffectiveKind::Type(definition) | EffectiveKind::Typedef(definition) => {
                Some(definition)
            }
            _ => None,
        }
    }

    /// First substatement with core keyword `name`.
    pub fn find_first(&self, name: &str) -> Option<&Arc<EffectiveStatement>> {
        self.substatements.iter().find(|stmt| stmt.keyword.is(name))
    }

    pub fn find_all<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Arc<EffectiveStatement>> {
        self.substatements.iter().filter(move |stmt| stmt.keyword.is(name))
    }

    /// Schema tree children in order. A module also yields the top-level
    /// nodes of its included submodules.
    pub fn schema_children(&self) -> Vec<&Arc<EffectiveStatement>> {
        let mut children: Vec<_> = self
            .substatements
            .iter()
            .filter(|stmt| stmt.schema_node().is_some())
            .collect();
        if let EffectiveKind::Module(module) = &self.kind {
            for submodule in &module.submodules {
                children.extend(
                    submodule
                        .substatements
                        .iter()
                        .filter(|stmt| stmt.schema_node().is_some()),
                );
            }
        }
        children
    }

    /// Schema child by local name.
    pub fn schema_child(&self, local_name: &str) -> Option<&Arc<EffectiveStatement>> {
        self.schema_children()
            .into_iter()
            .find(|child| child.qname().is_some_and(|qname| qname.local_name == local_name))
    }

    /// Descendant reached by following local names from this node.
    pub fn find_schema_node(&self, path: &[&str]) -> Option<&Arc<EffectiveStatement>> {
        let (first, rest) = path.split_first()?;
        let mut current = self.schema_child(first)?;
        for name in rest {
            current = current.schema_child(name)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_stmt(keyword: &str, text: &str) -> Arc<EffectiveStatement> {
        Arc::new(EffectiveStatement::new(
            Keyword::yang(keyword),
            Argument::String(text.to_string()),
            SourceLocation::unknown(),
            None,
            CopyHistory::original(),
            Vec::new(),
            EffectiveKind::Other,
        ))
    }

    #[test]
    fn test_history_append() {
        let history = CopyHistory::original().append(CopyType::AddedByUses);
        assert!(history.is_added_by_uses());
        assert!(!history.is_augmenting());
        let both = history.append(CopyType::AddedByAugmentation);
        assert!(both.is_added_by_uses() && both.is_augmenting());
        assert_eq!(
            CopyHistory::original().append(CopyType::AddedByUsesAugmentation),
            both
        );
        assert!(CopyHistory::original().append(CopyType::Original).is_original());
    }

    #[test]
    fn test_facets_first_occurrence_wins() {
        let substatements = vec![
            text_stmt("description", "first"),
            text_stmt("description", "second"),
            text_stmt("units", "seconds"),
        ];
        let facets = Facets::collect(&substatements);
        assert_eq!(facets.description.as_deref(), Some("first"));
        assert_eq!(facets.units.as_deref(), Some("seconds"));
        assert_eq!(facets.status, Status::Current);
        assert!(facets.config.is_none());
    }

    #[test]
    fn test_facets_are_computed_at_construction() {
        let stmt = EffectiveStatement::new(
            Keyword::yang("leaf"),
            Argument::Identifier("x".into()),
            SourceLocation::unknown(),
            None,
            CopyHistory::original(),
            vec![text_stmt("reference", "RFC 7950")],
            EffectiveKind::Other,
        );
        assert_eq!(stmt.facets().reference.as_deref(), Some("RFC 7950"));
        assert!(stmt.find_first("reference").is_some());
        assert!(stmt.schema_children().is_empty());
    }
}
