// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Foundation types for the YANG inference reactor
//!
//! This crate holds everything that outlives a single build: source locations,
//! identifiers, the raw statement trees handed over by an external parser,
//! and the immutable declared/effective statement model produced at the end of
//! a build.

pub mod argument;
pub mod declared;
pub mod effective;
pub mod identifier;
pub mod location;
pub mod model;
pub mod raw;
pub mod types;

pub use argument::{
    Argument, ArgumentError, DeviateKind, IfFeatureExpr, NodeStep, OrderedBy, PathExpression,
    SchemaNodeIdentifier, Status, YangVersion,
};
pub use declared::DeclaredStatement;
pub use effective::{
    AugmentEffective, CopyHistory, CopyType, EffectiveKind, EffectiveStatement,
    ExtensionEffective, ExtensionInstance, Facets, IdentityEffective, ImportEffective,
    ModuleEffective, SchemaNodeEffective, SchemaNodeKind, SubmoduleEffective, UnknownEffective,
};
pub use identifier::{
    is_identifier, Keyword, QName, QNameModule, Revision, SourceIdentifier, XmlNamespace,
};
pub use location::SourceLocation;
pub use model::EffectiveModel;
pub use raw::RawStatement;
pub use types::{
    BitMember, BuiltinType, EnumMember, LeafrefSpec, Restrictions, TypeDefinition, TypeName,
};
