//! Resolved type definitions.
//!
//! A `TypeDefinition` is what the `type` and `typedef` statements resolve to.
//! Derived types keep a pointer to their base so tooling can walk the chain;
//! restrictions are already merged down the chain, so the restrictions of any
//! definition are the effective ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::argument::PathExpression;
use crate::identifier::QName;

/// The built-in types of RFC 7950 section 4.2.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinType {
    Binary,
    Bits,
    Boolean,
    Decimal64,
    Empty,
    Enumeration,
    IdentityRef,
    InstanceIdentifier,
    Int8,
    Int16,
    Int32,
    Int64,
    LeafRef,
    String,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Union,
}

const BUILTIN_NAMES: &[(&str, BuiltinType)] = &[
    ("binary", BuiltinType::Binary),
    ("bits", BuiltinType::Bits),
    ("boolean", BuiltinType::Boolean),
    ("decimal64", BuiltinType::Decimal64),
    ("empty", BuiltinType::Empty),
    ("enumeration", BuiltinType::Enumeration),
    ("identityref", BuiltinType::IdentityRef),
    ("instance-identifier", BuiltinType::InstanceIdentifier),
    ("int8", BuiltinType::Int8),
    ("int16", BuiltinType::Int16),
    ("int32", BuiltinType::Int32),
    ("int64", BuiltinType::Int64),
    ("leafref", BuiltinType::LeafRef),
    ("string", BuiltinType::String),
    ("uint8", BuiltinType::Uint8),
    ("uint16", BuiltinType::Uint16),
    ("uint32", BuiltinType::Uint32),
    ("uint64", BuiltinType::Uint64),
    ("union", BuiltinType::Union),
];

impl BuiltinType {
    pub fn from_name(name: &str) -> Option<Self> {
        BUILTIN_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, builtin)| *builtin)
    }

    pub fn name(self) -> &'static str {
        BUILTIN_NAMES
            .iter()
            .find(|(_, builtin)| *builtin == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BuiltinType::Int8
                | BuiltinType::Int16
                | BuiltinType::Int32
                | BuiltinType::Int64
                | BuiltinType::Uint8
                | BuiltinType::Uint16
                | BuiltinType::Uint32
                | BuiltinType::Uint64
        )
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name of a type definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeName {
    Builtin(BuiltinType),
    Derived(QName),
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeName::Builtin(builtin) => write!(f, "{builtin}"),
            TypeName::Derived(qname) => write!(f, "{qname}"),
        }
    }
}

/// Value restrictions, merged along the derivation chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restrictions {
    pub range: Option<String>,
    pub length: Option<String>,
    pub patterns: Vec<String>,
    pub fraction_digits: Option<u8>,
    pub require_instance: Option<bool>,
}

impl Restrictions {
    /// `self` refined by `derived`: set values override, patterns accumulate.
    pub fn refined_by(&self, derived: &Restrictions) -> Restrictions {
        let mut patterns = self.patterns.clone();
        patterns.extend(derived.patterns.iter().cloned());
        Restrictions {
            range: derived.range.clone().or_else(|| self.range.clone()),
            length: derived.length.clone().or_else(|| self.length.clone()),
            patterns,
            fraction_digits: derived.fraction_digits.or(self.fraction_digits),
            require_instance: derived.require_instance.or(self.require_instance),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Restrictions::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitMember {
    pub name: String,
    pub position: u64,
}

/// Leafref path with its resolved target type.
///
/// `target` is empty for leafrefs that are never instantiated, such as those
/// inside groupings or relative paths inside typedefs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafrefSpec {
    pub path: PathExpression,
    pub target: Option<Arc<TypeDefinition>>,
}

/// Fully resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: TypeName,
    /// Built-in type at the bottom of the derivation chain
    pub builtin: BuiltinType,
    pub base: Option<Arc<TypeDefinition>>,
    pub restrictions: Restrictions,
    pub enums: Vec<EnumMember>,
    pub bits: Vec<BitMember>,
    pub identity_bases: Vec<QName>,
    pub union_members: Vec<Arc<TypeDefinition>>,
    pub leafref: Option<LeafrefSpec>,
    pub units: Option<String>,
    pub default: Option<String>,
    pub description: Option<String>,
}

impl TypeDefinition {
    /// Unrestricted built-in type.
    pub fn builtin(builtin: BuiltinType) -> Self {
        Self {
            name: TypeName::Builtin(builtin),
            builtin,
            base: None,
            restrictions: Restrictions::default(),
            enums: Vec::new(),
            bits: Vec::new(),
            identity_bases: Vec::new(),
            union_members: Vec::new(),
            leafref: None,
            units: None,
            default: None,
            description: None,
        }
    }

    /// New definition named `name` deriving from `base`, inheriting everything.
    pub fn derive(name: TypeName, base: Arc<TypeDefinition>) -> Self {
        Self {
            name,
            builtin: base.builtin,
            restrictions: base.restrictions.clone(),
            enums: base.enums.clone(),
            bits: base.bits.clone(),
            identity_bases: base.identity_bases.clone(),
            union_members: base.union_members.clone(),
            leafref: base.leafref.clone(),
            units: base.units.clone(),
            default: base.default.clone(),
            description: None,
            base: Some(base),
        }
    }

    /// This definition followed by its bases, nearest first.
    pub fn chain(&self) -> impl Iterator<Item = &TypeDefinition> {
        std::iter::successors(Some(self), |current| current.base.as_deref())
    }

    /// Type of the node a leafref points to, if resolved.
    pub fn leafref_target(&self) -> Option<&Arc<TypeDefinition>> {
        self.leafref.as_ref().and_then(|spec| spec.target.as_ref())
    }

    /// Follow leafref targets until a non-leafref type is reached.
    pub fn resolved_target(&self) -> Option<&TypeDefinition> {
        let mut current = self;
        for _ in 0..64 {
            if current.builtin != BuiltinType::LeafRef {
                return Some(current);
            }
            current = current.leafref_target()?;
        }
        None
    }
}
