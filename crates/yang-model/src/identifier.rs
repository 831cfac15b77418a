//! Identifiers used to name modules, statements and schema nodes.
//!
//! # Design
//!
//! - `Revision`: validated `YYYY-MM-DD` date, ordered chronologically
//! - `SourceIdentifier`: module name plus optional revision
//! - `XmlNamespace` / `QNameModule`: the namespace a module places its names in
//! - `QName`: a local name qualified by its module
//! - `Keyword`: a statement keyword, qualified by the defining module for
//!   extension statements
//!
//! # Examples
//!
//! ```
//! # use yang_model::{Revision, SourceIdentifier};
//! let revision: Revision = "2024-02-01".parse().unwrap();
//! let id = SourceIdentifier::new("ietf-interfaces", Some(revision));
//! assert_eq!(id.to_string(), "ietf-interfaces@2024-02-01");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::argument::ArgumentError;

/// Returns true if `text` is a valid YANG identifier.
///
/// Identifiers start with a letter or underscore and continue with letters,
/// digits, underscores, hyphens or dots.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Module revision date.
///
/// The textual `YYYY-MM-DD` form sorts chronologically, so ordering is the
/// string ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// The revision as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Revision {
    type Err = ArgumentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bytes = text.as_bytes();
        let well_formed = bytes.len() == 10
            && bytes.iter().enumerate().all(|(index, byte)| {
                if index == 4 || index == 7 {
                    *byte == b'-'
                } else {
                    byte.is_ascii_digit()
                }
            });
        if !well_formed {
            return Err(ArgumentError::new(format!(
                "'{text}' is not a valid revision date, expected YYYY-MM-DD"
            )));
        }

        let month: u32 = text[5..7].parse().unwrap_or(0);
        let day: u32 = text[8..10].parse().unwrap_or(0);
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(ArgumentError::new(format!(
                "'{text}' is not a valid revision date"
            )));
        }

        Ok(Self(text.to_string()))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uniquely names one input unit: a module or submodule at a revision.
///
/// Ordering is by name first, and an unrevisioned identifier sorts before
/// every revisioned one of the same name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceIdentifier {
    pub name: String,
    pub revision: Option<Revision>,
}

impl SourceIdentifier {
    pub fn new(name: impl Into<String>, revision: Option<Revision>) -> Self {
        Self {
            name: name.into(),
            revision,
        }
    }

    /// Whether this identifier satisfies a reference by `name` and optional
    /// exact `revision`.
    pub fn matches(&self, name: &str, revision: Option<&Revision>) -> bool {
        self.name == name && revision.map_or(true, |wanted| self.revision.as_ref() == Some(wanted))
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(revision) => write!(f, "{}@{}", self.name, revision),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The XML namespace URI a module defines its names in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct XmlNamespace(String);

impl XmlNamespace {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for XmlNamespace {
    type Err = ArgumentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.is_empty() || text.chars().any(char::is_whitespace) || !text.contains(':') {
            return Err(ArgumentError::new(format!("'{text}' is not a valid namespace URI")));
        }
        Ok(Self(text.to_string()))
    }
}

impl fmt::Display for XmlNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Namespace and revision pair that qualifies every name of one module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QNameModule {
    pub namespace: XmlNamespace,
    pub revision: Option<Revision>,
}

impl QNameModule {
    pub fn new(namespace: XmlNamespace, revision: Option<Revision>) -> Self {
        Self {
            namespace,
            revision,
        }
    }
}

impl fmt::Display for QNameModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(revision) => write!(f, "{}@{}", self.namespace, revision),
            None => write!(f, "{}", self.namespace),
        }
    }
}

/// Qualified name: a local identifier inside a module's namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QName {
    pub module: QNameModule,
    pub local_name: String,
}

impl QName {
    pub fn new(module: QNameModule, local_name: impl Into<String>) -> Self {
        Self {
            module,
            local_name: local_name.into(),
        }
    }

    /// Same local name bound into another module.
    pub fn bind_to(&self, module: &QNameModule) -> Self {
        Self::new(module.clone(), self.local_name.clone())
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.module, self.local_name)
    }
}

/// Statement keyword.
///
/// Core language keywords have no module. Extension keywords are qualified
/// by the *name* of the module defining the extension, so the same keyword
/// written with different import prefixes compares equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Keyword {
    pub module: Option<String>,
    pub name: String,
}

impl Keyword {
    /// A core language keyword.
    pub fn yang(name: impl Into<String>) -> Self {
        Self {
            module: None,
            name: name.into(),
        }
    }

    /// An extension keyword defined by module `module`.
    pub fn extension(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            name: name.into(),
        }
    }

    pub fn is_extension(&self) -> bool {
        self.module.is_some()
    }

    /// True for the core keyword `name`.
    pub fn is(&self, name: &str) -> bool {
        self.module.is_none() && self.name == name
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}:{}", module, self.name),
            None => f.write_str(&self.name),
        }
    }
}
