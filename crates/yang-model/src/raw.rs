//! Raw statement trees.
//!
//! The reactor does not read source text. An external parser hands over one
//! `RawStatement` tree per source: keyword as written (possibly
//! `prefix:name`), raw argument and location, with children in declaration
//! order. Trees are serde-serializable so parsers in other processes can hand
//! them over as JSON.
//!
//! The [`statements!`](crate::statements) macro builds trees inline:
//!
//! ```
//! # use yang_model::statements;
//! let tree = statements! {
//!     module "m" {
//!         namespace "urn:m";
//!         prefix "m";
//!         "yang-version" "1.1";
//!         container "root" { leaf "name" { type "string"; } }
//!     }
//! };
//! assert_eq!(tree[0].keyword, "module");
//! assert_eq!(tree[0].children.len(), 4);
//! ```

use serde::{Deserialize, Serialize};

use crate::location::SourceLocation;

/// A statement exactly as the parser produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatement {
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawStatement>,
}

impl RawStatement {
    pub fn new(keyword: impl Into<String>, argument: Option<&str>) -> Self {
        Self {
            keyword: keyword.into(),
            argument: argument.map(str::to_string),
            location: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<RawStatement>) -> Self {
        self.children = children;
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// First child with keyword `keyword`.
    pub fn child(&self, keyword: &str) -> Option<&RawStatement> {
        self.children.iter().find(|child| child.keyword == keyword)
    }

    pub fn children_named<'a>(
        &'a self,
        keyword: &'a str,
    ) -> impl Iterator<Item = &'a RawStatement> {
        self.children.iter().filter(move |child| child.keyword == keyword)
    }

    /// Give every statement without a location a synthetic one in `source`.
    ///
    /// Statements are numbered in pre-order starting at line 1, so siblings
    /// get distinct, stable positions.
    pub fn assign_locations(&mut self, source: &str) {
        let source: std::sync::Arc<str> = source.into();
        let mut line = 0u32;
        self.assign_locations_from(&source, &mut line, 1);
    }

    fn assign_locations_from(&mut self, source: &std::sync::Arc<str>, line: &mut u32, depth: u32) {
        *line += 1;
        if self.location.is_none() {
            self.location = Some(SourceLocation::new(source.clone(), *line, depth * 2 - 1));
        }
        for child in &mut self.children {
            child.assign_locations_from(source, line, depth + 1);
        }
    }

    /// Total number of statements in this tree.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(RawStatement::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Build a `Vec<RawStatement>` from YANG-like syntax.
///
/// Keywords are bare identifiers or string literals (for keywords containing
/// `-` or a prefix); arguments are string literals. A statement ends with `;`
/// or a `{ ... }` block.
#[macro_export]
macro_rules! statements {
    (@munch $acc:ident) => {};
    (@munch $acc:ident $kw:ident $arg:literal ; $($rest:tt)*) => {
        $acc.push($crate::raw::RawStatement::new(stringify!($kw), Some($arg)));
        $crate::statements!(@munch $acc $($rest)*);
    };
    (@munch $acc:ident $kw:literal $arg:literal ; $($rest:tt)*) => {
        $acc.push($crate::raw::RawStatement::new($kw, Some($arg)));
        $crate::statements!(@munch $acc $($rest)*);
    };
    (@munch $acc:ident $kw:ident ; $($rest:tt)*) => {
        $acc.push($crate::raw::RawStatement::new(stringify!($kw), None));
        $crate::statements!(@munch $acc $($rest)*);
    };
    (@munch $acc:ident $kw:literal ; $($rest:tt)*) => {
        $acc.push($crate::raw::RawStatement::new($kw, None));
        $crate::statements!(@munch $acc $($rest)*);
    };
    (@munch $acc:ident $kw:ident $arg:literal { $($body:tt)* } $($rest:tt)*) => {
        $acc.push(
            $crate::raw::RawStatement::new(stringify!($kw), Some($arg))
                .with_children($crate::statements!($($body)*)),
        );
        $crate::statements!(@munch $acc $($rest)*);
    };
    (@munch $acc:ident $kw:literal $arg:literal { $($body:tt)* } $($rest:tt)*) => {
        $acc.push(
            $crate::raw::RawStatement::new($kw, Some($arg))
                .with_children($crate::statements!($($body)*)),
        );
        $crate::statements!(@munch $acc $($rest)*);
    };
    (@munch $acc:ident $kw:ident { $($body:tt)* } $($rest:tt)*) => {
        $acc.push(
            $crate::raw::RawStatement::new(stringify!($kw), None)
                .with_children($crate::statements!($($body)*)),
        );
        $crate::statements!(@munch $acc $($rest)*);
    };
    (@munch $acc:ident $kw:literal { $($body:tt)* } $($rest:tt)*) => {
        $acc.push(
            $crate::raw::RawStatement::new($kw, None)
                .with_children($crate::statements!($($body)*)),
        );
        $crate::statements!(@munch $acc $($rest)*);
    };
    ($($body:tt)*) => {{
        #[allow(unused_mut)]
        let mut statements: ::std::vec::Vec<$crate::raw::RawStatement> = ::std::vec::Vec::new();
        $crate::statements!(@munch statements $($body)*);
        statements
    }};
}

/// Build a single `RawStatement` (the first one written).
#[macro_export]
macro_rules! statement {
    ($($body:tt)*) => {
        $crate::statements!($($body)*).into_iter().next().unwrap_or_default()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement;

    #[test]
    fn test_macro_builds_nested_tree() {
        let module = statement! {
            module "m1" {
                namespace "urn:m1";
                prefix "m1";
                import "m2" { prefix "m2"; "revision-date" "2020-01-01"; }
                leaf "x" { type "leafref" { path "/m2:root/m2:leaf"; } }
                input;
            }
        };
        assert_eq!(module.keyword, "module");
        assert_eq!(module.argument(), Some("m1"));
        let import = module.child("import").unwrap();
        assert_eq!(import.child("revision-date").unwrap().argument(), Some("2020-01-01"));
        let leaf = module.child("leaf").unwrap();
        assert_eq!(leaf.children[0].keyword, "type");
        assert_eq!(module.child("input").unwrap().argument(), None);
        assert_eq!(module.len(), 10);
    }

    #[test]
    fn test_assign_locations_is_preorder() {
        let mut module = statement! {
            module "m" { typedef "a" { type "string"; } typedef "b" { type "string"; } }
        };
        module.assign_locations("m.yang");
        let lines: Vec<u32> = module
            .children_named("typedef")
            .map(|t| t.location.as_ref().unwrap().line)
            .collect();
        assert_eq!(lines, [2, 4]);
        assert_eq!(module.location.as_ref().unwrap().to_string(), "m.yang:1:1");
    }

    #[test]
    fn test_assign_locations_keeps_existing() {
        let mut module = RawStatement::new("module", Some("m"))
            .with_location(SourceLocation::new("real.yang", 7, 1));
        module.assign_locations("m.yang");
        assert_eq!(module.location.unwrap().to_string(), "real.yang:7:1");
    }

    #[test]
    fn test_json_roundtrip_omits_empty_fields() {
        let module = statement! { module "m" { input; } };
        let json = serde_json::to_string(&module).unwrap();
        assert!(!json.contains("location"));
        let back: RawStatement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, module);
    }
}
