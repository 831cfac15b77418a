//! Substatement cardinality validation.
//!
//! Each statement support may declare which core substatements it accepts and
//! how often. Validation runs once per declared statement when it reaches
//! FULL_DECLARATION, over the keywords as written, so a child that failed to
//! materialize still counts. Extension instances (prefixed keywords) are
//! always allowed, and keywords without any registered support are left to
//! the unknown-statement policy.

use indexmap::IndexMap;
use yang_model::{Keyword, SourceLocation};

use crate::error::{ErrorKind, SourceError};

/// How many times a substatement may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Exactly once
    Mandatory,
    /// At most once
    Optional,
    /// Any number of times
    Any,
    /// One or more times
    AtLeastOne,
}

impl Cardinality {
    fn min(self) -> usize {
        match self {
            Cardinality::Mandatory | Cardinality::AtLeastOne => 1,
            Cardinality::Optional | Cardinality::Any => 0,
        }
    }

    fn max(self) -> Option<usize> {
        match self {
            Cardinality::Mandatory | Cardinality::Optional => Some(1),
            Cardinality::Any | Cardinality::AtLeastOne => None,
        }
    }
}

/// Allowed substatements of one statement kind.
#[derive(Debug, Clone, Default)]
pub struct SubstatementValidator {
    rules: IndexMap<String, Cardinality>,
}

impl SubstatementValidator {
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::default()
    }

    /// Validator accepting no core substatements.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn cardinality(&self, keyword: &str) -> Option<Cardinality> {
        self.rules.get(keyword).copied()
    }

    /// Check `children` (keyword as written, location) of the statement
    /// `keyword` at `location`. `is_known` tells whether a core keyword has a
    /// registered support at all.
    pub fn validate(
        &self,
        keyword: &Keyword,
        location: &SourceLocation,
        children: &[(String, SourceLocation)],
        is_known: impl Fn(&str) -> bool,
    ) -> Vec<SourceError> {
        let mut errors = Vec::new();
        let mut counts: IndexMap<&str, Vec<&SourceLocation>> = IndexMap::new();

        for (child, child_location) in children {
            if child.contains(':') || !is_known(child) {
                continue;
            }
            if !self.rules.contains_key(child.as_str()) {
                errors.push(SourceError::new(
                    ErrorKind::SubstatementValidation,
                    child_location.clone(),
                    format!("'{child}' is not allowed in '{keyword}'"),
                ));
                continue;
            }
            counts.entry(child.as_str()).or_default().push(child_location);
        }

        for (child, cardinality) in &self.rules {
            let seen = counts.get(child.as_str()).map_or(&[][..], Vec::as_slice);
            if seen.len() < cardinality.min() {
                errors.push(SourceError::new(
                    ErrorKind::SubstatementValidation,
                    location.clone(),
                    format!("missing mandatory substatement '{child}' in '{keyword}'"),
                ));
            }
            if let Some(max) = cardinality.max() {
                if let Some(extra) = seen.get(max) {
                    errors.push(
                        SourceError::new(
                            ErrorKind::SubstatementValidation,
                            (*extra).clone(),
                            format!("'{child}' may appear at most {max} time(s) in '{keyword}'"),
                        )
                        .with_label(seen[0].clone(), "first occurrence"),
                    );
                }
            }
        }

        errors
    }
}

#[derive(Debug, Default)]
pub struct ValidatorBuilder {
    rules: IndexMap<String, Cardinality>,
}

impl ValidatorBuilder {
    pub fn add(mut self, keyword: &str, cardinality: Cardinality) -> Self {
        self.rules.insert(keyword.to_string(), cardinality);
        self
    }

    pub fn mandatory(self, keyword: &str) -> Self {
        self.add(keyword, Cardinality::Mandatory)
    }

    pub fn optional(self, keyword: &str) -> Self {
        self.add(keyword, Cardinality::Optional)
    }

    pub fn any(self, keyword: &str) -> Self {
        self.add(keyword, Cardinality::Any)
    }

    pub fn at_least_one(self, keyword: &str) -> Self {
        self.add(keyword, Cardinality::AtLeastOne)
    }

    /// Add every keyword of `keywords` with `cardinality`.
    pub fn all(mut self, keywords: &[&str], cardinality: Cardinality) -> Self {
        for keyword in keywords {
            self = self.add(keyword, cardinality);
        }
        self
    }

    pub fn build(self) -> SubstatementValidator {
        SubstatementValidator { rules: self.rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn children(keywords: &[&str]) -> Vec<(String, SourceLocation)> {
        keywords
            .iter()
            .enumerate()
            .map(|(index, keyword)| {
                let location = SourceLocation::new("t.yang", index as u32 + 2, 3);
                (keyword.to_string(), location)
            })
            .collect()
    }

    fn import_validator() -> SubstatementValidator {
        SubstatementValidator::builder()
            .mandatory("prefix")
            .optional("revision-date")
            .optional("description")
            .build()
    }

    #[test]
    fn test_valid_children() {
        let errors = import_validator().validate(
            &Keyword::yang("import"),
            &SourceLocation::new("t.yang", 1, 1),
            &children(&["prefix", "description"]),
            |_| true,
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_mandatory() {
        let errors = import_validator().validate(
            &Keyword::yang("import"),
            &SourceLocation::new("t.yang", 1, 1),
            &children(&["description"]),
            |_| true,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("missing mandatory substatement 'prefix'"));
        assert_eq!(errors[0].location.line, 1);
    }

    #[test]
    fn test_duplicated_singular() {
        let errors = import_validator().validate(
            &Keyword::yang("import"),
            &SourceLocation::new("t.yang", 1, 1),
            &children(&["prefix", "prefix"]),
            |_| true,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location.line, 3);
        assert_eq!(errors[0].labels[0].location.line, 2);
    }

    #[test]
    fn test_disallowed_child() {
        let errors = import_validator().validate(
            &Keyword::yang("import"),
            &SourceLocation::new("t.yang", 1, 1),
            &children(&["prefix", "leaf"]),
            |_| true,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("'leaf' is not allowed in 'import'"));
    }

    #[test]
    fn test_extensions_and_unknown_keywords_are_skipped() {
        let errors = import_validator().validate(
            &Keyword::yang("import"),
            &SourceLocation::new("t.yang", 1, 1),
            &children(&["prefix", "ext:marker", "frobnicate"]),
            |keyword| keyword != "frobnicate",
        );
        assert!(errors.is_empty());
    }
}
