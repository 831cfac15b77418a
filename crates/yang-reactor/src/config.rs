//! Reactor configuration.
//!
//! A configuration is bound to a [`Reactor`](crate::Reactor) when it is
//! constructed and is shared read-only by every build it runs.
//!
//! ```
//! # use yang_reactor::config::*;
//! let config = ReactorConfig::from_json(r#"{
//!     "unknown_statements": "strict",
//!     "supported_features": { "mode": "only", "features": [ { "module": "m", "name": "fast" } ] }
//! }"#).unwrap();
//! assert_eq!(config.unknown_statements, UnknownStatementPolicy::Strict);
//! assert!(config.supported_features.is_enabled("m", "fast"));
//! assert!(!config.supported_features.is_enabled("m", "slow"));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do with a keyword no statement support is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownStatementPolicy {
    /// Keep it as an opaque unknown-statement node and warn
    #[default]
    Lenient,
    /// Report an unknown-statement error
    Strict,
}

/// A feature named by defining module and feature name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureRef {
    pub module: String,
    pub name: String,
}

impl FeatureRef {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

/// Features considered supported when evaluating `if-feature`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FeatureSet {
    #[default]
    All,
    Only { features: Vec<FeatureRef> },
}

impl FeatureSet {
    pub fn only(features: impl IntoIterator<Item = FeatureRef>) -> Self {
        FeatureSet::Only {
            features: features.into_iter().collect(),
        }
    }

    pub fn is_enabled(&self, module: &str, name: &str) -> bool {
        match self {
            FeatureSet::All => true,
            FeatureSet::Only { features } => features
                .iter()
                .any(|feature| feature.module == module && feature.name == name),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid reactor configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Build-independent settings of a reactor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactorConfig {
    pub unknown_statements: UnknownStatementPolicy,
    pub supported_features: FeatureSet,
}

impl ReactorConfig {
    /// Parse a JSON configuration document. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn strict() -> Self {
        Self {
            unknown_statements: UnknownStatementPolicy::Strict,
            ..Self::default()
        }
    }

    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.supported_features = features;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReactorConfig::default();
        assert_eq!(config.unknown_statements, UnknownStatementPolicy::Lenient);
        assert!(config.supported_features.is_enabled("any", "thing"));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ReactorConfig::from_json("{}").unwrap();
        assert_eq!(config, ReactorConfig::default());
    }

    #[test]
    fn test_invalid_document() {
        let error = ReactorConfig::from_json(r#"{"unknown_statements": "sometimes"}"#).unwrap_err();
        assert!(error.to_string().starts_with("invalid reactor configuration"));
    }

    #[test]
    fn test_only_features() {
        let set = FeatureSet::only([FeatureRef::new("m", "a")]);
        assert!(set.is_enabled("m", "a"));
        assert!(!set.is_enabled("n", "a"));
    }
}
