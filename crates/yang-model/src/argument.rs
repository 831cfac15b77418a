//! Typed statement arguments.
//!
//! Every statement carries its raw argument string as written plus a typed
//! form produced by the statement's support. The typed forms that need parsing
//! beyond "is this an identifier" live here and implement `FromStr`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::identifier::{is_identifier, QName, Revision, XmlNamespace};
use crate::types::BuiltinType;

/// Failure to parse a raw argument into its typed form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ArgumentError {
    message: String,
}

impl ArgumentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Typed argument of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Argument {
    /// Statement takes no argument (`input`, `output`)
    None,
    /// Free text (`description`, `pattern`, `range`)
    String(String),
    /// Plain identifier (`container`, `typedef`, `prefix`)
    Identifier(String),
    /// Prefix-resolved reference (`uses`, `base`, derived `type`)
    QName(QName),
    /// Built-in type name
    Builtin(BuiltinType),
    Revision(Revision),
    Namespace(XmlNamespace),
    YangVersion(YangVersion),
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    /// `max-elements`: `None` is "unbounded"
    MaxElements(Option<u64>),
    Status(Status),
    OrderedBy(OrderedBy),
    /// `key` leaf names, in order
    Keys(Vec<String>),
    SchemaNodeId(SchemaNodeIdentifier),
    Path(PathExpression),
    IfFeature(IfFeatureExpr),
    Deviate(DeviateKind),
}

impl Argument {
    /// Text of string-like arguments.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(text) | Argument::Identifier(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_qname(&self) -> Option<&QName> {
        match self {
            Argument::QName(qname) => Some(qname),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_revision(&self) -> Option<&Revision> {
        match self {
            Argument::Revision(revision) => Some(revision),
            _ => None,
        }
    }
}

/// `status` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Current,
    Deprecated,
    Obsolete,
}

impl FromStr for Status {
    type Err = ArgumentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "current" => Ok(Status::Current),
            "deprecated" => Ok(Status::Deprecated),
            "obsolete" => Ok(Status::Obsolete),
            _ => Err(ArgumentError::new(format!("'{text}' is not a valid status"))),
        }
    }
}

/// `ordered-by` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderedBy {
    System,
    User,
}

impl FromStr for OrderedBy {
    type Err = ArgumentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "system" => Ok(OrderedBy::System),
            "user" => Ok(OrderedBy::User),
            _ => Err(ArgumentError::new(format!("'{text}' is not a valid ordered-by value"))),
        }
    }
}

/// `deviate` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviateKind {
    NotSupported,
    Add,
    Replace,
    Delete,
}

impl DeviateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviateKind::NotSupported => "not-supported",
            DeviateKind::Add => "add",
            DeviateKind::Replace => "replace",
            DeviateKind::Delete => "delete",
        }
    }
}

impl FromStr for DeviateKind {
    type Err = ArgumentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "not-supported" => Ok(DeviateKind::NotSupported),
            "add" => Ok(DeviateKind::Add),
            "replace" => Ok(DeviateKind::Replace),
            "delete" => Ok(DeviateKind::Delete),
            _ => Err(ArgumentError::new(format!("'{text}' is not a valid deviate argument"))),
        }
    }
}

impl fmt::Display for DeviateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `yang-version` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum YangVersion {
    #[default]
    V1,
    V1_1,
}

impl FromStr for YangVersion {
    type Err = ArgumentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "1" => Ok(YangVersion::V1),
            "1.1" => Ok(YangVersion::V1_1),
            _ => Err(ArgumentError::new(format!("unsupported yang-version '{text}'"))),
        }
    }
}

/// One `prefix:name` step of a schema node identifier or path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeStep {
    pub prefix: Option<String>,
    pub name: String,
}

impl FromStr for NodeStep {
    type Err = ArgumentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (prefix, name) = match text.split_once(':') {
            Some((prefix, name)) => (Some(prefix), name),
            None => (None, text),
        };
        if let Some(prefix) = prefix {
            if !is_identifier(prefix) {
                return Err(ArgumentError::new(format!("'{prefix}' is not a valid prefix")));
            }
        }
        if !is_identifier(name) {
            return Err(ArgumentError::new(format!("'{name}' is not a valid identifier")));
        }
        Ok(Self {
            prefix: prefix.map(str::to_string),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for NodeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Schema node identifier used by `augment`, `refine` and `deviation`.
///
/// Absolute identifiers start at a module's top level; descendant ones start
/// at the statement they appear under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaNodeIdentifier {
    pub absolute: bool,
    pub steps: Vec<NodeStep>,
}

impl FromStr for SchemaNodeIdentifier {
    type Err = ArgumentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let absolute = trimmed.starts_with('/');
        let body = trimmed.trim_start_matches('/');
        if body.is_empty() {
            return Err(ArgumentError::new(format!(
                "'{text}' is not a valid schema node identifier"
            )));
        }
        let steps = body
            .split('/')
            .map(NodeStep::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { absolute, steps })
    }
}

impl fmt::Display for SchemaNodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, step) in self.steps.iter().enumerate() {
            if self.absolute || index > 0 {
                f.write_str("/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Leaf reference path.
///
/// Predicates are kept in `text` but do not take part in target resolution:
/// they select instances, not schema nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathExpression {
    pub absolute: bool,
    /// Number of leading `..` steps of a relative path
    pub parents: usize,
    pub steps: Vec<NodeStep>,
    pub text: String,
}

impl FromStr for PathExpression {
    type Err = ArgumentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ArgumentError::new(format!("'{text}' is not a valid leafref path"));

        let mut stripped = String::with_capacity(text.len());
        let mut depth = 0usize;
        for c in text.chars() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.checked_sub(1).ok_or_else(invalid)?,
                _ if depth == 0 => stripped.push(c),
                _ => {}
            }
        }
        if depth != 0 {
            return Err(invalid());
        }

        let stripped: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
        let absolute = stripped.starts_with('/');
        let mut parents = 0;
        let mut steps = Vec::new();
        for segment in stripped.split('/').filter(|segment| !segment.is_empty()) {
            if segment == ".." {
                if absolute || !steps.is_empty() {
                    return Err(invalid());
                }
                parents += 1;
            } else {
                steps.push(segment.parse::<NodeStep>().map_err(|_| invalid())?);
            }
        }
        if steps.is_empty() || (!absolute && parents == 0) {
            return Err(invalid());
        }

        Ok(Self {
            absolute,
            parents,
            steps,
            text: text.to_string(),
        })
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `if-feature` expression (RFC 7950 section 7.20.2).
///
/// Precedence from loosest: `or`, `and`, `not`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IfFeatureExpr {
    Feature(NodeStep),
    Not(Box<IfFeatureExpr>),
    And(Box<IfFeatureExpr>, Box<IfFeatureExpr>),
    Or(Box<IfFeatureExpr>, Box<IfFeatureExpr>),
}

impl IfFeatureExpr {
    /// Every feature reference in the expression, left to right.
    pub fn features(&self) -> Vec<&NodeStep> {
        let mut found = Vec::new();
        self.collect_features(&mut found);
        found
    }

    fn collect_features<'a>(&'a self, found: &mut Vec<&'a NodeStep>) {
        match self {
            IfFeatureExpr::Feature(step) => found.push(step),
            IfFeatureExpr::Not(inner) => inner.collect_features(found),
            IfFeatureExpr::And(left, right) | IfFeatureExpr::Or(left, right) => {
                left.collect_features(found);
                right.collect_features(found);
            }
        }
    }

    /// Evaluate with `enabled` deciding each referenced feature.
    pub fn evaluate(&self, enabled: &mut impl FnMut(&NodeStep) -> bool) -> bool {
        match self {
            IfFeatureExpr::Feature(step) => enabled(step),
            IfFeatureExpr::Not(inner) => !inner.evaluate(enabled),
            IfFeatureExpr::And(left, right) => left.evaluate(enabled) && right.evaluate(enabled),
            IfFeatureExpr::Or(left, right) => left.evaluate(enabled) || right.evaluate(enabled),
        }
    }
}

impl FromStr for IfFeatureExpr {
    type Err = ArgumentError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize_if_feature(text)?;
        let mut parser = IfFeatureParser { tokens, position: 0 };
        let expr = parser.parse_or()?;
        if parser.position != parser.tokens.len() {
            return Err(ArgumentError::new(format!(
                "unexpected '{}' in if-feature expression",
                parser.tokens[parser.position]
            )));
        }
        Ok(expr)
    }
}

impl fmt::Display for IfFeatureExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IfFeatureExpr::Feature(step) => write!(f, "{step}"),
            IfFeatureExpr::Not(inner) => write!(f, "not {inner}"),
            IfFeatureExpr::And(left, right) => write!(f, "({left} and {right})"),
            IfFeatureExpr::Or(left, right) => write!(f, "({left} or {right})"),
        }
    }
}

fn tokenize_if_feature(text: &str) -> Result<Vec<String>, ArgumentError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' | ')' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    if tokens.is_empty() {
        return Err(ArgumentError::new("empty if-feature expression"));
    }
    Ok(tokens)
}

struct IfFeatureParser {
    tokens: Vec<String>,
    position: usize,
}

impl IfFeatureParser {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.position).map(String::as_str)
    }

    fn next(&mut self) -> Option<String> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn parse_or(&mut self) -> Result<IfFeatureExpr, ArgumentError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some("or") {
            self.position += 1;
            let right = self.parse_and()?;
            left = IfFeatureExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<IfFeatureExpr, ArgumentError> {
        let mut left = self.parse_not()?;
        while self.peek() == Some("and") {
            self.position += 1;
            let right = self.parse_not()?;
            left = IfFeatureExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<IfFeatureExpr, ArgumentError> {
        if self.peek() == Some("not") {
            self.position += 1;
            return Ok(IfFeatureExpr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<IfFeatureExpr, ArgumentError> {
        match self.next() {
            Some(token) if token == "(" => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(close) if close == ")" => Ok(inner),
                    _ => Err(ArgumentError::new("unbalanced parenthesis in if-feature expression")),
                }
            }
            Some(token) if token == ")" || token == "and" || token == "or" => Err(
                ArgumentError::new(format!("unexpected '{token}' in if-feature expression")),
            ),
            Some(token) => Ok(IfFeatureExpr::Feature(token.parse()?)),
            None => Err(ArgumentError::new("incomplete if-feature expression")),
        }
    }
}
