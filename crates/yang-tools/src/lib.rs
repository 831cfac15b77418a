// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! YANG Tools
//!
//! Loading of statement trees serialized as JSON and the helpers behind the
//! `yang-build` command.
//!
//! A source file holds one [`RawStatement`] tree, the output of an external
//! YANG parser:
//!
//! ```json
//! { "keyword": "module", "argument": "m", "children": [
//!     { "keyword": "namespace", "argument": "urn:m" },
//!     { "keyword": "prefix", "argument": "m" } ] }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;
use yang_model::{EffectiveModel, EffectiveStatement, RawStatement, SourceLocation};
use yang_reactor::{ConfigError, ErrorKind, ReactorConfig, SourceError, StatementStreamSource};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Default is `warn`, with `info` for the reactor and the tools.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,yang_reactor=info,yang_tools=info"));

    fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("'{0}' does not exist")]
    NotFound(PathBuf),

    #[error("cannot walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A statement tree stored as a JSON file, read when the build asks for it.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    name: String,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatementStreamSource for JsonFileSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn statements(&self) -> Result<RawStatement, SourceError> {
        let missing = |note: String| {
            SourceError::new(
                ErrorKind::MissingSource,
                SourceLocation::of_source(self.name.as_str()),
                format!("source '{}' could not be read", self.name),
            )
            .with_note(note)
        };
        let text = fs::read_to_string(&self.path).map_err(|error| missing(error.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|error| missing(format!("invalid statement tree: {error}")))
    }
}

/// Sources named by `paths`: files are taken as given, directories are
/// walked for `*.json` files. The result is sorted by path.
pub fn collect_sources(paths: &[PathBuf]) -> Result<Vec<JsonFileSource>, ToolError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path) {
                let entry = entry?;
                let is_json = entry.path().extension().is_some_and(|extension| extension == "json");
                if entry.file_type().is_file() && is_json {
                    files.push(entry.into_path());
                }
            }
        } else {
            return Err(ToolError::NotFound(path.clone()));
        }
    }
    files.sort();
    files.dedup();
    debug!(count = files.len(), "sources collected");
    Ok(files.into_iter().map(JsonFileSource::new).collect())
}

/// Reactor configuration from a JSON file, or the default one.
pub fn load_config(path: Option<&Path>) -> Result<ReactorConfig, ToolError> {
    let Some(path) = path else {
        return Ok(ReactorConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ReactorConfig::from_json(&text)?)
}

/// One-line description of a built module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSummary {
    pub name: String,
    pub revision: Option<String>,
    pub namespace: String,
    /// Top-level schema nodes, submodules included
    pub top_level: usize,
    /// Every schema node in the module's tree
    pub schema_nodes: usize,
}

impl std::fmt::Display for ModuleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(revision) = &self.revision {
            write!(f, "@{revision}")?;
        }
        write!(
            f,
            " {} ({} top-level, {} schema nodes)",
            self.namespace, self.top_level, self.schema_nodes
        )
    }
}

fn count_schema_nodes(stmt: &EffectiveStatement) -> usize {
    stmt.schema_children().into_iter().map(|child| 1 + count_schema_nodes(child)).sum()
}

pub fn summarize(model: &EffectiveModel) -> Vec<ModuleSummary> {
    model
        .modules()
        .iter()
        .filter_map(|root| {
            let module = root.as_module()?;
            Some(ModuleSummary {
                name: module.name.clone(),
                revision: module.revision.as_ref().map(|revision| revision.as_str().to_string()),
                namespace: module.qname_module.namespace.as_str().to_string(),
                top_level: root.schema_children().len(),
                schema_nodes: count_schema_nodes(root),
            })
        })
        .collect()
}
