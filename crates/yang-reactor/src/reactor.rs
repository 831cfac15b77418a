//! The reactor entry point.
//!
//! A [`Reactor`] is an immutable registry plus configuration. It can run any
//! number of builds, concurrently from several threads; each build owns all
//! of its mutable state.
//!
//! ```rust,ignore
//! let reactor = yang_stmt::default_reactor();
//! let model = reactor
//!     .new_build()
//!     .add_source(InMemorySource::from_root(m1))
//!     .add_library_source(InMemorySource::from_root(m2))
//!     .build()?;
//! ```

use std::sync::Arc;

use tracing::debug;
use yang_model::{EffectiveModel, Keyword};

use crate::config::ReactorConfig;
use crate::error::ReactorError;
use crate::namespace::{Namespace, PrefixToModuleNameNs};
use crate::phase::Phase;
use crate::sequencer::run_build;
use crate::source::StatementStreamSource;
use crate::support::{RegisteredSupport, StatementSupport, SupportRegistry};

/// Assembles the support registry and configuration of a [`Reactor`].
#[derive(Debug, Clone)]
pub struct ReactorBuilder {
    registry: SupportRegistry,
    config: ReactorConfig,
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactorBuilder {
    pub fn new() -> Self {
        let mut registry = SupportRegistry::default();
        registry.insert_namespace::<PrefixToModuleNameNs>(Phase::SourcePreLinkage, None);
        Self {
            registry,
            config: ReactorConfig::default(),
        }
    }

    /// Register `support` for `keyword`, materialized from `phase` on. A
    /// later registration for the same keyword replaces the earlier one.
    pub fn add_statement_support(
        self,
        phase: Phase,
        keyword: Keyword,
        support: impl StatementSupport + 'static,
    ) -> Self {
        self.add_shared_support(phase, keyword, Arc::new(support))
    }

    pub fn add_shared_support(
        mut self,
        phase: Phase,
        keyword: Keyword,
        support: Arc<dyn StatementSupport>,
    ) -> Self {
        let replaced = self
            .registry
            .insert_support(keyword.clone(), RegisteredSupport { phase, support });
        if replaced {
            debug!(keyword = %keyword, phase = %phase, "statement support replaced");
        }
        self
    }

    /// Make namespace `N` writable from `phase` on.
    pub fn add_namespace<N: Namespace>(mut self, phase: Phase) -> Self {
        self.registry.insert_namespace::<N>(phase, None);
        self
    }

    /// Make namespace `N` writable from `from` through `until`. Binding it
    /// in a later phase is an internal error.
    pub fn add_namespace_until<N: Namespace>(mut self, from: Phase, until: Phase) -> Self {
        self.registry.insert_namespace::<N>(from, Some(until));
        self
    }

    /// Support used for keywords without a dedicated one.
    pub fn unknown_statement_support(mut self, support: impl StatementSupport + 'static) -> Self {
        self.registry.set_unknown(Arc::new(support));
        self
    }

    pub fn config(mut self, config: ReactorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Reactor {
        Reactor {
            registry: Arc::new(self.registry),
            config: Arc::new(self.config),
        }
    }
}

/// Immutable, shareable statement reactor.
#[derive(Debug, Clone)]
pub struct Reactor {
    registry: Arc<SupportRegistry>,
    config: Arc<ReactorConfig>,
}

impl Reactor {
    pub fn builder() -> ReactorBuilder {
        ReactorBuilder::new()
    }

    pub fn registry(&self) -> &SupportRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Build `requested` sources, pulling in whichever `libraries` they need.
    pub fn build(
        &self,
        requested: &[&dyn StatementStreamSource],
        libraries: &[&dyn StatementStreamSource],
    ) -> Result<EffectiveModel, ReactorError> {
        run_build(self.registry.clone(), self.config.clone(), requested, libraries)
    }

    /// Start collecting sources for one build.
    pub fn new_build(&self) -> BuildAction<'_> {
        BuildAction {
            reactor: self,
            requested: Vec::new(),
            libraries: Vec::new(),
        }
    }
}

/// Sources of one pending build.
pub struct BuildAction<'r> {
    reactor: &'r Reactor,
    requested: Vec<Box<dyn StatementStreamSource + 'r>>,
    libraries: Vec<Box<dyn StatementStreamSource + 'r>>,
}

impl<'r> BuildAction<'r> {
    pub fn add_source(mut self, source: impl StatementStreamSource + 'r) -> Self {
        self.requested.push(Box::new(source));
        self
    }

    pub fn add_sources<S: StatementStreamSource + 'r>(
        mut self,
        sources: impl IntoIterator<Item = S>,
    ) -> Self {
        for source in sources {
            self.requested.push(Box::new(source));
        }
        self
    }

    /// Add a source that is only built if a requested source needs it.
    pub fn add_library_source(mut self, source: impl StatementStreamSource + 'r) -> Self {
        self.libraries.push(Box::new(source));
        self
    }

    pub fn add_library_sources<S: StatementStreamSource + 'r>(
        mut self,
        sources: impl IntoIterator<Item = S>,
    ) -> Self {
        for source in sources {
            self.libraries.push(Box::new(source));
        }
        self
    }

    pub fn build(self) -> Result<EffectiveModel, ReactorError> {
        let requested: Vec<&dyn StatementStreamSource> =
            self.requested.iter().map(|source| &**source as _).collect();
        let libraries: Vec<&dyn StatementStreamSource> =
            self.libraries.iter().map(|source| &**source as _).collect();
        self.reactor.build(&requested, &libraries)
    }
}
