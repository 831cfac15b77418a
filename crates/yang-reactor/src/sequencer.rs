//! Phase sequencing: materialization, declaration hooks and phase ends.
//!
//! Every phase after INIT runs the same steps over all sources:
//!
//! 1. materialize the raw statements whose support is available in the phase
//! 2. run `on_statement_added` for new contexts, then the declaration hooks
//!    bottom-up in declaration order
//! 3. run the inference fixpoint
//! 4. end the phase: collected diagnostics fail the build here
//!
//! Unprefixed keywords without a support and extension instances are only
//! materialized at FULL_DECLARATION, when every import prefix is bound.

use std::collections::HashSet;
use std::mem;
use std::sync::Arc;

use tracing::{debug, info, warn};
use yang_model::{CopyHistory, EffectiveModel, Keyword, RawStatement, SourceLocation};

use crate::build::{BuildState, StmtMut};
use crate::config::{ReactorConfig, UnknownStatementPolicy};
use crate::context::{ContextId, SourceId, StatementContext};
use crate::effective::EffectiveModelBuilder;
use crate::error::{ErrorKind, ReactorError, SourceError};
use crate::namespace::{NamespaceStorage, PrefixToModuleNameNs};
use crate::phase::Phase;
use crate::source::{select_sources, LoadedSource, StatementStreamSource};
use crate::support::{ParseContext, StatementSupport, SupportRegistry};

/// How a raw child is handled in the current phase.
enum Decision {
    Defer,
    Reject(SourceError),
    Materialize {
        keyword: Keyword,
        support: Arc<dyn StatementSupport>,
        phase: Phase,
    },
}

/// Run one complete build.
pub(crate) fn run_build(
    registry: Arc<SupportRegistry>,
    config: Arc<ReactorConfig>,
    requested: &[&dyn StatementStreamSource],
    libraries: &[&dyn StatementStreamSource],
) -> Result<EffectiveModel, ReactorError> {
    info!(requested = requested.len(), libraries = libraries.len(), "build started");

    let mut errors = Vec::new();
    let requested = read_all(requested, true, &mut errors);
    let libraries = read_all(libraries, false, &mut errors);
    if !errors.is_empty() {
        return Err(ReactorError::Failed {
            phase: Phase::Init,
            errors,
        });
    }

    let selected = select_sources(requested, libraries);
    debug!(selected = selected.len(), "sources selected");

    let mut state = BuildState::new(registry, config, selected);
    for phase in Phase::ALL.into_iter().skip(1) {
        state.run_phase(phase)?;
    }

    let model = EffectiveModelBuilder::new(&state).build_model()?;
    info!(modules = model.modules().len(), contexts = state.contexts.len(), "build finished");
    Ok(model)
}

fn read_all(
    sources: &[&dyn StatementStreamSource],
    requested: bool,
    errors: &mut Vec<SourceError>,
) -> Vec<LoadedSource> {
    let mut loaded = Vec::new();
    for source in sources {
        match LoadedSource::read(*source, requested) {
            Ok(source) => loaded.push(source),
            Err(error) => errors.push(error),
        }
    }
    loaded
}

impl BuildState {
    pub fn run_phase(&mut self, phase: Phase) -> Result<(), ReactorError> {
        self.phase = phase;
        self.materialize()?;
        debug!(
            phase = %phase,
            contexts = self.contexts.len(),
            pending = self.engine.pending_for(phase),
            "phase started"
        );
        self.run_fresh_hooks()?;
        for root in self.roots() {
            self.run_declaration_hooks(root)?;
        }
        self.run_fresh_hooks()?;
        self.run_fixpoint()?;
        self.end_phase()
    }

    fn end_phase(&mut self) -> Result<(), ReactorError> {
        let phase = self.phase;
        if let Some(internal) = self.diagnostics.iter().find(|error| error.is_internal()) {
            return Err(ReactorError::Internal(internal.clone()));
        }
        if !self.diagnostics.is_empty() {
            let errors = mem::take(&mut self.diagnostics);
            debug!(phase = %phase, errors = errors.len(), "phase failed");
            return Err(ReactorError::Failed { phase, errors });
        }
        for source in &self.sources {
            let Some(root) = source.root else { continue };
            let ctx = self.ctx(root);
            if !ctx.has_completed(phase) {
                return Err(ReactorError::Internal(SourceError::internal(
                    ctx.location.clone(),
                    format!("source '{}' did not complete {phase}", source.name),
                )));
            }
            debug!(source = %source.name, phase = %phase, "source completed");
        }
        Ok(())
    }

    fn materialize(&mut self) -> Result<(), ReactorError> {
        for index in 0..self.sources.len() {
            if self.sources[index].root.is_none() {
                self.materialize_root(index)?;
            }
            if let Some(root) = self.sources[index].root {
                self.materialize_children(root)?;
            }
        }
        Ok(())
    }

    fn materialize_root(&mut self, index: usize) -> Result<(), ReactorError> {
        let Some(raw) = &self.sources[index].raw else {
            return Ok(());
        };
        let keyword = Keyword::yang(raw.keyword.as_str());
        let Some(registered) = self.registry.get(&keyword).cloned() else {
            let location = self.raw_location(raw, SourceId(index as u32));
            self.sources[index].raw = None;
            return self.report(SourceError::new(
                ErrorKind::UnknownStatement,
                location,
                format!("no statement support for root statement '{keyword}'"),
            ));
        };
        if registered.phase > self.phase {
            return Ok(());
        }
        let Some(raw) = self.sources[index].raw.take() else {
            return Ok(());
        };
        let root = self.create_context(
            raw,
            None,
            SourceId(index as u32),
            0,
            keyword,
            registered.support,
            registered.phase,
        )?;
        self.sources[index].root = root;
        Ok(())
    }

    fn materialize_children(&mut self, id: ContextId) -> Result<(), ReactorError> {
        let pending: Vec<usize> = self
            .ctx(id)
            .raw_children
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| raw.as_ref().map(|_| index))
            .collect();

        for index in pending {
            let Some(raw) = &self.ctx(id).raw_children[index] else { continue };
            let location = self.raw_location(raw, self.ctx(id).source);
            let decision = self.decide(id, &raw.keyword, &location);
            match decision {
                Decision::Defer => {}
                Decision::Reject(error) => {
                    self.ctx_mut(id).raw_children[index] = None;
                    self.report(error)?;
                }
                Decision::Materialize { keyword, support, phase } => {
                    let Some(raw) = self.ctx_mut(id).raw_children[index].take() else { continue };
                    let source = self.ctx(id).source;
                    self.create_context(raw, Some(id), source, index, keyword, support, phase)?;
                }
            }
        }

        for child in self.ctx(id).declared.clone() {
            self.materialize_children(child)?;
        }
        Ok(())
    }

    fn decide(&self, parent: ContextId, raw_keyword: &str, location: &SourceLocation) -> Decision {
        let phase = self.phase;
        let full = phase >= Phase::FullDeclaration;

        if let Some((prefix, name)) = raw_keyword.split_once(':') {
            if !full {
                return Decision::Defer;
            }
            let Some(module) = self
                .lookup::<PrefixToModuleNameNs>(parent, &prefix.to_string())
                .map(|binding| binding.value.clone())
            else {
                return Decision::Reject(SourceError::new(
                    ErrorKind::UnresolvedReference,
                    location.clone(),
                    format!(
                        "prefix '{prefix}' of statement '{raw_keyword}' is not bound to any module"
                    ),
                ));
            };
            let keyword = Keyword::extension(module, name);
            return match self.registry.get(&keyword) {
                Some(registered) if registered.phase <= phase => Decision::Materialize {
                    keyword,
                    support: registered.support.clone(),
                    phase: registered.phase,
                },
                Some(_) => Decision::Defer,
                None => match self.registry.unknown_support() {
                    Some(support) => Decision::Materialize {
                        keyword,
                        support: support.clone(),
                        phase,
                    },
                    None => Decision::Reject(SourceError::new(
                        ErrorKind::UnknownStatement,
                        location.clone(),
                        format!("no statement support for extension '{raw_keyword}'"),
                    )),
                },
            };
        }

        let keyword = Keyword::yang(raw_keyword);
        match self.registry.get(&keyword) {
            Some(registered) if registered.phase <= phase => Decision::Materialize {
                keyword,
                support: registered.support.clone(),
                phase: registered.phase,
            },
            Some(_) => Decision::Defer,
            None if !full => Decision::Defer,
            None => match (self.config.unknown_statements, self.registry.unknown_support()) {
                (UnknownStatementPolicy::Lenient, Some(support)) => {
                    warn!(
                        keyword = raw_keyword,
                        location = %location,
                        "preserving unknown statement"
                    );
                    Decision::Materialize {
                        keyword,
                        support: support.clone(),
                        phase,
                    }
                }
                _ => Decision::Reject(SourceError::new(
                    ErrorKind::UnknownStatement,
                    location.clone(),
                    format!("unknown statement '{raw_keyword}'"),
                )),
            },
        }
    }

    fn raw_location(&self, raw: &RawStatement, source: SourceId) -> SourceLocation {
        raw.location
            .clone()
            .unwrap_or_else(|| {
                SourceLocation::of_source(self.sources[source.index()].name.as_str())
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn create_context(
        &mut self,
        raw: RawStatement,
        parent: Option<ContextId>,
        source: SourceId,
        raw_index: usize,
        keyword: Keyword,
        support: Arc<dyn StatementSupport>,
        support_phase: Phase,
    ) -> Result<Option<ContextId>, ReactorError> {
        let location = self.raw_location(&raw, source);
        let parsed = {
            let parse = ParseContext {
                keyword: &keyword,
                location: &location,
                parent: parent.map(|id| self.stmt(id)),
            };
            support.parse_argument(raw.argument.as_deref(), &parse)
        };
        let argument = match parsed {
            Ok(argument) => argument,
            Err(error) => {
                self.report(error)?;
                return Ok(None);
            }
        };

        let hooks_done = support_phase.min(self.phase).previous();
        let next_id = ContextId(self.contexts.len() as u32);
        let module_root = parent.map_or(next_id, |id| self.ctx(id).module_root);
        let child_keywords = raw
            .children
            .iter()
            .map(|child| (child.keyword.clone(), self.raw_location(child, source)))
            .collect();

        let context = StatementContext {
            keyword,
            raw_argument: raw.argument,
            argument,
            location,
            support,
            source,
            parent,
            declared: Vec::new(),
            effective: Vec::new(),
            raw_children: raw.children.into_iter().map(Some).collect(),
            child_keywords,
            raw_index,
            storage: NamespaceStorage::default(),
            linked_roots: Vec::new(),
            completed: hooks_done,
            hooks_done,
            history: CopyHistory::original(),
            prototype: None,
            module_root,
            unsupported: false,
            removed: false,
            modified: false,
        };
        let id = self.push_context(context);

        if let Some(parent) = parent {
            let declared = &self.ctx(parent).declared;
            let position = declared.partition_point(|child| self.ctx(*child).raw_index < raw_index);
            self.ctx_mut(parent).declared.insert(position, id);
        }
        Ok(Some(id))
    }

    /// Run `on_statement_added` for contexts created since the last call,
    /// then bring their subtrees' declaration hooks up to date.
    pub fn run_fresh_hooks(&mut self) -> Result<(), ReactorError> {
        while !self.fresh.is_empty() {
            let fresh = mem::take(&mut self.fresh);
            for id in &fresh {
                let support = self.ctx(*id).support.clone();
                if let Err(error) = support.on_statement_added(&mut StmtMut::new(self, *id)) {
                    self.report(error)?;
                }
            }
            let created: HashSet<ContextId> = fresh.iter().copied().collect();
            for id in fresh {
                let top = self.ctx(id).parent.map_or(true, |parent| !created.contains(&parent));
                if top {
                    self.run_declaration_hooks(id)?;
                }
            }
        }
        Ok(())
    }

    /// Run pending declaration hooks of `id`'s subtree, children first.
    fn run_declaration_hooks(&mut self, id: ContextId) -> Result<(), ReactorError> {
        for child in self.ctx(id).child_ids() {
            self.run_declaration_hooks(child)?;
        }

        let target = self.phase.min(Phase::FullDeclaration);
        while !self.ctx(id).hooks_reached(target) {
            let next = match self.ctx(id).hooks_done {
                None => Phase::Init,
                Some(done) => match done.next() {
                    Some(next) => next,
                    None => break,
                },
            };
            if next == Phase::FullDeclaration && !self.ctx(id).is_copy() {
                self.validate_substatements(id)?;
            }
            let support = self.ctx(id).support.clone();
            let mut stmt = StmtMut::new(self, id);
            let result = match next {
                Phase::SourcePreLinkage => support.on_pre_linkage_declared(&mut stmt),
                Phase::SourceLinkage => support.on_linkage_declared(&mut stmt),
                Phase::StatementDefinition => support.on_statement_definition_declared(&mut stmt),
                Phase::FullDeclaration => support.on_full_definition_declared(&mut stmt),
                Phase::Init | Phase::EffectiveModel => Ok(()),
            };
            self.ctx_mut(id).hooks_done = Some(next);
            if let Err(error) = result {
                self.report(error)?;
            }
        }
        Ok(())
    }

    fn validate_substatements(&mut self, id: ContextId) -> Result<(), ReactorError> {
        let ctx = self.ctx(id);
        let Some(validator) = ctx.support.validator() else {
            return Ok(());
        };
        let registry = &self.registry;
        let errors = validator.validate(
            &ctx.keyword,
            &ctx.location,
            &ctx.child_keywords,
            |keyword| registry.is_known(keyword),
        );
        for error in errors {
            self.report(error)?;
        }
        Ok(())
    }
}
