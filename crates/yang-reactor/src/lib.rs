// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Cross-source statement inference reactor
//!
//! Turns independently written, possibly interdependent raw statement trees
//! into one consistent [`EffectiveModel`](yang_model::EffectiveModel). The
//! reactor knows no concrete keywords: every keyword's behaviour is a
//! [`StatementSupport`] registered with a [`ReactorBuilder`].
//!
//! # Design
//!
//! - [`namespace`]: typed, scoped keyspaces bound by statements
//! - [`context`]: the statement context arena addressed by [`ContextId`],
//!   seen by supports through [`Stmt`] and [`StmtMut`]
//! - [`support`]: the statement support trait and the immutable registry
//! - [`inference`]: deferred actions with prerequisites, run to a fixpoint
//! - `sequencer`: the phase loop from INIT to EFFECTIVE_MODEL
//! - [`effective`]: memoized bottom-up construction of the output model
//! - [`error`]: diagnostics; a build fails at the end of the first phase that
//!   produced any
//!
//! Builds are independent: a [`Reactor`] is immutable and every build owns
//! its state, so one reactor may serve many threads.

pub mod build;
pub mod config;
pub mod context;
pub mod effective;
pub mod error;
pub mod inference;
pub mod namespace;
pub mod phase;
pub mod reactor;
mod sequencer;
pub mod source;
pub mod support;
pub mod validator;

pub use build::{Stmt, StmtMut};
pub use config::{ConfigError, FeatureRef, FeatureSet, ReactorConfig, UnknownStatementPolicy};
pub use context::{ContextId, SourceId};
pub use effective::EffectiveInput;
pub use error::{
    DiagnosticFormatter, ErrorKind, Label, ReactorError, Severity, SourceError, SourceResult,
};
pub use inference::{ActionBuilder, InferenceAction, Prereq, Resolved, Unresolved};
pub use namespace::{
    Binding, Namespace, NamespaceScope, OverwritePolicy, PrefixToModuleNameNs, SelfKey,
};
pub use phase::Phase;
pub use reactor::{BuildAction, Reactor, ReactorBuilder};
pub use source::{InMemorySource, SourceDependency, SourceInfo, SourceKind, StatementStreamSource};
pub use support::{
    CopyPolicy, NamespaceWindow, ParseContext, RegisteredSupport, StatementSupport, SupportRegistry,
};
pub use validator::{Cardinality, SubstatementValidator, ValidatorBuilder};
