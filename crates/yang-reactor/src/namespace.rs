//! Typed, scoped keyspaces for cross-statement bookkeeping.
//!
//! A namespace is a marker type implementing [`Namespace`]: the key and value
//! types, a display name for diagnostics, a scope and an overwrite policy are
//! all fixed by that implementation. Storage is type-erased per context (and
//! once globally per build) and recovered by `TypeId`.
//!
//! # Scopes
//!
//! - `StatementLocal`: bindings live on one context and are visible only there
//! - `SourceLocal`: bindings live on the source root, visible to its whole tree
//! - `TreeScoped`: bindings live on the context they are put on and are
//!   inherited by descendants; lookups walk ancestors, so inner scopes shadow
//!   outer ones; at a root the lookup continues into linked roots (a module and
//!   its submodules)
//! - `Global`: one keyspace for the whole build
//!
//! Bindings are never retracted.
//!
//! # Sealing
//!
//! A namespace is registered with the phase it becomes writable in and,
//! optionally, the last phase it accepts bindings in
//! (`ReactorBuilder::add_namespace_until`). Without an end phase, bindings
//! are refused only on a statement that has completed EFFECTIVE_MODEL.
//!
//! # Examples
//!
//! ```rust,ignore
//! yang_reactor::namespace! {
//!     /// Typedefs by qualified name.
//!     pub TypeNs: QName => ContextId, "typedef", TreeScoped
//! }
//! ```

use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use yang_model::SourceLocation;

/// Visibility of a namespace's bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceScope {
    StatementLocal,
    SourceLocal,
    TreeScoped,
    Global,
}

/// What binding an already bound key to a different value does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverwritePolicy {
    /// Duplicate definition error; equal values are accepted
    Reject,
    /// Later binding wins
    Replace,
}

/// A typed keyspace.
pub trait Namespace: 'static {
    type Key: Clone + Eq + Hash + fmt::Debug + fmt::Display + 'static;
    type Value: Clone + PartialEq + fmt::Debug + 'static;

    /// Name used in diagnostics ("typedef", "grouping", ...)
    const NAME: &'static str;
    const SCOPE: NamespaceScope;
    const OVERWRITE: OverwritePolicy = OverwritePolicy::Reject;
}

/// Key of namespaces holding a single value per statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelfKey;

impl fmt::Display for SelfKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("self")
    }
}

/// A bound value together with where it was bound from.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding<V> {
    pub value: V,
    pub origin: SourceLocation,
}

pub(crate) enum PutOutcome<V> {
    Inserted,
    Unchanged,
    Replaced,
    Conflict(Binding<V>),
    Corrupted,
}

type Keyspace<N> = IndexMap<<N as Namespace>::Key, Binding<<N as Namespace>::Value>>;

/// Type-erased storage of every namespace bound at one place.
#[derive(Default)]
pub struct NamespaceStorage {
    maps: HashMap<TypeId, Box<dyn Any>>,
}

impl NamespaceStorage {
    pub fn get<N: Namespace>(&self, key: &N::Key) -> Option<&Binding<N::Value>> {
        self.all::<N>()?.get(key)
    }

    /// All bindings of `N`, in binding order.
    pub fn all<N: Namespace>(&self) -> Option<&Keyspace<N>> {
        self.maps
            .get(&TypeId::of::<N>())
            .and_then(|map| map.downcast_ref::<Keyspace<N>>())
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub(crate) fn put<N: Namespace>(
        &mut self,
        key: N::Key,
        binding: Binding<N::Value>,
    ) -> PutOutcome<N::Value> {
        let entry = self
            .maps
            .entry(TypeId::of::<N>())
            .or_insert_with(|| Box::new(Keyspace::<N>::new()));
        let Some(map) = entry.downcast_mut::<Keyspace<N>>() else {
            return PutOutcome::Corrupted;
        };

        match map.get(&key) {
            None => {
                map.insert(key, binding);
                PutOutcome::Inserted
            }
            Some(existing) if existing.value == binding.value => PutOutcome::Unchanged,
            Some(existing) => match N::OVERWRITE {
                OverwritePolicy::Reject => PutOutcome::Conflict(existing.clone()),
                OverwritePolicy::Replace => {
                    map.insert(key, binding);
                    PutOutcome::Replaced
                }
            },
        }
    }
}

impl fmt::Debug for NamespaceStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceStorage")
            .field("keyspaces", &self.maps.len())
            .finish()
    }
}

/// Declare a namespace marker type.
///
/// `namespace! { pub Name: Key => Value, "label", Scope }` with an optional
/// trailing `, Replace` overwrite policy.
#[macro_export]
macro_rules! namespace {
    (
        $(#[$meta:meta])* $vis:vis $name:ident : $key:ty => $value:ty,
        $label:literal, $scope:ident $(, $policy:ident)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis struct $name;

        impl $crate::namespace::Namespace for $name {
            type Key = $key;
            type Value = $value;
            const NAME: &'static str = $label;
            const SCOPE: $crate::namespace::NamespaceScope =
                $crate::namespace::NamespaceScope::$scope;
            $(
                const OVERWRITE: $crate::namespace::OverwritePolicy =
                    $crate::namespace::OverwritePolicy::$policy;
            )?
        }
    };
}

namespace! {
    /// Import prefix to module name, used to resolve extension keywords.
    pub PrefixToModuleNameNs: String => String, "prefix", SourceLocal
}
