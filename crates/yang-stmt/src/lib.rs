// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! YANG statement supports for the inference reactor
//!
//! Registers the RFC 7950 vocabulary (and RFC 8040 `yang-data`) with a
//! [`yang_reactor::ReactorBuilder`], turning the keyword-agnostic reactor into
//! a YANG model builder.
//!
//! # Design
//!
//! - [`namespaces`]: the namespaces statements bind and resolve through
//! - [`arguments`]: argument parsers shared by the supports
//! - [`resolve`]: prefix, definition and schema tree lookups
//! - [`stmt`]: one module per statement family
//! - [`rfc8040`]: the `yang-data` extension
//!
//! # Examples
//!
//! ```
//! use yang_model::statement;
//! use yang_reactor::InMemorySource;
//!
//! let reactor = yang_stmt::default_reactor();
//! let source = InMemorySource::new(
//!     "example.yang",
//!     statement! {
//!         module "example" {
//!             namespace "urn:example";
//!             prefix "ex";
//!             leaf "name" { type "string"; }
//!         }
//!     },
//! );
//! let model = reactor.build(&[&source], &[]).unwrap();
//! let module = model.find_module("example", None).unwrap();
//! assert!(module.find_schema_node(&["name"]).is_some());
//! ```

pub mod arguments;
pub mod namespaces;
pub mod resolve;
pub mod rfc8040;
pub mod stmt;

use yang_reactor::{Reactor, ReactorBuilder, ReactorConfig};

pub use namespaces::register_namespaces;
pub use rfc8040::with_rfc8040;
pub use stmt::register_core;

/// Builder with the core namespaces and statements plus RFC 8040.
pub fn default_reactor_builder() -> ReactorBuilder {
    with_rfc8040(register_core(register_namespaces(ReactorBuilder::new())))
}

/// Reactor for RFC 7950 YANG with the default configuration.
pub fn default_reactor() -> Reactor {
    default_reactor_builder().build()
}

pub fn default_reactor_with(config: ReactorConfig) -> Reactor {
    default_reactor_builder().config(config).build()
}
