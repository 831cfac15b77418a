//! Statement supports of the YANG core language.
//!
//! Each submodule covers one family of statements and exposes a `register`
//! function adding its supports to a [`ReactorBuilder`] with the phase in
//! which those statements are materialized:
//!
//! | Phase | Statements |
//! |-------|------------|
//! | SOURCE_PRE_LINKAGE | module, submodule, namespace, prefix, yang-version, revision, |
//! |                    | revision-date, import, include, belongs-to |
//! | SOURCE_LINKAGE | description, reference, contact, organization |
//! | STATEMENT_DEFINITION | definitions, data nodes, operations and their properties |
//! | FULL_DECLARATION | uses, refine, augment, deviation, deviate |

use yang_model::Keyword;
use yang_reactor::{Cardinality, ReactorBuilder, ValidatorBuilder};

pub mod augment;
pub mod data;
pub mod deviation;
pub mod extension;
pub mod feature;
pub mod grouping;
pub mod identity;
pub mod leafref;
pub mod meta;
pub mod module;
pub mod typedef;

/// Statements that define data nodes (RFC 7950 `data-def-stmt`).
pub(crate) const DATA_DEFS: &[&str] = &[
    "container",
    "leaf",
    "leaf-list",
    "list",
    "choice",
    "anydata",
    "anyxml",
    "uses",
];

/// Register every core statement support.
pub fn register_core(builder: ReactorBuilder) -> ReactorBuilder {
    let builder = module::register(builder);
    let builder = meta::register(builder);
    let builder = typedef::register(builder);
    let builder = leafref::register(builder);
    let builder = data::register(builder);
    let builder = grouping::register(builder);
    let builder = augment::register(builder);
    let builder = deviation::register(builder);
    let builder = identity::register(builder);
    let builder = feature::register(builder);
    extension::register(builder)
}

pub(crate) fn kw(name: &str) -> Keyword {
    Keyword::yang(name)
}

/// `description` and `reference`, at most once each.
pub(crate) fn documented(builder: ValidatorBuilder) -> ValidatorBuilder {
    builder.optional("description").optional("reference")
}

/// Documentation plus `status`.
pub(crate) fn with_status(builder: ValidatorBuilder) -> ValidatorBuilder {
    documented(builder).optional("status")
}

/// Body of containers, lists, groupings and the like.
pub(crate) fn data_body(builder: ValidatorBuilder) -> ValidatorBuilder {
    builder
        .all(DATA_DEFS, Cardinality::Any)
        .any("typedef")
        .any("grouping")
        .any("action")
        .any("notification")
}
