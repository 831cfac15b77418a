//! End-to-end builds of small YANG models through the default reactor.

use std::sync::Arc;

use yang_model::{
    statement, BuiltinType, EffectiveKind, EffectiveModel, EffectiveStatement, QName, RawStatement,
    TypeName,
};
use yang_reactor::{
    ErrorKind, FeatureRef, FeatureSet, InMemorySource, Phase, ReactorConfig, ReactorError,
    StatementStreamSource,
};

fn sources(roots: Vec<RawStatement>) -> Vec<InMemorySource> {
    roots.into_iter().map(InMemorySource::from_root).collect()
}

fn as_dyn(sources: &[InMemorySource]) -> Vec<&dyn StatementStreamSource> {
    sources.iter().map(|source| source as &dyn StatementStreamSource).collect()
}

fn build_with(
    config: ReactorConfig,
    requested: Vec<RawStatement>,
    libraries: Vec<RawStatement>,
) -> Result<EffectiveModel, ReactorError> {
    let reactor = yang_stmt::default_reactor_with(config);
    let requested = sources(requested);
    let libraries = sources(libraries);
    reactor.build(&as_dyn(&requested), &as_dyn(&libraries))
}

fn build(requested: Vec<RawStatement>) -> Result<EffectiveModel, ReactorError> {
    build_with(ReactorConfig::default(), requested, Vec::new())
}

fn module<'m>(model: &'m EffectiveModel, name: &str) -> &'m Arc<EffectiveStatement> {
    model.find_module(name, None).unwrap()
}

fn node<'m>(model: &'m EffectiveModel, name: &str, path: &[&str]) -> &'m Arc<EffectiveStatement> {
    module(model, name).find_schema_node(path).unwrap()
}

fn restconf() -> RawStatement {
    statement! {
        module "ietf-restconf" {
            namespace "urn:ietf:params:xml:ns:yang:ietf-restconf";
            prefix "rc";
            extension "yang-data" { argument "name"; }
        }
    }
}

// ===== Linkage =====

#[test]
fn test_forward_reference_into_later_source() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            import "b" { prefix "b"; }
            leaf "x" { type "b:small"; }
        }
    };
    let b = statement! {
        module "b" {
            namespace "urn:b";
            prefix "b";
            typedef "small" { type "int8"; }
        }
    };
    let model = build(vec![a, b]).unwrap();
    assert_eq!(model.modules().len(), 2);

    let b_module = module(&model, "b").as_module().unwrap().qname_module.clone();
    let x = node(&model, "a", &["x"]);
    let definition = x.type_definition().unwrap();
    assert_eq!(definition.builtin, BuiltinType::Int8);
    assert_eq!(definition.name, TypeName::Derived(QName::new(b_module, "small")));

    let imports = &module(&model, "a").as_module().unwrap().imports;
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].module.name, "b");
    assert_eq!(imports[0].prefix, "b");
}

#[test]
fn test_missing_import_reports_one_error() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            import "b" { prefix "b"; }
            leaf "x" { type "b:small"; }
        }
    };
    let error = build(vec![a]).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::SourceLinkage));
    assert_eq!(error.errors().len(), 1);
    let unresolved = error.errors_of(ErrorKind::UnresolvedReference);
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message.contains("'b'"));
}

#[test]
fn test_import_picks_latest_revision() {
    let a = statement! {
        module "a" { namespace "urn:a"; prefix "a"; import "b" { prefix "b"; } }
    };
    let old = statement! { module "b" { namespace "urn:b"; prefix "b"; revision "2019-01-01"; } };
    let new = statement! { module "b" { namespace "urn:b"; prefix "b"; revision "2021-01-01"; } };

    let libraries = vec![old.clone(), new.clone()];
    let model = build_with(ReactorConfig::default(), vec![a.clone()], libraries).unwrap();
    let import = &module(&model, "a").as_module().unwrap().imports[0];
    assert_eq!(import.module.revision.as_ref().unwrap().as_str(), "2021-01-01");

    let reversed = build_with(ReactorConfig::default(), vec![a], vec![new, old]).unwrap();
    assert_eq!(model, reversed);
}

#[test]
fn test_import_with_revision_date() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            import "b" { prefix "b"; "revision-date" "2019-01-01"; }
        }
    };
    let old = statement! { module "b" { namespace "urn:b"; prefix "b"; revision "2019-01-01"; } };
    let new = statement! { module "b" { namespace "urn:b"; prefix "b"; revision "2021-01-01"; } };
    let model = build_with(ReactorConfig::default(), vec![a], vec![old, new]).unwrap();
    let import = &module(&model, "a").as_module().unwrap().imports[0];
    assert_eq!(import.module.revision.as_ref().unwrap().as_str(), "2019-01-01");
}

#[test]
fn test_missing_namespace() {
    let a = statement! { module "a" { prefix "a"; } };
    let error = build(vec![a]).unwrap_err();
    assert_eq!(error.errors().len(), 1);
    assert_eq!(error.errors()[0].kind, ErrorKind::SubstatementValidation);
    assert!(error.errors()[0].message.contains("'namespace'"));
}

#[test]
fn test_submodule_contributes_to_its_module() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            include "a-types";
            leaf "x" { type "counter"; }
        }
    };
    let sub = statement! {
        submodule "a-types" {
            "belongs-to" "a" { prefix "a"; }
            typedef "counter" { type "uint32"; }
            leaf "s" { type "string"; }
        }
    };
    let model = build_with(ReactorConfig::default(), vec![a], vec![sub]).unwrap();
    let a_module = module(&model, "a");
    let info = a_module.as_module().unwrap();
    assert_eq!(info.submodules.len(), 1);

    let s = a_module.find_schema_node(&["s"]).unwrap();
    assert_eq!(s.qname().unwrap().module, info.qname_module);
    let x = a_module.find_schema_node(&["x"]).unwrap();
    assert_eq!(x.type_definition().unwrap().builtin, BuiltinType::Uint32);
}

#[test]
fn test_submodule_of_another_module() {
    let a = statement! {
        module "a" { namespace "urn:a"; prefix "a"; include "b-sub"; }
    };
    let b = statement! { module "b" { namespace "urn:b"; prefix "b"; } };
    let sub = statement! {
        submodule "b-sub" { "belongs-to" "b" { prefix "b"; } }
    };
    let error = build_with(ReactorConfig::default(), vec![a], vec![b, sub]).unwrap_err();
    let invalid = error.errors_of(ErrorKind::InvalidStatement);
    assert_eq!(invalid.len(), 1);
    assert!(invalid[0].message.contains("belongs to 'b'"));
}

// ===== Types =====

#[test]
fn test_leafref_resolves_target_type() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            container "interfaces" {
                list "interface" {
                    key "name";
                    leaf "name" { type "string"; }
                    leaf "mtu" { type "uint16"; }
                }
            }
            leaf "primary-mtu" {
                type "leafref" { path "/a:interfaces/a:interface/a:mtu"; }
            }
            container "stats" {
                leaf "id" { type "int64"; }
                leaf "copy" { type "leafref" { path "../id"; } }
            }
        }
    };
    let model = build(vec![a]).unwrap();

    let absolute = node(&model, "a", &["primary-mtu"]).type_definition().unwrap();
    assert_eq!(absolute.builtin, BuiltinType::LeafRef);
    assert_eq!(absolute.leafref_target().unwrap().builtin, BuiltinType::Uint16);

    let relative = node(&model, "a", &["stats", "copy"]).type_definition().unwrap();
    assert_eq!(relative.resolved_target().unwrap().builtin, BuiltinType::Int64);
}

#[test]
fn test_leafref_into_imported_module() {
    let m1 = statement! {
        module "m1" {
            namespace "urn:m1";
            prefix "m1";
            import "m2" { prefix "m2"; }
            leaf "x" { type "leafref" { path "/m2:root/m2:leaf"; } }
        }
    };
    let m2 = statement! {
        module "m2" {
            namespace "urn:m2";
            prefix "m2";
            container "root" { leaf "leaf" { type "string"; } }
        }
    };
    let model = build(vec![m1, m2]).unwrap();

    let x = node(&model, "m1", &["x"]).type_definition().unwrap();
    assert_eq!(x.leafref_target().unwrap().builtin, BuiltinType::String);
}

#[test]
fn test_leafref_to_missing_node() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            leaf "x" { type "leafref" { path "/a:nowhere"; } }
        }
    };
    let error = build(vec![a]).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::EffectiveModel));
    let unresolved = error.errors_of(ErrorKind::UnresolvedReference);
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message.contains("/a:nowhere"));
}

#[test]
fn test_duplicate_typedef() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            typedef "t" { type "string"; }
            typedef "t" { type "int8"; }
        }
    };
    let error = build(vec![a]).unwrap_err();
    assert_eq!(error.errors_of(ErrorKind::DuplicateDefinition).len(), 1);
}

#[test]
fn test_unknown_typedef() {
    let a = statement! {
        module "a" { namespace "urn:a"; prefix "a"; leaf "x" { type "missing"; } }
    };
    let error = build(vec![a]).unwrap_err();
    let unresolved = error.errors_of(ErrorKind::UnresolvedReference);
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message.contains("type 'missing' not found"));
}

#[test]
fn test_circular_typedef_reported_once() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            typedef "ping" { type "pong"; }
            typedef "pong" { type "ping"; }
            leaf "x" { type "ping"; }
        }
    };
    let error = build(vec![a]).unwrap_err();
    let invalid = error.errors_of(ErrorKind::InvalidStatement);
    assert_eq!(invalid.len(), 1);
    assert!(invalid[0].message.contains("circular dependency"));
}

#[test]
fn test_restricted_typedef_chain() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            typedef "percent" { type "uint8" { range "0..100"; } units "percent"; }
            leaf "load" { type "percent"; }
        }
    };
    let model = build(vec![a]).unwrap();
    let definition = node(&model, "a", &["load"]).type_definition().unwrap();
    assert_eq!(definition.builtin, BuiltinType::Uint8);
    assert_eq!(definition.units.as_deref(), Some("percent"));
    assert!(definition.chain().count() >= 2);
}

#[test]
fn test_enumeration_members_numbered() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            leaf "color" {
                type "enumeration" {
                    "enum" "red";
                    "enum" "green" { value "10"; }
                    "enum" "blue";
                }
            }
        }
    };
    let model = build(vec![a]).unwrap();
    let definition = node(&model, "a", &["color"]).type_definition().unwrap();
    let values: Vec<_> = definition
        .enums
        .iter()
        .map(|member| (member.name.as_str(), member.value))
        .collect();
    assert_eq!(values, [("red", 0), ("green", 10), ("blue", 11)]);
}

#[test]
fn test_enumeration_needs_members() {
    let a = statement! {
        module "a" { namespace "urn:a"; prefix "a"; leaf "e" { type "enumeration"; } }
    };
    let error = build(vec![a]).unwrap_err();
    assert!(error.errors()[0].message.contains("requires a 'enum' substatement"));
}

// ===== Schema tree =====

#[test]
fn test_list_keys() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            list "user" {
                key "name";
                leaf "name" { type "string"; }
                leaf "uid" { type "uint32"; }
            }
        }
    };
    let model = build(vec![a]).unwrap();
    let user = node(&model, "a", &["user"]).schema_node().unwrap();
    let keys: Vec<_> = user.keys.iter().map(|key| key.local_name.as_str()).collect();
    assert_eq!(keys, ["name"]);
}

#[test]
fn test_list_key_must_be_a_leaf() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            list "user" { key "missing"; leaf "name" { type "string"; } }
        }
    };
    let error = build(vec![a]).unwrap_err();
    let invalid = error.errors_of(ErrorKind::InvalidStatement);
    assert_eq!(invalid.len(), 1);
    assert!(invalid[0].message.contains("key leaf 'missing'"));
}

#[test]
fn test_config_inherited_and_checked() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            container "state" {
                config "false";
                leaf "uptime" { type "uint64"; }
            }
            container "settings" { leaf "name" { type "string"; } }
        }
    };
    let model = build(vec![a]).unwrap();
    assert_eq!(node(&model, "a", &["state", "uptime"]).schema_node().unwrap().config, Some(false));
    assert_eq!(node(&model, "a", &["settings", "name"]).schema_node().unwrap().config, Some(true));

    let bad = statement! {
        module "b" {
            namespace "urn:b";
            prefix "b";
            container "state" {
                config "false";
                leaf "knob" { type "string"; config "true"; }
            }
        }
    };
    let error = build(vec![bad]).unwrap_err();
    let invalid = error.errors_of(ErrorKind::InvalidStatement);
    assert_eq!(invalid.len(), 1);
    assert!(invalid[0].message.contains("cannot be config true"));
}

#[test]
fn test_leaf_without_type() {
    let a = statement! {
        module "a" { namespace "urn:a"; prefix "a"; leaf "x"; }
    };
    let error = build(vec![a]).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::FullDeclaration));
    assert_eq!(error.errors_of(ErrorKind::SubstatementValidation).len(), 1);
}

#[test]
fn test_argument_syntax_errors_are_collected() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            container "c" {
                config "perhaps";
                leaf "x" { type "string"; mandatory "maybe"; }
            }
        }
    };
    let error = build(vec![a]).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::StatementDefinition));
    let syntax = error.errors_of(ErrorKind::ArgumentSyntax);
    assert_eq!(syntax.len(), 2);

    assert!(syntax[0].message.contains("'perhaps' is not a valid boolean"));
    assert_eq!(syntax[0].location.to_string(), "a.yang:5:5");
    assert!(syntax[1].message.contains("'maybe' is not a valid boolean"));
    assert_eq!(syntax[1].location.to_string(), "a.yang:8:7");
}

// ===== Groupings and augmentation =====

#[test]
fn test_uses_expands_and_refines() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            grouping "endpoint" {
                leaf "address" { type "string"; description "Address of the peer"; }
                leaf "port" { type "uint16"; }
            }
            container "server" {
                uses "endpoint" {
                    refine "address" {
                        description "Listening address";
                        must "string-length(.) > 0";
                    }
                }
            }
            container "client" { uses "endpoint"; }
        }
    };
    let model = build(vec![a]).unwrap();

    let address = node(&model, "a", &["server", "address"]);
    assert!(address.history().is_added_by_uses());
    assert_eq!(address.facets().description.as_deref(), Some("Listening address"));
    assert_eq!(address.find_all("description").count(), 1);
    assert_eq!(address.find_all("must").count(), 1);

    let client_address = node(&model, "a", &["client", "address"]);
    assert_eq!(client_address.facets().description.as_deref(), Some("Address of the peer"));
    assert_eq!(client_address.find_all("must").count(), 0);
    assert!(node(&model, "a", &["client", "port"]).history().is_added_by_uses());
}

#[test]
fn test_nested_groupings() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            grouping "inner" { leaf "id" { type "string"; } }
            grouping "outer" { container "wrapper" { uses "inner"; } }
            uses "outer";
        }
    };
    let model = build(vec![a]).unwrap();
    let id = node(&model, "a", &["wrapper", "id"]);
    assert!(id.history().is_added_by_uses());
}

#[test]
fn test_grouping_from_imported_module() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            import "b" { prefix "b"; }
            container "c" { uses "b:pair"; }
        }
    };
    let b = statement! {
        module "b" {
            namespace "urn:b";
            prefix "b";
            grouping "pair" { leaf "left" { type "b:side"; } }
            typedef "side" { type "int32"; }
        }
    };
    let model = build_with(ReactorConfig::default(), vec![a], vec![b]).unwrap();
    let a_module = module(&model, "a").as_module().unwrap().qname_module.clone();
    let left = node(&model, "a", &["c", "left"]);
    assert_eq!(left.qname().unwrap().module, a_module);
    assert_eq!(left.type_definition().unwrap().builtin, BuiltinType::Int32);
}

#[test]
fn test_missing_grouping() {
    let a = statement! {
        module "a" { namespace "urn:a"; prefix "a"; container "c" { uses "nothing"; } }
    };
    let error = build(vec![a]).unwrap_err();
    let unresolved = error.errors_of(ErrorKind::UnresolvedReference);
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message.contains("grouping 'nothing' not found"));
}

#[test]
fn test_self_recursive_grouping() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            grouping "g" { leaf "l" { type "string"; } uses "g"; }
            container "c" { uses "g"; }
        }
    };
    let error = build(vec![a]).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::EffectiveModel));
    assert_eq!(error.errors().len(), 2);
    for diagnostic in error.errors() {
        assert_eq!(diagnostic.kind, ErrorKind::InvalidStatement);
        assert_eq!(diagnostic.message, "grouping 'g' is part of a circular uses chain");
    }
}

#[test]
fn test_mutually_recursive_groupings() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            grouping "g1" { container "one" { uses "g2"; } }
            grouping "g2" { uses "g1"; }
            container "c" { uses "g1"; }
        }
    };
    let error = build(vec![a]).unwrap_err();
    assert_eq!(error.errors_of(ErrorKind::InvalidStatement).len(), 3);
    assert!(error.errors_of(ErrorKind::UnresolvedReference).is_empty());
    assert!(error
        .errors()
        .iter()
        .all(|diagnostic| diagnostic.message.contains("circular uses chain")));
}

#[test]
fn test_uses_of_broken_grouping_is_not_circular() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            grouping "g" { uses "nothing"; }
            container "c" { uses "g"; }
        }
    };
    let error = build(vec![a]).unwrap_err();
    let messages: Vec<_> =
        error.errors().iter().map(|diagnostic| diagnostic.message.as_str()).collect();
    assert_eq!(messages.len(), 2);
    assert!(messages.contains(&"grouping 'nothing' not found"));
    assert!(messages.contains(&"grouping 'g' could not be expanded"));
}

#[test]
fn test_missing_refine_target() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            grouping "g" { leaf "x" { type "string"; } }
            container "c" { uses "g" { refine "y" { description "none"; } } }
        }
    };
    let error = build(vec![a]).unwrap_err();
    let unresolved = error.errors_of(ErrorKind::UnresolvedReference);
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message.contains("refine target 'y' not found"));
}

#[test]
fn test_cross_module_augment() {
    let base = statement! {
        module "base" {
            namespace "urn:base";
            prefix "base";
            container "system" { leaf "hostname" { type "string"; } }
        }
    };
    let ext = statement! {
        module "ext" {
            namespace "urn:ext";
            prefix "ext";
            import "base" { prefix "b"; }
            augment "/b:system" { leaf "location" { type "string"; } }
        }
    };
    let model = build(vec![ext, base]).unwrap();
    let ext_module = module(&model, "ext").as_module().unwrap().qname_module.clone();
    let location = node(&model, "base", &["system", "location"]);
    assert!(location.history().is_augmenting());
    assert_eq!(location.qname().unwrap().module, ext_module);
    assert!(node(&model, "base", &["system", "hostname"]).history().is_original());
}

#[test]
fn test_uses_augment() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            grouping "g" { container "box" { leaf "x" { type "string"; } } }
            uses "g" { augment "box" { leaf "y" { type "string"; } } }
        }
    };
    let model = build(vec![a]).unwrap();
    let y = node(&model, "a", &["box", "y"]);
    assert!(y.history().is_augmenting());
    assert!(node(&model, "a", &["box", "x"]).history().is_added_by_uses());
}

#[test]
fn test_augment_missing_target() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            augment "/a:nowhere" { leaf "x" { type "string"; } }
        }
    };
    let error = build(vec![a]).unwrap_err();
    let unresolved = error.errors_of(ErrorKind::UnresolvedReference);
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message.contains("augment target"));
}

// ===== Deviations =====

fn deviated_base() -> RawStatement {
    statement! {
        module "b" {
            namespace "urn:b";
            prefix "b";
            container "c" {
                leaf "x" { type "string"; }
                leaf "y" { type "string"; units "seconds"; default "none"; }
                leaf "z" { type "string"; }
            }
        }
    }
}

#[test]
fn test_deviation_not_supported() {
    let d = statement! {
        module "d" {
            namespace "urn:d";
            prefix "d";
            import "b" { prefix "b"; }
            deviation "/b:c/b:x" { deviate "not-supported"; }
        }
    };
    let model = build(vec![d, deviated_base()]).unwrap();
    let c = node(&model, "b", &["c"]);
    assert!(c.schema_child("x").is_none());
    assert!(c.schema_child("y").is_some());
    assert!(c.schema_child("z").is_some());
}

#[test]
fn test_deviation_edits_properties() {
    let d = statement! {
        module "d" {
            namespace "urn:d";
            prefix "d";
            import "b" { prefix "b"; }
            deviation "/b:c/b:x" { deviate "replace" { type "uint32"; } }
            deviation "/b:c/b:y" {
                deviate "replace" { units "minutes"; config "false"; }
                deviate "delete" { default "none"; }
            }
            deviation "/b:c/b:z" { deviate "add" { units "bytes"; } }
        }
    };
    let model = build(vec![d, deviated_base()]).unwrap();

    let x = node(&model, "b", &["c", "x"]);
    assert_eq!(x.type_definition().unwrap().builtin, BuiltinType::Uint32);
    assert_eq!(x.find_all("type").count(), 1);

    let y = node(&model, "b", &["c", "y"]);
    assert_eq!(y.find_all("units").count(), 1);
    assert_eq!(y.facets().units.as_deref(), Some("minutes"));
    assert_eq!(y.facets().default, None);
    assert_eq!(y.schema_node().unwrap().config, Some(false));

    let z = node(&model, "b", &["c", "z"]);
    assert_eq!(z.facets().units.as_deref(), Some("bytes"));
}

#[test]
fn test_deviation_conflicts() {
    let d = statement! {
        module "d" {
            namespace "urn:d";
            prefix "d";
            import "b" { prefix "b"; }
            deviation "/b:c/b:y" { deviate "add" { units "hours"; } }
            deviation "/b:c/b:z" { deviate "replace" { units "hours"; } }
            deviation "/b:c" { deviate "add" { default "none"; } }
        }
    };
    let error = build(vec![d, deviated_base()]).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::EffectiveModel));
    let invalid = error.errors_of(ErrorKind::InvalidStatement);
    assert_eq!(invalid.len(), 3);
    let messages: Vec<&str> = invalid.iter().map(|error| error.message.as_str()).collect();
    let mentions = |needle: &str| messages.iter().any(|message| message.contains(needle));
    assert!(mentions("cannot add 'units' to '/b:c/b:y'"));
    assert!(mentions("cannot replace 'units' in '/b:c/b:z'"));
    assert!(mentions("'/b:c' is not a valid deviation target for 'default'"));
}

#[test]
fn test_deviation_missing_target() {
    let d = statement! {
        module "d" {
            namespace "urn:d";
            prefix "d";
            import "b" { prefix "b"; }
            deviation "/b:c/b:nothing" { deviate "not-supported"; }
        }
    };
    let error = build(vec![d, deviated_base()]).unwrap_err();
    let unresolved = error.errors_of(ErrorKind::UnresolvedReference);
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message.contains("deviation target '/b:c/b:nothing' not found"));
}

#[test]
fn test_deviate_argument_and_substatements() {
    let bad_kind = statement! {
        module "d" {
            namespace "urn:d";
            prefix "d";
            import "b" { prefix "b"; }
            deviation "/b:c/b:x" { deviate "remove"; }
        }
    };
    let error = build(vec![bad_kind, deviated_base()]).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::FullDeclaration));
    let syntax = error.errors_of(ErrorKind::ArgumentSyntax);
    assert_eq!(syntax.len(), 1);
    assert!(syntax[0].message.contains("'remove' is not a valid deviate argument"));

    let bad_child = statement! {
        module "d" {
            namespace "urn:d";
            prefix "d";
            import "b" { prefix "b"; }
            deviation "/b:c/b:x" { deviate "delete" { type "string"; } }
        }
    };
    let error = build(vec![bad_child, deviated_base()]).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::FullDeclaration));
    assert_eq!(error.errors_of(ErrorKind::SubstatementValidation).len(), 1);
}
// ===== Identities and features =====

#[test]
fn test_identity_derivation() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            identity "crypto";
            identity "aes" { base "crypto"; }
            identity "aes-256" { base "aes"; }
            identity "other";
            leaf "cipher" { type "identityref" { base "crypto"; } }
        }
    };
    let model = build(vec![a]).unwrap();
    let qname_module = module(&model, "a").as_module().unwrap().qname_module.clone();
    let crypto = QName::new(qname_module.clone(), "crypto");

    assert_eq!(model.identities().len(), 4);
    let derived: Vec<_> = model
        .derived_identities(&crypto)
        .iter()
        .map(|identity| identity.qname().unwrap().local_name.clone())
        .collect();
    assert_eq!(derived, ["aes", "aes-256"]);

    let cipher = node(&model, "a", &["cipher"]).type_definition().unwrap();
    assert_eq!(cipher.identity_bases, [crypto]);
}

#[test]
fn test_identity_derived_from_itself() {
    let a = statement! {
        module "a" { namespace "urn:a"; prefix "a"; identity "loop" { base "loop"; } }
    };
    let error = build(vec![a]).unwrap_err();
    let invalid = error.errors_of(ErrorKind::InvalidStatement);
    assert!(invalid[0].message.contains("derived from itself"));
}

#[test]
fn test_feature_gating() {
    let a = || {
        statement! {
            module "a" {
                namespace "urn:a";
                prefix "a";
                feature "fast";
                leaf "turbo" { "if-feature" "fast"; type "boolean"; }
                leaf "plain" { type "boolean"; }
            }
        }
    };
    let all = build(vec![a()]).unwrap();
    assert!(module(&all, "a").find_schema_node(&["turbo"]).is_some());

    let none_enabled = ReactorConfig::default().with_features(FeatureSet::only([]));
    let none = build_with(none_enabled, vec![a()], Vec::new()).unwrap();
    assert!(module(&none, "a").find_schema_node(&["turbo"]).is_none());
    assert!(module(&none, "a").find_schema_node(&["plain"]).is_some());

    let fast = FeatureSet::only([FeatureRef::new("a", "fast")]);
    let some =
        build_with(ReactorConfig::default().with_features(fast), vec![a()], Vec::new()).unwrap();
    assert!(module(&some, "a").find_schema_node(&["turbo"]).is_some());
}

#[test]
fn test_disabled_uses_drops_its_nodes() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            feature "extras";
            grouping "g" { leaf "extra" { type "string"; } }
            container "c" { uses "g" { "if-feature" "extras"; } }
        }
    };
    let config = ReactorConfig::default().with_features(FeatureSet::only([]));
    let model = build_with(config, vec![a], Vec::new()).unwrap();
    let c = node(&model, "a", &["c"]);
    assert!(c.schema_child("extra").is_none());
}

#[test]
fn test_missing_feature() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            leaf "x" { "if-feature" "nope"; type "string"; }
        }
    };
    let error = build(vec![a]).unwrap_err();
    let unresolved = error.errors_of(ErrorKind::UnresolvedReference);
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message.contains("feature 'nope'"));
}

// ===== Extensions =====

#[test]
fn test_unknown_statement_lenient_and_strict() {
    let a = || {
        statement! {
            module "a" {
                namespace "urn:a";
                prefix "a";
                "vendor-knob" "on";
                leaf "x" { type "string"; }
            }
        }
    };
    let model = build(vec![a()]).unwrap();
    let unknown = module(&model, "a").find_first("vendor-knob").unwrap();
    match unknown.kind() {
        EffectiveKind::Unknown(info) => assert_eq!(info.argument.as_deref(), Some("on")),
        other => panic!("expected an unknown statement, got {other:?}"),
    }

    let error = build_with(ReactorConfig::strict(), vec![a()], Vec::new()).unwrap_err();
    let errors = error.errors_of(ErrorKind::UnknownStatement);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("vendor-knob"));
}

#[test]
fn test_undefined_extension_instance_under_strict_policy() {
    let a = || {
        statement! {
            module "a" {
                namespace "urn:a";
                prefix "a";
                extension "note";
                "a:note" "defined";
                "a:nothere" "v";
            }
        }
    };
    let model = build(vec![a()]).unwrap();
    let opaque = module(&model, "a")
        .substatements()
        .iter()
        .find(|stmt| stmt.keyword().name == "nothere")
        .unwrap();
    assert!(matches!(opaque.kind(), EffectiveKind::Unknown(info) if info.definition.is_none()));

    let error = build_with(ReactorConfig::strict(), vec![a()], Vec::new()).unwrap_err();
    assert_eq!(error.phase(), Some(Phase::FullDeclaration));
    let errors = error.errors_of(ErrorKind::UnknownStatement);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("'nothere' is not defined by module 'a'"));
}

#[test]
fn test_extension_instance_records_definition() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            extension "note" { argument "text"; }
            container "c" { "a:note" "kept as written"; }
        }
    };
    let model = build(vec![a]).unwrap();
    assert_eq!(model.extensions().len(), 1);

    let qname_module = module(&model, "a").as_module().unwrap().qname_module.clone();
    let c = node(&model, "a", &["c"]);
    let instance = c.substatements().iter().find(|stmt| stmt.keyword().is_extension()).unwrap();
    match instance.kind() {
        EffectiveKind::Unknown(info) => {
            assert_eq!(info.definition, Some(QName::new(qname_module, "note")));
            assert_eq!(info.argument.as_deref(), Some("kept as written"));
        }
        other => panic!("expected an extension instance, got {other:?}"),
    }
}

#[test]
fn test_unbound_extension_prefix() {
    let a = statement! {
        module "a" { namespace "urn:a"; prefix "a"; "x:thing" "value"; }
    };
    let error = build(vec![a]).unwrap_err();
    assert!(error.errors_of(ErrorKind::UnresolvedReference)[0].message.contains("prefix 'x'"));
}

#[test]
fn test_yang_data_only_at_top_level() {
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            import "ietf-restconf" { prefix "rc"; }
            "rc:yang-data" "errors" { container "error" { leaf "code" { type "string"; } } }
            container "c" { "rc:yang-data" "nested" { container "n"; } }
        }
    };
    let model = build_with(ReactorConfig::default(), vec![a], vec![restconf()]).unwrap();
    let a_module = module(&model, "a");
    let top: Vec<_> = a_module
        .substatements()
        .iter()
        .filter(|stmt| matches!(stmt.kind(), EffectiveKind::ExtensionInstance(_)))
        .collect();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].find_first("container").unwrap().qname().unwrap().local_name, "error");

    let c = node(&model, "a", &["c"]);
    assert!(c.substatements().iter().all(|stmt| !stmt.keyword().is_extension()));
}

#[test]
fn test_ignored_yang_data_keeps_its_name() {
    // The nested instance is dropped from the model but its name stays bound.
    let a = statement! {
        module "a" {
            namespace "urn:a";
            prefix "a";
            import "ietf-restconf" { prefix "rc"; }
            "rc:yang-data" "template" { container "t"; }
            container "c" { "rc:yang-data" "template" { container "u"; } }
        }
    };
    let error = build_with(ReactorConfig::default(), vec![a], vec![restconf()]).unwrap_err();
    assert_eq!(error.errors_of(ErrorKind::DuplicateDefinition).len(), 1);
}

// ===== Build properties =====

fn sample() -> Vec<RawStatement> {
    vec![
        statement! {
            module "net" {
                namespace "urn:net";
                prefix "net";
                import "types" { prefix "t"; }
                grouping "addressed" { leaf "address" { type "t:ip"; } }
                container "hosts" {
                    list "host" {
                        key "address";
                        uses "addressed";
                        leaf "alias" { type "leafref" { path "../address"; } }
                    }
                }
            }
        },
        statement! {
            module "types" {
                namespace "urn:types";
                prefix "t";
                typedef "ip" { type "string" { length "7..15"; } }
            }
        },
    ]
}

#[test]
fn test_builds_are_idempotent() {
    let first = build(sample()).unwrap();
    let second = build(sample()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_model_json_preserves_modules() {
    let model = build(sample()).unwrap();
    let json = serde_json::to_value(&model).unwrap();
    let modules = json["modules"].as_array().unwrap();
    assert_eq!(modules.len(), model.modules().len());

    for (encoded, original) in modules.iter().zip(model.modules()) {
        let decoded: EffectiveStatement = serde_json::from_value(encoded.clone()).unwrap();
        assert_eq!(&decoded, original.as_ref());
    }
}

#[test]
fn test_builds_are_order_independent() {
    let forward = build(sample()).unwrap();
    let mut reversed_sources = sample();
    reversed_sources.reverse();
    let reversed = build(reversed_sources).unwrap();
    assert_eq!(forward, reversed);

    let alias = node(&forward, "net", &["hosts", "host", "alias"]).type_definition().unwrap();
    assert_eq!(alias.resolved_target().unwrap().builtin, BuiltinType::String);
}

#[test]
fn test_parallel_builds_share_a_reactor() {
    let reactor = yang_stmt::default_reactor();
    let expected = build(sample()).unwrap();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let sources = sources(sample());
                    reactor.build(&as_dyn(&sources), &[]).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
