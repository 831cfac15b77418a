//! `typedef` and `type`.
//!
//! A typedef binds its name in the enclosing scope during
//! STATEMENT_DEFINITION. A `type` naming a typedef resolves it with an
//! inference action in FULL_DECLARATION, so typedefs may be used before they
//! are declared and across modules. The resolved [`TypeDefinition`] is
//! produced during effective model construction; a typedef chain that loops
//! back onto itself surfaces there as a circular dependency.

use std::sync::Arc;

use yang_model::{
    Argument, BitMember, BuiltinType, EffectiveKind, EnumMember, LeafrefSpec, QName, Restrictions,
    TypeDefinition, TypeName,
};
use yang_reactor::{
    CopyPolicy, EffectiveInput, ErrorKind, InferenceAction, ParseContext, Phase, Prereq,
    ReactorBuilder, Resolved, SelfKey, SourceError, SourceResult, StatementSupport, Stmt, StmtMut,
    SubstatementValidator, Unresolved,
};

use super::{kw, with_status};
use crate::arguments;
use crate::namespaces::{LeafrefTargetNs, TypeBaseNs, TypeNs};
use crate::resolve::{find_definition, module_qname};

pub struct TypedefSupport {
    validator: SubstatementValidator,
}

impl TypedefSupport {
    pub fn new() -> Self {
        let validator = with_status(SubstatementValidator::builder())
            .mandatory("type")
            .optional("units")
            .optional("default")
            .build();
        Self { validator }
    }
}

impl Default for TypedefSupport {
    fn default() -> Self {
        Self::new()
    }
}

fn text_of(input: &EffectiveInput<'_, '_>, name: &str) -> Option<String> {
    input
        .substatement(name)
        .and_then(|sub| sub.argument().as_str())
        .map(str::to_string)
}

impl StatementSupport for TypedefSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        let argument = arguments::identifier(raw, ctx)?;
        if let Some(builtin) = argument.as_str().and_then(BuiltinType::from_name) {
            return Err(SourceError::new(
                ErrorKind::InvalidStatement,
                ctx.location.clone(),
                format!("typedef '{builtin}' clashes with a built-in type name"),
            ));
        }
        Ok(argument)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Ignore
    }

    fn on_statement_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let view = stmt.view();
        let (Some(parent), Some(name)) = (view.parent(), view.raw_argument()) else {
            return Ok(());
        };
        let (parent, name, id) = (parent.id(), name.to_string(), stmt.id());
        stmt.add_to_ns_at::<TypeNs>(parent, name, id)
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        let Some(base) = input
            .substatement("type")
            .and_then(|ty| ty.type_definition().cloned())
        else {
            return Err(SourceError::internal(
                stmt.location().clone(),
                "typedef without a built type",
            ));
        };
        let Some(module) = module_qname(stmt) else {
            return Err(SourceError::internal(
                stmt.location().clone(),
                "typedef without a module identity",
            ));
        };
        let name = QName::new(module, stmt.raw_argument().unwrap_or_default());

        let mut definition = TypeDefinition::derive(TypeName::Derived(name), base);
        if let Some(units) = text_of(input, "units") {
            definition.units = Some(units);
        }
        if let Some(default) = text_of(input, "default") {
            definition.default = Some(default);
        }
        definition.description = text_of(input, "description");
        Ok(EffectiveKind::Typedef(Arc::new(definition)))
    }
}

pub struct TypeSupport {
    validator: SubstatementValidator,
}

impl TypeSupport {
    pub fn new() -> Self {
        let validator = SubstatementValidator::builder()
            .optional("fraction-digits")
            .optional("range")
            .optional("length")
            .optional("path")
            .optional("require-instance")
            .any("pattern")
            .any("enum")
            .any("bit")
            .any("base")
            .any("type")
            .build();
        Self { validator }
    }
}

impl Default for TypeSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSupport for TypeSupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        arguments::type_name(raw, ctx)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }

    fn on_full_definition_declared(&self, stmt: &mut StmtMut<'_>) -> SourceResult<()> {
        let Argument::QName(qname) = stmt.view().argument().clone() else {
            return Ok(());
        };
        let name = stmt.view().raw_argument().unwrap_or_default().to_string();
        let mut action = stmt.new_inference_action(Phase::FullDeclaration)?;
        let base = action.requires_ctx(
            format!("typedef '{name}'"),
            Phase::StatementDefinition,
            move |stmt| find_definition::<TypeNs>(stmt, &qname),
        );
        stmt.apply_action(action, ResolveTypedef { name, base })
    }

    fn shares_prototype(&self, copy: Stmt<'_>, _prototype: Stmt<'_>) -> bool {
        copy.first_child("path").is_none()
    }

    fn build_effective(&self, input: &mut EffectiveInput<'_, '_>) -> SourceResult<EffectiveKind> {
        let stmt = input.stmt();
        let restrictions = restrictions(input);
        let mut definition = match stmt.argument() {
            Argument::Builtin(builtin) => {
                check_builtin_substatements(input, *builtin)?;
                let mut definition = TypeDefinition::builtin(*builtin);
                definition.restrictions = restrictions;
                definition
            }
            Argument::QName(_) => {
                let base = derived_base(input)?;
                if restrictions.is_empty() && !has_own_members(input) {
                    return Ok(EffectiveKind::Type(base));
                }
                let mut definition = TypeDefinition::derive(base.name.clone(), base.clone());
                definition.restrictions = base.restrictions.refined_by(&restrictions);
                definition
            }
            _ => {
                return Err(SourceError::internal(
                    stmt.location().clone(),
                    "type with an unparsed argument",
                ))
            }
        };

        definition.enums = match enums(input) {
            enums if enums.is_empty() => definition.enums,
            enums => enums,
        };
        definition.bits = match bits(input) {
            bits if bits.is_empty() => definition.bits,
            bits => bits,
        };
        let bases: Vec<QName> = input
            .substatements()
            .iter()
            .filter_map(|sub| match sub.kind() {
                EffectiveKind::Base(qname) => Some(qname.clone()),
                _ => None,
            })
            .collect();
        if !bases.is_empty() {
            definition.identity_bases = bases;
        }
        let members: Vec<Arc<TypeDefinition>> = input
            .substatements()
            .iter()
            .filter(|sub| sub.keyword().is("type"))
            .filter_map(|sub| sub.type_definition().cloned())
            .collect();
        if !members.is_empty() {
            definition.union_members = members;
        }
        if let Some(spec) = leafref(input)? {
            definition.leafref = Some(spec);
        }
        Ok(EffectiveKind::Type(Arc::new(definition)))
    }
}

/// Typedef a derived type resolved to, built on demand.
fn derived_base(input: &mut EffectiveInput<'_, '_>) -> SourceResult<Arc<TypeDefinition>> {
    let stmt = input.stmt();
    let Some(typedef) = stmt.original().lookup::<TypeBaseNs>(&SelfKey).copied() else {
        return Err(SourceError::internal(
            stmt.location().clone(),
            "derived type was never resolved",
        ));
    };
    let built = input.effective_of(typedef)?;
    match built.as_ref().and_then(|typedef| typedef.type_definition()) {
        Some(definition) => Ok(definition.clone()),
        None => Err(input.error(
            ErrorKind::InvalidStatement,
            format!("typedef '{}' is not available", stmt.raw_argument().unwrap_or_default()),
        )),
    }
}

/// Whether the type statement adds members or a path of its own.
fn has_own_members(input: &EffectiveInput<'_, '_>) -> bool {
    input
        .substatements()
        .iter()
        .any(|sub| {
            ["enum", "bit", "base", "type", "path"]
                .iter()
                .any(|name| sub.keyword().is(name))
        })
}

fn restrictions(input: &EffectiveInput<'_, '_>) -> Restrictions {
    let text = |name: &str| text_of(input, name);
    Restrictions {
        range: text("range"),
        length: text("length"),
        patterns: input
            .substatements()
            .iter()
            .filter(|sub| sub.keyword().is("pattern"))
            .filter_map(|sub| sub.argument().as_str().map(str::to_string))
            .collect(),
        fraction_digits: match input.substatement("fraction-digits").map(|sub| sub.argument()) {
            Some(Argument::Unsigned(digits)) => u8::try_from(*digits).ok(),
            _ => None,
        },
        require_instance: input
            .substatement("require-instance")
            .and_then(|sub| sub.argument().as_bool()),
    }
}

/// Enum members, numbering those without a `value` after the highest so far.
fn enums(input: &EffectiveInput<'_, '_>) -> Vec<EnumMember> {
    let mut next = 0i64;
    let mut members = Vec::new();
    for member in input.substatements().iter().filter(|sub| sub.keyword().is("enum")) {
        let value = match member.find_first("value").map(|value| value.argument()) {
            Some(Argument::Integer(value)) => *value,
            _ => next,
        };
        next = value.saturating_add(1);
        members.push(EnumMember {
            name: member.argument().as_str().unwrap_or_default().to_string(),
            value,
        });
    }
    members
}

fn bits(input: &EffectiveInput<'_, '_>) -> Vec<BitMember> {
    let mut next = 0u64;
    let mut members = Vec::new();
    for member in input.substatements().iter().filter(|sub| sub.keyword().is("bit")) {
        let position = match member.find_first("position").map(|position| position.argument()) {
            Some(Argument::Unsigned(position)) => *position,
            _ => next,
        };
        next = position.saturating_add(1);
        members.push(BitMember {
            name: member.argument().as_str().unwrap_or_default().to_string(),
            position,
        });
    }
    members
}

/// Path and resolved target type of a leafref `type`.
fn leafref(input: &mut EffectiveInput<'_, '_>) -> SourceResult<Option<LeafrefSpec>> {
    let stmt = input.stmt();
    let Some(path_stmt) = stmt.first_child("path") else {
        return Ok(None);
    };
    let Argument::Path(path) = path_stmt.argument() else {
        return Ok(None);
    };
    let target = match path_stmt.lookup::<LeafrefTargetNs>(&SelfKey).copied() {
        Some(leaf) => input
            .effective_of(leaf)?
            .and_then(|leaf| leaf.schema_node().and_then(|node| node.type_definition.clone())),
        None => None,
    };
    Ok(Some(LeafrefSpec {
        path: path.clone(),
        target,
    }))
}

/// Substatements some built-in types cannot do without.
fn check_builtin_substatements(
    input: &EffectiveInput<'_, '_>,
    builtin: BuiltinType,
) -> SourceResult<()> {
    let required = match builtin {
        BuiltinType::LeafRef => "path",
        BuiltinType::IdentityRef => "base",
        BuiltinType::Enumeration => "enum",
        BuiltinType::Bits => "bit",
        BuiltinType::Union => "type",
        BuiltinType::Decimal64 => "fraction-digits",
        _ => return Ok(()),
    };
    if input.stmt().first_child(required).is_none() {
        return Err(input.error(
            ErrorKind::InvalidStatement,
            format!("type '{builtin}' requires a '{required}' substatement"),
        ));
    }
    Ok(())
}

struct ResolveTypedef {
    name: String,
    base: Prereq,
}

impl InferenceAction for ResolveTypedef {
    fn apply(self: Box<Self>, stmt: &mut StmtMut<'_>, resolved: &Resolved) -> SourceResult<()> {
        stmt.add_to_ns::<TypeBaseNs>(SelfKey, resolved.get(self.base))
    }

    fn prerequisite_failed(
        self: Box<Self>,
        stmt: Stmt<'_>,
        _unresolved: &Unresolved,
    ) -> SourceError {
        stmt.error(ErrorKind::UnresolvedReference, format!("type '{}' not found", self.name))
    }
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    builder
        .add_statement_support(Phase::StatementDefinition, kw("typedef"), TypedefSupport::new())
        .add_statement_support(Phase::StatementDefinition, kw("type"), TypeSupport::new())
}
