//! Argument parsers shared by the statement supports.

use std::str::FromStr;

use yang_model::{is_identifier, Argument, ArgumentError, BuiltinType, QName};
use yang_reactor::{ErrorKind, ParseContext, SelfKey, SourceError, SourceResult};

use crate::namespaces::{ModuleQNameNs, PrefixToModuleNs};
use crate::resolve::module_qname;

/// Free text argument.
pub fn string(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    Ok(Argument::String(ctx.require(raw)?.to_string()))
}

/// Plain identifier argument.
pub fn identifier(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    let text = ctx.require(raw)?;
    if !is_identifier(text) {
        return Err(ctx.error(format!("'{text}' is not a valid identifier")));
    }
    Ok(Argument::Identifier(text.to_string()))
}

/// Statements such as `input` that take no argument.
pub fn none(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    match raw {
        None => Ok(Argument::None),
        Some(text) => Err(ctx.error(format!(
            "statement '{}' takes no argument, found '{text}'",
            ctx.keyword
        ))),
    }
}

pub fn boolean(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    match ctx.require(raw)? {
        "true" => Ok(Argument::Boolean(true)),
        "false" => Ok(Argument::Boolean(false)),
        other => Err(ctx.error(format!(
            "'{other}' is not a valid boolean, expected 'true' or 'false'"
        ))),
    }
}

pub fn unsigned(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    let text = ctx.require(raw)?;
    text.parse::<u64>()
        .map(Argument::Unsigned)
        .map_err(|_| ctx.error(format!("'{text}' is not a valid non-negative integer")))
}

pub fn integer(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    let text = ctx.require(raw)?;
    text.parse::<i64>()
        .map(Argument::Integer)
        .map_err(|_| ctx.error(format!("'{text}' is not a valid integer")))
}

/// `max-elements`: a positive integer or "unbounded".
pub fn max_elements(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    match ctx.require(raw)? {
        "unbounded" => Ok(Argument::MaxElements(None)),
        text => match text.parse::<u64>() {
            Ok(value) if value > 0 => Ok(Argument::MaxElements(Some(value))),
            _ => Err(ctx.error(format!("'{text}' is not a valid max-elements value"))),
        },
    }
}

/// Whitespace separated key leaf names.
pub fn keys(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    let text = ctx.require(raw)?;
    let names: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    if names.is_empty() {
        return Err(ctx.error("key statement names no leaf"));
    }
    if let Some(bad) = names.iter().find(|name| !is_identifier(name)) {
        return Err(ctx.error(format!("'{bad}' is not a valid key leaf name")));
    }
    Ok(Argument::Keys(names))
}

/// Any argument with a `FromStr` implementation in the model.
pub fn parsed<T>(
    raw: Option<&str>,
    ctx: &ParseContext<'_>,
    wrap: fn(T) -> Argument,
) -> SourceResult<Argument>
where
    T: FromStr<Err = ArgumentError>,
{
    let text = ctx.require(raw)?;
    text.parse::<T>()
        .map(wrap)
        .map_err(|error| ctx.error(error.message().to_string()))
}

/// Resolve `prefix:name` (or a bare `name` in the current module) to a
/// qualified name, from the statement being parsed.
pub fn qname(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<QName> {
    let text = ctx.require(raw)?;
    let (prefix, local) = match text.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, text),
    };
    if !is_identifier(local) || prefix.is_some_and(|prefix| !is_identifier(prefix)) {
        return Err(ctx.error(format!("'{text}' is not a valid node identifier")));
    }
    let Some(parent) = ctx.parent else {
        return Err(ctx.error(format!("'{text}' cannot be resolved at the top level")));
    };

    let module = match prefix {
        None => module_qname(parent),
        Some(prefix) => parent
            .lookup::<PrefixToModuleNs>(&prefix.to_string())
            .and_then(|root| parent.at(*root).lookup::<ModuleQNameNs>(&SelfKey).cloned()),
    };
    match module {
        Some(module) => Ok(QName::new(module, local)),
        None => Err(SourceError::new(
            ErrorKind::UnresolvedReference,
            ctx.location.clone(),
            format!(
                "prefix '{}' of '{text}' is not bound to any module",
                prefix.unwrap_or_default()
            ),
        )),
    }
}

/// `type` argument: a built-in type name or a typedef reference.
pub fn type_name(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    let text = ctx.require(raw)?;
    match BuiltinType::from_name(text) {
        Some(builtin) => Ok(Argument::Builtin(builtin)),
        None => qname(raw, ctx).map(Argument::QName),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_model::{Keyword, SourceLocation};

    fn parse(
        parser: fn(Option<&str>, &ParseContext<'_>) -> SourceResult<Argument>,
        raw: Option<&str>,
    ) -> SourceResult<Argument> {
        let keyword = Keyword::yang("test");
        let location = SourceLocation::new("t.yang", 1, 1);
        let ctx = ParseContext {
            keyword: &keyword,
            location: &location,
            parent: None,
        };
        parser(raw, &ctx)
    }

    #[test]
    fn test_boolean() {
        assert_eq!(parse(boolean, Some("true")).unwrap(), Argument::Boolean(true));
        let error = parse(boolean, Some("yes")).unwrap_err();
        assert_eq!(error.kind, ErrorKind::ArgumentSyntax);
    }

    #[test]
    fn test_missing_argument() {
        let error = parse(string, None).unwrap_err();
        assert_eq!(error.message, "statement 'test' requires an argument");
        assert_eq!(parse(none, None).unwrap(), Argument::None);
        assert!(parse(none, Some("x")).is_err());
    }

    #[test]
    fn test_identifier() {
        assert!(parse(identifier, Some("if-name")).is_ok());
        assert!(parse(identifier, Some("9lives")).is_err());
    }

    #[test]
    fn test_max_elements() {
        assert_eq!(parse(max_elements, Some("unbounded")).unwrap(), Argument::MaxElements(None));
        assert_eq!(parse(max_elements, Some("4")).unwrap(), Argument::MaxElements(Some(4)));
        assert!(parse(max_elements, Some("0")).is_err());
    }

    #[test]
    fn test_keys() {
        assert_eq!(
            parse(keys, Some(" name  type ")).unwrap(),
            Argument::Keys(vec!["name".into(), "type".into()])
        );
        assert!(parse(keys, Some("a b:c")).is_err());
    }

    #[test]
    fn test_builtin_type_needs_no_scope() {
        assert_eq!(parse(type_name, Some("uint8")).unwrap(), Argument::Builtin(BuiltinType::Uint8));
        // A typedef reference needs an enclosing module.
        assert!(parse(type_name, Some("my-type")).is_err());
    }
}
