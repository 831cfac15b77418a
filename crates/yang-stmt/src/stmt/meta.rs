//! Property statements: documentation, constraints and the substatements of
//! types. They carry a typed argument and no behaviour of their own; parents
//! read them through their substatements and facets.

use yang_model::{Argument, OrderedBy, Status};
use yang_reactor::{
    ParseContext, Phase, ReactorBuilder, SourceResult, StatementSupport, SubstatementValidator,
};

use super::{documented, kw, with_status};
use crate::arguments;

pub type ArgumentParser = fn(Option<&str>, &ParseContext<'_>) -> SourceResult<Argument>;

/// Support for a statement defined by its argument syntax and allowed
/// substatements only.
pub struct PropertySupport {
    parse: ArgumentParser,
    validator: SubstatementValidator,
}

impl PropertySupport {
    pub fn new(parse: ArgumentParser) -> Self {
        Self {
            parse,
            validator: SubstatementValidator::empty(),
        }
    }

    pub fn with_validator(mut self, validator: SubstatementValidator) -> Self {
        self.validator = validator;
        self
    }
}

impl StatementSupport for PropertySupport {
    fn parse_argument(&self, raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
        (self.parse)(raw, ctx)
    }

    fn validator(&self) -> Option<&SubstatementValidator> {
        Some(&self.validator)
    }
}

fn status(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    arguments::parsed(raw, ctx, Argument::Status as fn(Status) -> Argument)
}

fn ordered_by(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    arguments::parsed(raw, ctx, Argument::OrderedBy as fn(OrderedBy) -> Argument)
}

fn fraction_digits(raw: Option<&str>, ctx: &ParseContext<'_>) -> SourceResult<Argument> {
    match arguments::unsigned(raw, ctx)? {
        Argument::Unsigned(digits) if (1..=18).contains(&digits) => Ok(Argument::Unsigned(digits)),
        _ => Err(ctx.error(format!(
            "fraction-digits must be between 1 and 18, found '{}'",
            raw.unwrap_or_default()
        ))),
    }
}

fn constraint_validator() -> SubstatementValidator {
    documented(SubstatementValidator::builder())
        .optional("error-message")
        .optional("error-app-tag")
        .build()
}

pub fn register(builder: ReactorBuilder) -> ReactorBuilder {
    let linkage = |builder: ReactorBuilder, name: &str| {
        builder.add_statement_support(
            Phase::SourceLinkage,
            kw(name),
            PropertySupport::new(arguments::string),
        )
    };
    let builder = ["description", "reference", "contact", "organization"]
        .into_iter()
        .fold(builder, linkage);

    let definition = Phase::StatementDefinition;
    let simple: &[(&str, ArgumentParser)] = &[
        ("units", arguments::string),
        ("default", arguments::string),
        ("presence", arguments::string),
        ("unique", arguments::string),
        ("error-message", arguments::string),
        ("error-app-tag", arguments::string),
        ("config", arguments::boolean),
        ("mandatory", arguments::boolean),
        ("require-instance", arguments::boolean),
        ("yin-element", arguments::boolean),
        ("min-elements", arguments::unsigned),
        ("max-elements", arguments::max_elements),
        ("key", arguments::keys),
        ("status", status),
        ("ordered-by", ordered_by),
        ("value", arguments::integer),
        ("position", arguments::unsigned),
        ("fraction-digits", fraction_digits),
    ];
    let builder = simple.iter().fold(builder, |builder, (name, parse)| {
        builder.add_statement_support(definition, kw(name), PropertySupport::new(*parse))
    });

    builder
        .add_statement_support(
            definition,
            kw("must"),
            PropertySupport::new(arguments::string).with_validator(constraint_validator()),
        )
        .add_statement_support(
            definition,
            kw("range"),
            PropertySupport::new(arguments::string).with_validator(constraint_validator()),
        )
        .add_statement_support(
            definition,
            kw("length"),
            PropertySupport::new(arguments::string).with_validator(constraint_validator()),
        )
        .add_statement_support(
            definition,
            kw("pattern"),
            PropertySupport::new(arguments::string).with_validator(constraint_validator()),
        )
        .add_statement_support(
            definition,
            kw("when"),
            PropertySupport::new(arguments::string)
                .with_validator(documented(SubstatementValidator::builder()).build()),
        )
        .add_statement_support(
            definition,
            kw("enum"),
            PropertySupport::new(arguments::string)
                .with_validator(
                    with_status(SubstatementValidator::builder())
                        .optional("value")
                        .any("if-feature")
                        .build(),
                ),
        )
        .add_statement_support(
            definition,
            kw("bit"),
            PropertySupport::new(arguments::identifier).with_validator(
                with_status(SubstatementValidator::builder())
                    .optional("position")
                    .any("if-feature")
                    .build(),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_model::{Keyword, SourceLocation};
    use yang_reactor::ErrorKind;

    fn parse(parser: ArgumentParser, raw: &str) -> SourceResult<Argument> {
        let keyword = Keyword::yang("test");
        let location = SourceLocation::new("t.yang", 3, 5);
        let ctx = ParseContext {
            keyword: &keyword,
            location: &location,
            parent: None,
        };
        parser(Some(raw), &ctx)
    }

    #[test]
    fn test_status_argument() {
        assert_eq!(parse(status, "deprecated").unwrap(), Argument::Status(Status::Deprecated));
        assert_eq!(parse(status, "retired").unwrap_err().kind, ErrorKind::ArgumentSyntax);
    }

    #[test]
    fn test_fraction_digits_range() {
        assert_eq!(parse(fraction_digits, "2").unwrap(), Argument::Unsigned(2));
        assert!(parse(fraction_digits, "0").is_err());
        let error = parse(fraction_digits, "19").unwrap_err();
        assert!(error.message.contains("between 1 and 18"));
    }

    #[test]
    fn test_constraint_validator_allows_error_message() {
        let validator = constraint_validator();
        assert_eq!(
            validator.cardinality("error-message"),
            Some(yang_reactor::Cardinality::Optional)
        );
        assert_eq!(validator.cardinality("must"), None);
    }
}
