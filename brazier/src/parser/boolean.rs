//! Boolean parsing, strict or liberal.

use crate::context::CommandContext;
use crate::error::ParseFailure;
use crate::input::CommandInput;
use crate::parser::ArgumentParser;
use crate::suggestion::Suggestion;

/// Parses `true`/`false`; in liberal mode also `yes`/`no`/`on`/`off`/`1`/`0`,
/// all case-insensitive.
pub struct BoolParser {
    liberal: bool,
}

impl BoolParser {
    /// Strict parser: only `true` and `false`.
    #[must_use]
    pub const fn strict() -> Self {
        Self { liberal: false }
    }

    /// Liberal parser: common yes/no spellings are accepted.
    #[must_use]
    pub const fn liberal() -> Self {
        Self { liberal: true }
    }
}

impl<S> ArgumentParser<S> for BoolParser {
    type Output = bool;

    fn parse(
        &self,
        _ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<bool, ParseFailure> {
        let snapshot = input.branch();
        let token = input.read_plain()?;
        let value = match token.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            "yes" | "on" | "1" if self.liberal => Some(true),
            "no" | "off" | "0" if self.liberal => Some(false),
            _ => None,
        };
        value.ok_or_else(|| {
            input.restore(snapshot);
            ParseFailure::BooleanMalformed { input: token }
        })
    }

    fn suggest(&self, _ctx: &mut CommandContext<S>, _input: &CommandInput) -> Vec<Suggestion> {
        vec![Suggestion::new("true"), Suggestion::new("false")]
    }

    fn context_free(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InjectionRegistry;
    use std::sync::Arc;

    fn ctx() -> CommandContext<()> {
        CommandContext::new((), Arc::from(""), Arc::new(InjectionRegistry::new()), false)
    }

    #[test]
    fn strict_accepts_only_true_false() {
        let parser = BoolParser::strict();
        let mut input = CommandInput::new("false");
        assert!(!parser.parse(&mut ctx(), &mut input).expect("parse"));

        let mut input = CommandInput::new("yes");
        assert!(matches!(
            parser.parse(&mut ctx(), &mut input),
            Err(ParseFailure::BooleanMalformed { .. })
        ));
    }

    #[test]
    fn liberal_accepts_common_spellings() {
        let parser = BoolParser::liberal();
        for token in ["TRUE", "yes", "On", "1"] {
            let mut input = CommandInput::new(token);
            assert!(parser.parse(&mut ctx(), &mut input).expect("parse"), "{token}");
        }
        for token in ["false", "NO", "off", "0"] {
            let mut input = CommandInput::new(token);
            assert!(!parser.parse(&mut ctx(), &mut input).expect("parse"), "{token}");
        }
    }

    #[test]
    fn failure_rewinds_input() {
        let parser = BoolParser::strict();
        let mut input = CommandInput::new("sausage");
        let before = input.branch();
        assert!(parser.parse(&mut ctx(), &mut input).is_err());
        assert_eq!(input.branch(), before);
    }
}
