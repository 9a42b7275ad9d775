//! Speculative two-way parsing.

use crate::context::CommandContext;
use crate::error::ParseFailure;
use crate::input::CommandInput;
use crate::parser::ArgumentParser;
use crate::suggestion::Suggestion;

/// One of two possible parse results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Either<L, R> {
    /// The primary parser matched.
    Left(L),
    /// The fallback parser matched.
    Right(R),
}

impl<L, R> Either<L, R> {
    /// `true` if the primary parser produced this value.
    pub const fn is_left(&self) -> bool {
        matches!(self, Self::Left(_))
    }

    /// `true` if the fallback parser produced this value.
    pub const fn is_right(&self) -> bool {
        matches!(self, Self::Right(_))
    }

    /// The primary value, if present.
    pub fn left(self) -> Option<L> {
        match self {
            Self::Left(value) => Some(value),
            Self::Right(_) => None,
        }
    }

    /// The fallback value, if present.
    pub fn right(self) -> Option<R> {
        match self {
            Self::Left(_) => None,
            Self::Right(value) => Some(value),
        }
    }
}

/// Tries the primary parser on a branch; on any failure restores the input
/// and tries the fallback. When both fail, both causes are reported.
pub struct EitherParser<A, B> {
    primary: A,
    fallback: B,
}

impl<A, B> EitherParser<A, B> {
    /// Combines two parsers.
    pub const fn new(primary: A, fallback: B) -> Self {
        Self { primary, fallback }
    }
}

impl<S, A, B> ArgumentParser<S> for EitherParser<A, B>
where
    A: ArgumentParser<S>,
    B: ArgumentParser<S>,
{
    type Output = Either<A::Output, B::Output>;

    fn parse(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<Self::Output, ParseFailure> {
        let snapshot = input.branch();
        let primary_failure = match self.primary.parse(ctx, input) {
            Ok(value) => return Ok(Either::Left(value)),
            Err(failure) => {
                input.restore(snapshot);
                failure
            }
        };
        match self.fallback.parse(ctx, input) {
            Ok(value) => Ok(Either::Right(value)),
            Err(fallback_failure) => {
                input.restore(snapshot);
                Err(ParseFailure::EitherFailed {
                    primary: Box::new(primary_failure),
                    fallback: Box::new(fallback_failure),
                })
            }
        }
    }

    fn suggest(&self, ctx: &mut CommandContext<S>, input: &CommandInput) -> Vec<Suggestion> {
        let mut suggestions = self.primary.suggest(ctx, input);
        suggestions.extend(self.fallback.suggest(ctx, input));
        suggestions
    }

    fn token_count(&self) -> usize {
        self.primary.token_count().max(self.fallback.token_count())
    }

    fn context_free(&self) -> bool {
        self.primary.context_free() && self.fallback.context_free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InjectionRegistry;
    use crate::parser::boolean::BoolParser;
    use crate::parser::numeric::NumberParser;
    use std::sync::Arc;

    fn ctx() -> CommandContext<()> {
        CommandContext::new((), Arc::from(""), Arc::new(InjectionRegistry::new()), false)
    }

    fn parser() -> EitherParser<NumberParser<i32>, BoolParser> {
        EitherParser::new(NumberParser::range(1, 3), BoolParser::strict())
    }

    #[test]
    fn primary_wins_when_it_matches() {
        let mut input = CommandInput::new("1");
        assert_eq!(
            parser().parse(&mut ctx(), &mut input).expect("parse"),
            Either::Left(1)
        );
    }

    #[test]
    fn fallback_is_tried_on_any_primary_failure() {
        let mut input = CommandInput::new("false");
        assert_eq!(
            parser().parse(&mut ctx(), &mut input).expect("parse"),
            Either::Right(false)
        );
    }

    #[test]
    fn both_failures_are_reported() {
        let mut input = CommandInput::new("sausage");
        let before = input.branch();
        let failure = parser().parse(&mut ctx(), &mut input).expect_err("must fail");
        let ParseFailure::EitherFailed { primary, fallback } = failure else {
            panic!("expected EitherFailed, got {failure:?}");
        };
        assert!(matches!(*primary, ParseFailure::NumberMalformed { .. }));
        assert!(matches!(*fallback, ParseFailure::BooleanMalformed { .. }));
        assert_eq!(input.branch(), before);
    }

    #[test]
    fn suggestions_concatenate_both_sides() {
        let suggestions = parser().suggest(&mut ctx(), &CommandInput::new(""));
        let texts: Vec<_> = suggestions.iter().map(Suggestion::text).collect();
        assert_eq!(texts, ["1", "2", "3", "true", "false"]);
    }
}
