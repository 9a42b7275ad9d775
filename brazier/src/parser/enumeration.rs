//! Parsing of closed variant sets.

use std::marker::PhantomData;

use crate::context::CommandContext;
use crate::error::ParseFailure;
use crate::input::CommandInput;
use crate::parser::ArgumentParser;
use crate::suggestion::Suggestion;

/// A closed set of named variants, parseable by [`EnumParser`].
pub trait NamedVariant: Clone + Send + Sync + 'static {
    /// Every variant of the set.
    fn variants() -> &'static [Self];

    /// The canonical name of this variant.
    fn name(&self) -> &'static str;
}

/// Matches a token against the variant names of `T`, case-insensitively.
pub struct EnumParser<T>(PhantomData<fn() -> T>);

impl<T: NamedVariant> EnumParser<T> {
    /// Creates the parser.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: NamedVariant> Default for EnumParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, T: NamedVariant> ArgumentParser<S> for EnumParser<T> {
    type Output = T;

    fn parse(
        &self,
        _ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<T, ParseFailure> {
        let snapshot = input.branch();
        let token = input.read_plain()?;
        T::variants()
            .iter()
            .find(|variant| variant.name().eq_ignore_ascii_case(&token))
            .cloned()
            .ok_or_else(|| {
                input.restore(snapshot);
                ParseFailure::EnumUnknown {
                    input: token,
                    variants: T::variants().iter().map(|v| v.name().to_string()).collect(),
                }
            })
    }

    fn suggest(&self, _ctx: &mut CommandContext<S>, _input: &CommandInput) -> Vec<Suggestion> {
        T::variants()
            .iter()
            .map(|variant| Suggestion::new(variant.name()))
            .collect()
    }

    fn context_free(&self) -> bool {
        true
    }
}
