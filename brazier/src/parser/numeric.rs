//! Bounded numeric parsing for every primitive width.

use std::fmt::Display;
use std::str::FromStr;

use crate::context::CommandContext;
use crate::error::ParseFailure;
use crate::input::CommandInput;
use crate::parser::ArgumentParser;
use crate::suggestion::Suggestion;

/// A primitive number the [`NumberParser`] can handle.
pub trait ParsableNumber:
    Copy + PartialOrd + Display + FromStr + Send + Sync + 'static
{
    /// Smallest representable value.
    const MIN: Self;
    /// Largest representable value.
    const MAX: Self;

    /// Integer view of the value, `None` for floating point types.
    fn as_integer(self) -> Option<i128>;
}

macro_rules! parsable_int {
    ($($ty:ty),*) => {$(
        impl ParsableNumber for $ty {
            const MIN: Self = <$ty>::MIN;
            const MAX: Self = <$ty>::MAX;

            fn as_integer(self) -> Option<i128> {
                Some(self as i128)
            }
        }
    )*};
}

macro_rules! parsable_float {
    ($($ty:ty),*) => {$(
        impl ParsableNumber for $ty {
            const MIN: Self = <$ty>::MIN;
            const MAX: Self = <$ty>::MAX;

            fn as_integer(self) -> Option<i128> {
                None
            }
        }
    )*};
}

parsable_int!(i8, i16, i32, i64, u8, u16, u32, u64);
parsable_float!(f32, f64);

/// Parses a number of type `T`, range-checked against inclusive bounds.
pub struct NumberParser<T> {
    min: T,
    max: T,
}

impl<T: ParsableNumber> NumberParser<T> {
    /// A parser accepting the full range of `T`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            min: T::MIN,
            max: T::MAX,
        }
    }

    /// A parser accepting `min..=max`.
    #[must_use]
    pub fn range(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Restricts the lower bound.
    #[must_use]
    pub fn with_min(mut self, min: T) -> Self {
        self.min = min;
        self
    }

    /// Restricts the upper bound.
    #[must_use]
    pub fn with_max(mut self, max: T) -> Self {
        self.max = max;
        self
    }
}

impl<T: ParsableNumber> Default for NumberParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, T: ParsableNumber> ArgumentParser<S> for NumberParser<T> {
    type Output = T;

    fn parse(
        &self,
        _ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<T, ParseFailure> {
        let snapshot = input.branch();
        let token = input.read_plain()?;
        let value: T = token.parse().map_err(|_| {
            input.restore(snapshot);
            ParseFailure::NumberMalformed {
                input: token.clone(),
            }
        })?;

        if value < self.min || value > self.max {
            input.restore(snapshot);
            return Err(ParseFailure::NumberOutOfRange {
                input: token,
                min: self.min.to_string(),
                max: self.max.to_string(),
            });
        }

        Ok(value)
    }

    fn suggest(&self, _ctx: &mut CommandContext<S>, _input: &CommandInput) -> Vec<Suggestion> {
        // Only a small closed integer range is worth enumerating.
        const ENUMERABLE: i128 = 10;
        match (self.min.as_integer(), self.max.as_integer()) {
            (Some(min), Some(max)) if max - min < ENUMERABLE => {
                (min..=max).map(|v| Suggestion::new(v.to_string())).collect()
            }
            _ => Vec::new(),
        }
    }

    fn context_free(&self) -> bool {
        true
    }
}
