//! String, char, and string-array parsing.

use crate::context::CommandContext;
use crate::error::ParseFailure;
use crate::input::CommandInput;
use crate::parser::ArgumentParser;

/// How much input a [`StringParser`] consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMode {
    /// One whitespace-delimited token, quotes taken verbatim.
    Single,
    /// One token, honoring `"…"` quoting and escapes.
    Quoted,
    /// The rest of the input.
    Greedy,
    /// The rest of the input up to the first bare `-` token, so a trailing
    /// flag region can still be parsed.
    GreedyFlagYielding,
}

/// Parses a string in one of four modes.
///
/// `Greedy` and `Quoted` are mutually exclusive by construction; when both
/// greedy and flag-yielding behavior are requested, flag-yielding wins.
pub struct StringParser {
    mode: StringMode,
}

impl StringParser {
    /// One plain token.
    #[must_use]
    pub const fn single() -> Self {
        Self {
            mode: StringMode::Single,
        }
    }

    /// One token with quoting.
    #[must_use]
    pub const fn quoted() -> Self {
        Self {
            mode: StringMode::Quoted,
        }
    }

    /// The remainder of the input.
    #[must_use]
    pub const fn greedy() -> Self {
        Self {
            mode: StringMode::Greedy,
        }
    }

    /// The remainder of the input, stopping before a flag region.
    #[must_use]
    pub const fn greedy_flag_yielding() -> Self {
        Self {
            mode: StringMode::GreedyFlagYielding,
        }
    }

    /// The parser's mode.
    #[must_use]
    pub const fn mode(&self) -> StringMode {
        self.mode
    }
}

impl<S> ArgumentParser<S> for StringParser {
    type Output = String;

    fn parse(
        &self,
        _ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<String, ParseFailure> {
        match self.mode {
            StringMode::Single => input.read_plain(),
            StringMode::Quoted => input.read(),
            StringMode::Greedy => input.read_greedy(),
            StringMode::GreedyFlagYielding => input.read_greedy_flag_yielding(),
        }
    }

    fn consumes_remainder(&self) -> bool {
        matches!(
            self.mode,
            StringMode::Greedy | StringMode::GreedyFlagYielding
        )
    }

    fn context_free(&self) -> bool {
        true
    }
}

/// Parses exactly one character.
pub struct CharParser;

impl<S> ArgumentParser<S> for CharParser {
    type Output = char;

    fn parse(
        &self,
        _ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<char, ParseFailure> {
        let snapshot = input.branch();
        let token = input.read_plain()?;
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => {
                input.restore(snapshot);
                Err(ParseFailure::CharMalformed { input: token })
            }
        }
    }

    fn context_free(&self) -> bool {
        true
    }
}

/// Consumes every remaining token into a vector.
pub struct StringArrayParser {
    flag_yielding: bool,
}

impl StringArrayParser {
    /// Consumes tokens to the end of the input.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flag_yielding: false,
        }
    }

    /// Consumes tokens up to the first bare `-` token.
    #[must_use]
    pub const fn flag_yielding() -> Self {
        Self {
            flag_yielding: true,
        }
    }
}

impl Default for StringArrayParser {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ArgumentParser<S> for StringArrayParser {
    type Output = Vec<String>;

    fn parse(
        &self,
        _ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<Vec<String>, ParseFailure> {
        let snapshot = input.branch();
        let mut tokens = Vec::new();
        loop {
            match input.peek() {
                Ok(token) if self.flag_yielding && token.starts_with('-') => break,
                Ok(_) => tokens.push(input.read_plain()?),
                Err(ParseFailure::NoInputProvided) => break,
                Err(other) => {
                    input.restore(snapshot);
                    return Err(other);
                }
            }
        }
        if tokens.is_empty() {
            input.restore(snapshot);
            return Err(ParseFailure::NoInputProvided);
        }
        Ok(tokens)
    }

    fn consumes_remainder(&self) -> bool {
        true
    }

    fn context_free(&self) -> bool {
        true
    }
}
