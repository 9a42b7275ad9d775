//! UUID parsing.

use uuid::Uuid;

use crate::context::CommandContext;
use crate::error::ParseFailure;
use crate::input::CommandInput;
use crate::parser::ArgumentParser;

/// Parses a hyphenated 8-4-4-4-12 UUID.
pub struct UuidParser;

impl<S> ArgumentParser<S> for UuidParser {
    type Output = Uuid;

    fn parse(
        &self,
        _ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<Uuid, ParseFailure> {
        let snapshot = input.branch();
        let token = input.read_plain()?;
        // Uuid::parse_str also takes simple/braced/urn forms; only the
        // hyphenated form is valid here.
        if token.len() == 36 {
            if let Ok(uuid) = Uuid::parse_str(&token) {
                return Ok(uuid);
            }
        }
        input.restore(snapshot);
        Err(ParseFailure::UuidMalformed { input: token })
    }

    fn context_free(&self) -> bool {
        true
    }
}
