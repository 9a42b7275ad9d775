//! Duration parsing: `<count><unit>` sequences summed into one value.

use std::time::Duration;

use crate::context::CommandContext;
use crate::error::ParseFailure;
use crate::input::CommandInput;
use crate::parser::ArgumentParser;
use crate::suggestion::Suggestion;

/// Parses durations like `2d`, `90m`, or `1d12h30m5s`.
///
/// Units are `d`, `h`, `m`, and `s`; components are summed.
pub struct DurationParser;

const UNITS: [(char, u64); 4] = [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

impl DurationParser {
    fn parse_token(token: &str) -> Option<Duration> {
        let mut seconds: u64 = 0;
        let mut digits = String::new();
        let mut components = 0;

        for c in token.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
            } else {
                let unit = UNITS.iter().find(|(u, _)| *u == c)?;
                let count: u64 = digits.parse().ok()?;
                seconds = seconds.checked_add(count.checked_mul(unit.1)?)?;
                digits.clear();
                components += 1;
            }
        }

        // Trailing digits without a unit, or no components at all.
        if !digits.is_empty() || components == 0 {
            return None;
        }
        Some(Duration::from_secs(seconds))
    }
}

impl<S> ArgumentParser<S> for DurationParser {
    type Output = Duration;

    fn parse(
        &self,
        _ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<Duration, ParseFailure> {
        let snapshot = input.branch();
        let token = input.read_plain()?;
        Self::parse_token(&token).ok_or_else(|| {
            input.restore(snapshot);
            ParseFailure::DurationMalformed { input: token }
        })
    }

    fn suggest(&self, _ctx: &mut CommandContext<S>, input: &CommandInput) -> Vec<Suggestion> {
        // Once some digits are typed, offer each unit as a completion.
        let prefix = input.peek().unwrap_or_default();
        if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) {
            UNITS
                .iter()
                .map(|(unit, _)| Suggestion::new(format!("{prefix}{unit}")))
                .collect()
        } else {
            Vec::new()
        }
    }

    fn context_free(&self) -> bool {
        true
    }
}
