//! Parsing of trailing `--name`/`-x` flag regions.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use smallvec::SmallVec;

use crate::context::CommandContext;
use crate::error::{FlagFailure, ParseFailure};
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserHandle};
use crate::suggestion::Suggestion;

/// The flags matched during one invocation.
///
/// Presence flags map to `true`-ness of [`is_present`](Self::is_present);
/// valued flags keep their parsed value, shared so the context and the stored
/// component result can both see it.
#[derive(Default, Clone)]
pub struct FlagContext {
    values: Vec<(Arc<str>, FlagValue)>,
}

#[derive(Clone)]
enum FlagValue {
    Presence,
    Value(Arc<dyn Any + Send + Sync>),
}

impl FlagContext {
    /// `true` when the flag was given at all.
    #[must_use]
    pub fn is_present(&self, name: &str) -> bool {
        self.values.iter().any(|(n, _)| &**n == name)
    }

    /// The parsed value of a valued flag, if it was given with type `T`.
    #[must_use]
    pub fn value<T: 'static>(&self, name: &str) -> Option<&T> {
        self.values.iter().find_map(|(n, value)| {
            if &**n != name {
                return None;
            }
            match value {
                FlagValue::Value(value) => value.downcast_ref::<T>(),
                FlagValue::Presence => None,
            }
        })
    }

    /// Number of flags matched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when no flag matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, name: &Arc<str>, value: FlagValue) -> Result<(), FlagFailure> {
        if self.is_present(name) {
            return Err(FlagFailure::Duplicate(name.to_string()));
        }
        self.values.push((Arc::clone(name), value));
        Ok(())
    }
}

impl fmt::Debug for FlagContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.values.iter().map(|(name, _)| name))
            .finish()
    }
}

/// One declared flag: a long name, optional short letter and long aliases,
/// and an optional value parser.
pub struct FlagDef<S> {
    name: Arc<str>,
    short: Option<char>,
    aliases: SmallVec<[Arc<str>; 2]>,
    value: Option<ParserHandle<S>>,
    description: Option<Arc<str>>,
}

impl<S> FlagDef<S> {
    /// A flag whose presence alone is the information.
    pub fn presence(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            short: None,
            aliases: SmallVec::new(),
            value: None,
            description: None,
        }
    }

    /// A flag carrying a value parsed by `parser`.
    pub fn valued<P>(name: impl Into<Arc<str>>, parser: P) -> Self
    where
        P: ArgumentParser<S> + 'static,
    {
        Self {
            name: name.into(),
            short: None,
            aliases: SmallVec::new(),
            value: Some(ParserHandle::new(parser)),
            description: None,
        }
    }

    /// Adds a single-letter short form.
    #[must_use]
    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Adds a long alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<Arc<str>>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Attaches a description for host-side help output.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The flag's long name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    const fn takes_value(&self) -> bool {
        self.value.is_some()
    }

    fn matches_long(&self, name: &str) -> bool {
        &*self.name == name || self.aliases.iter().any(|alias| &**alias == name)
    }
}

/// Parses the trailing flag region of a command: zero or more
/// `--name`, `--name=value`, `--name value`, `-x`, or bundled `-xyz` lexemes.
pub struct FlagParser<S> {
    flags: Vec<FlagDef<S>>,
}

impl<S> FlagParser<S> {
    /// Creates a parser over the given flag set.
    #[must_use]
    pub fn new(flags: Vec<FlagDef<S>>) -> Self {
        Self { flags }
    }

    /// The declared flags.
    #[must_use]
    pub fn flags(&self) -> &[FlagDef<S>] {
        &self.flags
    }

    fn find_long(&self, name: &str) -> Option<&FlagDef<S>> {
        self.flags.iter().find(|flag| flag.matches_long(name))
    }

    fn find_short(&self, short: char) -> Option<&FlagDef<S>> {
        self.flags.iter().find(|flag| flag.short == Some(short))
    }
}

impl<S> FlagParser<S>
where
    S: Send + Sync + 'static,
{
    fn parse_value(
        &self,
        def: &FlagDef<S>,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<FlagValue, ParseFailure> {
        let Some(parser) = &def.value else {
            return Ok(FlagValue::Presence);
        };
        if input.is_empty() {
            return Err(FlagFailure::MissingValue(def.name.to_string()).into());
        }
        let value = parser
            .parse_erased(ctx, input)
            .now_or_never()
            .unwrap_or(Err(ParseFailure::Cancelled))?;
        Ok(FlagValue::Value(Arc::from(value)))
    }

    fn parse_region(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<FlagContext, ParseFailure> {
        let mut matched = FlagContext::default();

        while !input.is_empty() {
            let token = input.read_plain()?;

            if let Some(body) = token.strip_prefix("--") {
                let (name, inline) = match body.split_once('=') {
                    Some((name, value)) => (name, Some(value.to_string())),
                    None => (body, None),
                };
                let Some(def) = self.find_long(name) else {
                    return Err(FlagFailure::Unknown(token).into());
                };
                if def.takes_value() && inline.is_none() && input.is_empty() {
                    return Err(FlagFailure::MissingValue(def.name.to_string()).into());
                }
                let value = match inline {
                    Some(inline) if def.takes_value() => {
                        self.parse_value(def, ctx, &mut CommandInput::new(inline))?
                    }
                    Some(_) => return Err(FlagFailure::Unknown(token).into()),
                    None => self.parse_value(def, ctx, input)?,
                };
                matched.insert(&def.name, value)?;
            } else if let Some(body) = token.strip_prefix('-') {
                let mut shorts = body.chars();
                let Some(first) = shorts.next() else {
                    return Err(FlagFailure::Unknown(token).into());
                };
                if shorts.clone().next().is_none() {
                    let Some(def) = self.find_short(first) else {
                        return Err(FlagFailure::Unknown(token).into());
                    };
                    let value = self.parse_value(def, ctx, input)?;
                    matched.insert(&def.name, value)?;
                } else {
                    // Bundles like `-xyz` accept presence flags only.
                    for short in std::iter::once(first).chain(shorts) {
                        match self.find_short(short) {
                            Some(def) if !def.takes_value() => {
                                matched.insert(&def.name, FlagValue::Presence)?;
                            }
                            _ => return Err(FlagFailure::BundledNonPresence(short).into()),
                        }
                    }
                }
            } else {
                return Err(FlagFailure::Unknown(token).into());
            }
        }

        Ok(matched)
    }
}

impl<S> ArgumentParser<S> for FlagParser<S>
where
    S: Send + Sync + 'static,
{
    type Output = FlagContext;

    fn parse(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<FlagContext, ParseFailure> {
        let snapshot = input.branch();
        match self.parse_region(ctx, input) {
            Ok(matched) => {
                *ctx.flags_mut() = matched.clone();
                Ok(matched)
            }
            Err(failure) => {
                input.restore(snapshot);
                Err(failure)
            }
        }
    }

    fn suggest(&self, ctx: &mut CommandContext<S>, input: &CommandInput) -> Vec<Suggestion> {
        let mut probe = input.clone();
        let mut used: Vec<Arc<str>> = Vec::new();

        // Replay completed flag tokens so only the token under the cursor is
        // left to complete.
        while !probe.is_empty() && !probe.token_ends_input() {
            let Ok(token) = probe.read_plain() else {
                return Vec::new();
            };
            let def = token
                .strip_prefix("--")
                .and_then(|body| self.find_long(body.split('=').next().unwrap_or(body)))
                .or_else(|| {
                    token
                        .strip_prefix('-')
                        .and_then(|body| body.chars().next())
                        .and_then(|short| self.find_short(short))
                });
            if let Some(def) = def {
                used.push(Arc::clone(&def.name));
                if def.takes_value() && !token.contains('=') {
                    if probe.is_empty() || probe.token_ends_input() {
                        // The cursor is inside this flag's value.
                        return def
                            .value
                            .as_ref()
                            .map(|parser| parser.suggest(ctx, &probe))
                            .unwrap_or_default();
                    }
                    let _ = probe.read_plain();
                }
            }
        }

        let unused = |name: &Arc<str>| !used.iter().any(|u| u == name);
        self.flags
            .iter()
            .filter(|def| unused(&def.name))
            .flat_map(|def| {
                let mut entries = vec![Suggestion::new(format!("--{}", def.name))];
                if let Some(short) = def.short {
                    entries.push(Suggestion::new(format!("-{short}")));
                }
                entries
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InjectionRegistry;
    use crate::parser::string::StringParser;

    fn ctx() -> CommandContext<()> {
        CommandContext::new((), Arc::from(""), Arc::new(InjectionRegistry::new()), false)
    }

    fn parser() -> FlagParser<()> {
        FlagParser::new(vec![
            FlagDef::presence("print").with_short('p'),
            FlagDef::valued("word", StringParser::single()).with_short('w'),
        ])
    }

    #[test]
    fn short_presence_flag() {
        let mut context = ctx();
        let mut input = CommandInput::new("-p");
        let matched = parser().parse(&mut context, &mut input).expect("parse");
        assert!(matched.is_present("print"));
        assert!(matched.value::<String>("word").is_none());
        assert!(context.flags().is_present("print"));
    }

    #[test]
    fn long_flags_with_separate_value() {
        let mut input = CommandInput::new("--print --word peanut");
        let matched = parser().parse(&mut ctx(), &mut input).expect("parse");
        assert!(matched.is_present("print"));
        assert_eq!(
            matched.value::<String>("word").map(String::as_str),
            Some("peanut")
        );
    }

    #[test]
    fn inline_values_parse_like_separate_ones() {
        let mut input = CommandInput::new("--word=peanut");
        let matched = parser().parse(&mut ctx(), &mut input).expect("parse");
        assert_eq!(
            matched.value::<String>("word").map(String::as_str),
            Some("peanut")
        );
    }

    #[test]
    fn bundles_reject_anything_but_known_presence_flags() {
        let mut input = CommandInput::new("-px");
        let failure = parser().parse(&mut ctx(), &mut input).expect_err("fail");
        assert!(matches!(
            failure,
            ParseFailure::Flag(FlagFailure::BundledNonPresence('x'))
        ));

        let mut input = CommandInput::new("-pw");
        let failure = parser().parse(&mut ctx(), &mut input).expect_err("fail");
        assert!(matches!(
            failure,
            ParseFailure::Flag(FlagFailure::BundledNonPresence('w'))
        ));
    }

    #[test]
    fn duplicates_missing_values_and_unknowns_fail() {
        let mut input = CommandInput::new("-p -p");
        assert!(matches!(
            parser().parse(&mut ctx(), &mut input),
            Err(ParseFailure::Flag(FlagFailure::Duplicate(_)))
        ));

        let mut input = CommandInput::new("--word");
        assert!(matches!(
            parser().parse(&mut ctx(), &mut input),
            Err(ParseFailure::Flag(FlagFailure::MissingValue(_)))
        ));

        let mut input = CommandInput::new("--unknown");
        assert!(matches!(
            parser().parse(&mut ctx(), &mut input),
            Err(ParseFailure::Flag(FlagFailure::Unknown(_)))
        ));
    }

    #[test]
    fn failures_rewind_the_whole_region() {
        let mut input = CommandInput::new("-p --unknown");
        let before = input.branch();
        assert!(parser().parse(&mut ctx(), &mut input).is_err());
        assert_eq!(input.branch(), before);
    }

    #[test]
    fn empty_region_is_zero_flags() {
        let mut input = CommandInput::new("");
        let matched = parser().parse(&mut ctx(), &mut input).expect("parse");
        assert!(matched.is_empty());
    }

    #[test]
    fn suggests_remaining_flag_names() {
        let mut context = ctx();
        let input = CommandInput::new("-p --");
        let texts: Vec<_> = parser()
            .suggest(&mut context, &input)
            .iter()
            .map(Suggestion::text)
            .map(String::from)
            .collect();
        assert_eq!(texts, ["--word", "-w"]);
    }
}
