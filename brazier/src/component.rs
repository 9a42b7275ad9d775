//! Command components: one step of a command's shape.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::context::CommandContext;
use crate::error::ParseFailure;
use crate::input::CommandInput;
use crate::key::ValueType;
use crate::parser::flag::{FlagDef, FlagParser};
use crate::parser::{ArgumentParser, ParserHandle};
use crate::suggestion::{Suggestion, SuggestionProvider};

/// What role a component plays in its command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    /// A fixed word; aliases beyond the primary name live here.
    Literal {
        /// Accepted spellings besides the component name.
        aliases: SmallVec<[Arc<str>; 2]>,
    },
    /// A variable the input must provide.
    Required,
    /// A variable the input may omit.
    Optional {
        /// Input fragment parsed through the component's own parser when the
        /// variable is omitted.
        default: Option<Arc<str>>,
    },
    /// A trailing flag group.
    Flag {
        /// Long names of the flags in the group, for usage rendering.
        names: Vec<Arc<str>>,
    },
}

/// A hook run against the raw input just before a component's parser.
pub trait ComponentPreprocessor<S>: Send + Sync {
    /// May mutate the context or reject the input before parsing starts.
    fn preprocess(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<(), ParseFailure>;
}

impl<S, F> ComponentPreprocessor<S> for F
where
    F: Fn(&mut CommandContext<S>, &mut CommandInput) -> Result<(), ParseFailure> + Send + Sync,
{
    fn preprocess(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<(), ParseFailure> {
        self(ctx, input)
    }
}

/// One step in a command: a literal, a required or optional variable, or a
/// flag group, together with the parser that consumes it.
pub struct CommandComponent<S> {
    name: Arc<str>,
    parser: ParserHandle<S>,
    kind: ComponentKind,
    suggestions: Option<Arc<dyn SuggestionProvider<S>>>,
    preprocessors: Vec<Arc<dyn ComponentPreprocessor<S>>>,
    description: Option<Arc<str>>,
}

impl<S> CommandComponent<S>
where
    S: Send + Sync + 'static,
{
    /// A literal component matching its own name.
    pub fn literal(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        Self {
            parser: ParserHandle::new(LiteralParser {
                name: Arc::clone(&name),
                aliases: SmallVec::new(),
            }),
            name,
            kind: ComponentKind::Literal {
                aliases: SmallVec::new(),
            },
            suggestions: None,
            preprocessors: Vec::new(),
            description: None,
        }
    }

    /// A required variable parsed by `parser`.
    pub fn required<P>(name: impl Into<Arc<str>>, parser: P) -> Self
    where
        P: ArgumentParser<S> + 'static,
    {
        Self {
            name: name.into(),
            parser: ParserHandle::new(parser),
            kind: ComponentKind::Required,
            suggestions: None,
            preprocessors: Vec::new(),
            description: None,
        }
    }

    /// An optional variable parsed by `parser`, absent when omitted.
    pub fn optional<P>(name: impl Into<Arc<str>>, parser: P) -> Self
    where
        P: ArgumentParser<S> + 'static,
    {
        Self {
            name: name.into(),
            parser: ParserHandle::new(parser),
            kind: ComponentKind::Optional { default: None },
            suggestions: None,
            preprocessors: Vec::new(),
            description: None,
        }
    }

    /// An optional variable that falls back to parsing `default` when the
    /// input is exhausted.
    pub fn optional_with_default<P>(
        name: impl Into<Arc<str>>,
        parser: P,
        default: impl Into<Arc<str>>,
    ) -> Self
    where
        P: ArgumentParser<S> + 'static,
    {
        Self {
            name: name.into(),
            parser: ParserHandle::new(parser),
            kind: ComponentKind::Optional {
                default: Some(default.into()),
            },
            suggestions: None,
            preprocessors: Vec::new(),
            description: None,
        }
    }

    /// A trailing flag group.
    pub fn flags(flags: Vec<FlagDef<S>>) -> Self {
        let names = flags.iter().map(|flag| Arc::from(flag.name())).collect();
        Self {
            name: Arc::from("flags"),
            parser: ParserHandle::new(FlagParser::new(flags)),
            kind: ComponentKind::Flag { names },
            suggestions: None,
            preprocessors: Vec::new(),
            description: None,
        }
    }

    /// A required variable backed by an already-erased parser handle, as
    /// resolved from a named parser registry.
    pub fn required_with_handle(name: impl Into<Arc<str>>, parser: ParserHandle<S>) -> Self {
        Self {
            name: name.into(),
            parser,
            kind: ComponentKind::Required,
            suggestions: None,
            preprocessors: Vec::new(),
            description: None,
        }
    }

    /// An optional variable backed by an already-erased parser handle.
    pub fn optional_with_handle(name: impl Into<Arc<str>>, parser: ParserHandle<S>) -> Self {
        Self {
            name: name.into(),
            parser,
            kind: ComponentKind::Optional { default: None },
            suggestions: None,
            preprocessors: Vec::new(),
            description: None,
        }
    }

    /// Adds an alias to a literal component; ignored for variables.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<Arc<str>>) -> Self {
        if let ComponentKind::Literal { aliases } = &mut self.kind {
            aliases.push(alias.into());
            self.parser = ParserHandle::new(LiteralParser {
                name: Arc::clone(&self.name),
                aliases: aliases.clone(),
            });
        }
        self
    }

    /// Overrides the parser's own suggestions.
    #[must_use]
    pub fn with_suggestions(mut self, provider: impl SuggestionProvider<S> + 'static) -> Self {
        self.suggestions = Some(Arc::new(provider));
        self
    }

    /// Appends a preprocessor.
    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: impl ComponentPreprocessor<S> + 'static) -> Self {
        self.preprocessors.push(Arc::new(preprocessor));
        self
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<S> CommandComponent<S> {
    /// The component's name; for literals, the primary spelling.
    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// The component's role.
    #[must_use]
    pub const fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// The parser handle consuming this component.
    #[must_use]
    pub const fn parser(&self) -> &ParserHandle<S> {
        &self.parser
    }

    /// The type token of the parsed value.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.parser.output()
    }

    /// `true` for literals and required variables.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        matches!(
            self.kind,
            ComponentKind::Literal { .. } | ComponentKind::Required
        )
    }

    /// `true` for literal components.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self.kind, ComponentKind::Literal { .. })
    }

    /// `true` for optional variables.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        matches!(self.kind, ComponentKind::Optional { .. })
    }

    /// `true` for flag groups.
    #[must_use]
    pub const fn is_flag(&self) -> bool {
        matches!(self.kind, ComponentKind::Flag { .. })
    }

    /// The default input fragment of an optional variable, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<&Arc<str>> {
        match &self.kind {
            ComponentKind::Optional { default } => default.as_ref(),
            _ => None,
        }
    }

    /// Every accepted spelling: the name plus, for literals, all aliases.
    pub fn alias_set(&self) -> impl Iterator<Item = &Arc<str>> {
        let aliases: &[Arc<str>] = match &self.kind {
            ComponentKind::Literal { aliases } => aliases,
            _ => &[],
        };
        std::iter::once(&self.name).chain(aliases.iter())
    }

    /// The description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The suggestion provider override, if any.
    #[must_use]
    pub(crate) fn suggestion_override(&self) -> Option<&Arc<dyn SuggestionProvider<S>>> {
        self.suggestions.as_ref()
    }

    pub(crate) fn preprocessors(&self) -> &[Arc<dyn ComponentPreprocessor<S>>] {
        &self.preprocessors
    }

    /// Structural equality used by tree insertion to merge shared prefixes:
    /// same name, same value type, and for literals the same alias set.
    pub(crate) fn merges_with(&self, other: &Self) -> bool {
        if self.name != other.name || self.value_type() != other.value_type() {
            return false;
        }
        match (&self.kind, &other.kind) {
            (ComponentKind::Literal { aliases: a }, ComponentKind::Literal { aliases: b }) => {
                a == b
            }
            (
                ComponentKind::Optional { default: a },
                ComponentKind::Optional { default: b },
            ) => a == b,
            (ComponentKind::Flag { names: a }, ComponentKind::Flag { names: b }) => a == b,
            (ComponentKind::Required, ComponentKind::Required) => true,
            _ => false,
        }
    }
}

impl<S> fmt::Debug for CommandComponent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandComponent")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value_type", &self.value_type())
            .finish_non_exhaustive()
    }
}

/// Matches one fixed word (or any of its aliases) and yields the primary name.
struct LiteralParser {
    name: Arc<str>,
    aliases: SmallVec<[Arc<str>; 2]>,
}

impl LiteralParser {
    fn matches(&self, token: &str) -> bool {
        &*self.name == token || self.aliases.iter().any(|alias| &**alias == token)
    }
}

impl<S> ArgumentParser<S> for LiteralParser {
    type Output = String;

    fn parse(
        &self,
        _ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<String, ParseFailure> {
        let snapshot = input.branch();
        let token = input.read_plain()?;
        if self.matches(&token) {
            Ok(self.name.to_string())
        } else {
            input.restore(snapshot);
            Err(ParseFailure::UnknownLiteral {
                input: token,
                allowed: std::iter::once(&self.name)
                    .chain(self.aliases.iter())
                    .map(|s| s.to_string())
                    .collect(),
            })
        }
    }

    fn suggest(&self, _ctx: &mut CommandContext<S>, _input: &CommandInput) -> Vec<Suggestion> {
        // Aliases are accepted but never advertised.
        vec![Suggestion::new(self.name.to_string())]
    }

    fn context_free(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InjectionRegistry;
    use crate::parser::numeric::NumberParser;
    use futures::FutureExt;

    fn ctx() -> CommandContext<()> {
        CommandContext::new((), Arc::from(""), Arc::new(InjectionRegistry::new()), false)
    }

    #[test]
    fn literal_matches_name_and_aliases() {
        let component = CommandComponent::<()>::literal("test").with_alias("t");
        let mut context = ctx();
        let mut input = CommandInput::new("t rest");
        let value = component
            .parser()
            .parse_erased(&mut context, &mut input)
            .now_or_never()
            .expect("literal parsers are synchronous")
            .expect("parse");
        assert_eq!(value.downcast_ref::<String>(), Some(&"test".to_string()));
    }

    #[test]
    fn literal_rejection_lists_spellings() {
        let parser = LiteralParser {
            name: Arc::from("test"),
            aliases: SmallVec::from_vec(vec![Arc::from("t")]),
        };
        let mut input = CommandInput::new("kenny");
        let failure = ArgumentParser::<()>::parse(&parser, &mut ctx(), &mut input)
            .expect_err("must fail");
        assert_eq!(
            failure,
            ParseFailure::UnknownLiteral {
                input: "kenny".into(),
                allowed: vec!["test".into(), "t".into()],
            }
        );
    }

    #[test]
    fn merge_compares_name_type_and_aliases() {
        let a = CommandComponent::<()>::literal("sub").with_alias("s");
        let b = CommandComponent::<()>::literal("sub").with_alias("s");
        let c = CommandComponent::<()>::literal("sub");
        assert!(a.merges_with(&b));
        assert!(!a.merges_with(&c));

        let x = CommandComponent::<()>::required("n", NumberParser::<i32>::new());
        let y = CommandComponent::<()>::required("n", NumberParser::<i64>::new());
        assert!(!x.merges_with(&y));
    }

    #[test]
    fn required_and_optional_report_their_roles() {
        let required = CommandComponent::<()>::required("n", NumberParser::<i32>::new());
        assert!(required.is_required() && !required.is_optional());

        let optional = CommandComponent::<()>::optional_with_default(
            "s",
            crate::parser::string::StringParser::single(),
            "potato",
        );
        assert!(optional.is_optional() && !optional.is_required());
        assert_eq!(optional.default_value().map(|d| &**d), Some("potato"));
    }
}
