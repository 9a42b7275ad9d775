//! Commands: an ordered component sequence plus a handler and metadata.

use std::fmt;
use std::sync::Arc;

use futures::future::{self, BoxFuture};

use crate::component::CommandComponent;
use crate::context::CommandContext;
use crate::error::RegistrationError;
use crate::parser::flag::FlagDef;
use crate::parser::{ArgumentParser, ParserRegistry};
use crate::permission::SenderRequirement;
use crate::suggestion::SuggestionProvider;
use crate::syntax::{self, SyntaxFragment};

/// The error type a handler may produce; wrapped into
/// [`DispatchError::Execution`](crate::error::DispatchError::Execution).
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The future a handler returns.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), HandlerError>>;

/// The code executed when a command's full path has been parsed.
///
/// Synchronous closures get a blanket implementation; handlers that need to
/// suspend implement the trait directly and return a real future.
pub trait CommandHandler<S>: Send + Sync {
    /// Runs the command against the parsed context.
    fn execute<'a>(&'a self, ctx: &'a mut CommandContext<S>) -> HandlerFuture<'a>;
}

impl<S, F> CommandHandler<S> for F
where
    F: Fn(&mut CommandContext<S>) -> Result<(), HandlerError> + Send + Sync,
{
    fn execute<'a>(&'a self, ctx: &'a mut CommandContext<S>) -> HandlerFuture<'a> {
        Box::pin(future::ready(self(ctx)))
    }
}

/// An immutable, registered command.
pub struct Command<S> {
    components: Vec<Arc<CommandComponent<S>>>,
    handler: Arc<dyn CommandHandler<S>>,
    permission: Option<Arc<str>>,
    sender_requirement: Option<SenderRequirement<S>>,
    description: Option<Arc<str>>,
}

impl<S> Command<S>
where
    S: Send + Sync + 'static,
{
    /// Starts a builder whose first component is the literal `name`;
    /// `name|alias` spellings declare aliases.
    #[must_use]
    pub fn builder(name: &str) -> CommandBuilder<S> {
        CommandBuilder::new(name, None)
    }
}

impl<S> Command<S> {
    /// The ordered component sequence.
    #[must_use]
    pub fn components(&self) -> &[Arc<CommandComponent<S>>] {
        &self.components
    }

    /// The root literal's primary name.
    #[must_use]
    pub fn root_name(&self) -> &Arc<str> {
        // Validation guarantees a leading literal.
        self.components[0].name()
    }

    /// The handler invoked at the leaf.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn CommandHandler<S>> {
        &self.handler
    }

    /// The permission required to run this command, if any.
    #[must_use]
    pub fn permission(&self) -> Option<&Arc<str>> {
        self.permission.as_ref()
    }

    /// The sender restriction, if any.
    #[must_use]
    pub const fn sender_requirement(&self) -> Option<&SenderRequirement<S>> {
        self.sender_requirement.as_ref()
    }

    /// The command description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The declaration-style rendering of the full component sequence.
    #[must_use]
    pub fn syntax(&self) -> String {
        syntax::format_components(self.components.iter().map(Arc::as_ref))
    }
}

impl<S> fmt::Debug for Command<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("syntax", &self.syntax())
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

/// Builds a [`Command`], validating its structure at [`build`](Self::build).
///
/// Builder methods consume and return the builder; structural problems are
/// collected and reported once, from `build`.
pub struct CommandBuilder<S> {
    components: Vec<CommandComponent<S>>,
    handler: Option<Arc<dyn CommandHandler<S>>>,
    permission: Option<Arc<str>>,
    sender_requirement: Option<SenderRequirement<S>>,
    description: Option<Arc<str>>,
    registry: Option<Arc<ParserRegistry<S>>>,
    deferred_error: Option<RegistrationError>,
}

impl<S> CommandBuilder<S>
where
    S: Send + Sync + 'static,
{
    pub(crate) fn new(name: &str, registry: Option<Arc<ParserRegistry<S>>>) -> Self {
        let mut builder = Self {
            components: Vec::new(),
            handler: None,
            permission: None,
            sender_requirement: None,
            description: None,
            registry,
            deferred_error: None,
        };
        builder = builder.literal(name);
        builder
    }

    fn defer(&mut self, error: RegistrationError) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(error);
        }
    }

    /// Appends a pre-built component.
    #[must_use]
    pub fn component(mut self, component: CommandComponent<S>) -> Self {
        self.components.push(component);
        self
    }

    /// Appends a literal; `name|alias` spellings declare aliases.
    #[must_use]
    pub fn literal(mut self, name: &str) -> Self {
        let mut spellings = name.split('|');
        let primary = spellings.next().unwrap_or_default();
        let mut component = CommandComponent::literal(primary);
        for alias in spellings {
            component = component.with_alias(alias);
        }
        self.components.push(component);
        self
    }

    /// Appends a required variable.
    #[must_use]
    pub fn required<P>(self, name: impl Into<Arc<str>>, parser: P) -> Self
    where
        P: ArgumentParser<S> + 'static,
    {
        self.component(CommandComponent::required(name, parser))
    }

    /// Appends an optional variable without a default.
    #[must_use]
    pub fn optional<P>(self, name: impl Into<Arc<str>>, parser: P) -> Self
    where
        P: ArgumentParser<S> + 'static,
    {
        self.component(CommandComponent::optional(name, parser))
    }

    /// Appends an optional variable with a default input fragment.
    #[must_use]
    pub fn optional_with_default<P>(
        self,
        name: impl Into<Arc<str>>,
        parser: P,
        default: impl Into<Arc<str>>,
    ) -> Self
    where
        P: ArgumentParser<S> + 'static,
    {
        self.component(CommandComponent::optional_with_default(name, parser, default))
    }

    /// Appends the trailing flag group.
    #[must_use]
    pub fn flags(self, flags: Vec<FlagDef<S>>) -> Self {
        self.component(CommandComponent::flags(flags))
    }

    /// Appends components from a declaration string, resolving variable
    /// parsers from the manager's named parser registry.
    ///
    /// Only available on builders obtained from a manager; `<name:parser>`
    /// picks a registry entry explicitly, `<name>` looks up `name` itself.
    #[must_use]
    pub fn syntax(mut self, declaration: &str) -> Self {
        let fragments = match syntax::parse_declaration(declaration) {
            Ok(fragments) => fragments,
            Err(error) => {
                self.defer(error);
                return self;
            }
        };

        for fragment in fragments {
            match fragment {
                SyntaxFragment::Literal { name, aliases } => {
                    let mut component = CommandComponent::literal(name);
                    for alias in aliases {
                        component = component.with_alias(alias);
                    }
                    self.components.push(component);
                }
                SyntaxFragment::Required { name, parser } => {
                    match self.resolve_parser(&name, parser.as_deref()) {
                        Ok(handle) => self
                            .components
                            .push(CommandComponent::required_with_handle(name, handle)),
                        Err(error) => self.defer(error),
                    }
                }
                SyntaxFragment::Optional { name, parser } => {
                    match self.resolve_parser(&name, parser.as_deref()) {
                        Ok(handle) => self
                            .components
                            .push(CommandComponent::optional_with_handle(name, handle)),
                        Err(error) => self.defer(error),
                    }
                }
            }
        }
        self
    }

    fn resolve_parser(
        &self,
        name: &str,
        parser: Option<&str>,
    ) -> Result<crate::parser::ParserHandle<S>, RegistrationError> {
        let Some(registry) = &self.registry else {
            return Err(RegistrationError::invalid(
                "declaration variables require a manager-bound builder",
            ));
        };
        let key = parser.unwrap_or(name);
        registry.by_name(key).ok_or_else(|| {
            RegistrationError::invalid(format!("no parser named '{key}' is registered"))
        })
    }

    /// Sets the permission required to run the command.
    #[must_use]
    pub fn permission(mut self, permission: impl Into<Arc<str>>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    /// Restricts the senders this command accepts.
    #[must_use]
    pub fn sender_requirement(mut self, requirement: SenderRequirement<S>) -> Self {
        self.sender_requirement = Some(requirement);
        self
    }

    /// Sets the command description.
    #[must_use]
    pub fn description(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Overrides suggestions on the most recently appended component.
    #[must_use]
    pub fn suggestions(mut self, provider: impl SuggestionProvider<S> + 'static) -> Self {
        if let Some(component) = self.components.pop() {
            self.components.push(component.with_suggestions(provider));
        }
        self
    }

    /// Sets the execution handler.
    #[must_use]
    pub fn handler(mut self, handler: impl CommandHandler<S> + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Validates the structure and produces the command.
    pub fn build(self) -> Result<Command<S>, RegistrationError> {
        if let Some(error) = self.deferred_error {
            return Err(error);
        }
        let Some(handler) = self.handler else {
            return Err(RegistrationError::invalid("command has no handler"));
        };
        validate(&self.components)?;

        Ok(Command {
            components: self.components.into_iter().map(Arc::new).collect(),
            handler,
            permission: self.permission,
            sender_requirement: self.sender_requirement,
            description: self.description,
        })
    }
}

/// Structural validation: leading literal, required-before-optional, one
/// trailing flag group, greedy parsers last among non-flag components.
fn validate<S>(components: &[CommandComponent<S>]) -> Result<(), RegistrationError> {
    let Some(first) = components.first() else {
        return Err(RegistrationError::invalid("command has no components"));
    };
    if !first.is_literal() {
        return Err(RegistrationError::invalid(
            "the first component must be a literal",
        ));
    }

    let mut seen_optional = false;
    let mut seen_flag = false;
    let mut seen_greedy = false;
    for component in components {
        if component.name().is_empty() {
            return Err(RegistrationError::invalid("component names must be non-empty"));
        }
        if seen_flag {
            return Err(RegistrationError::invalid(
                "the flag group must be the last component",
            ));
        }
        if component.is_flag() {
            seen_flag = true;
            continue;
        }
        if seen_greedy {
            return Err(RegistrationError::invalid(format!(
                "component '{}' follows a greedy component",
                component.name()
            )));
        }
        if component.parser().consumes_remainder() {
            seen_greedy = true;
        }
        if component.is_optional() {
            seen_optional = true;
        } else if seen_optional {
            return Err(RegistrationError::invalid(format!(
                "required component '{}' follows an optional component",
                component.name()
            )));
        }
    }
    Ok(())
}
