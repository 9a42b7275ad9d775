//! The command manager: the façade owning every registry and the lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use arc_swap::ArcSwap;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::runtime::Handle;

use crate::command::{Command, CommandBuilder};
use crate::context::{CommandContext, InjectionRegistry};
use crate::error::{DispatchError, ExceptionKind, RegistrationError};
use crate::exception::{ExceptionController, ExceptionHandler};
use crate::execution::{
    AsyncCoordinator, DispatchPipeline, ExecutionCoordinator, ExecutionResult, Postprocessor,
    Preprocessor, SimpleCoordinator,
};
use crate::input::CommandInput;
use crate::parser::boolean::BoolParser;
use crate::parser::duration::DurationParser;
use crate::parser::numeric::NumberParser;
use crate::parser::string::{CharParser, StringArrayParser, StringParser};
use crate::parser::uuid::UuidParser;
use crate::parser::{ArgumentParser, ParserRegistry};
use crate::permission::{AllowAll, PermissionChecker};
use crate::suggestion::{Suggestion, SuggestionProvider};
use crate::tree::{CommandTree, WalkResources};

/// Which coordinator the manager builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorKind {
    /// Parse and execute inline on the calling task.
    #[default]
    Simple,
    /// Parse and/or execute on a tokio runtime.
    Async,
}

/// Which string mode an unannotated string argument gets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringModeDefault {
    /// One plain token.
    #[default]
    Single,
    /// One token honoring quotes.
    Quoted,
}

/// Tunable manager behavior; deserializable so hosts can load it from their
/// configuration files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Coordinator selection.
    pub coordinator: CoordinatorKind,
    /// Run preprocessors and the parse walk on a worker runtime.
    pub async_parse: bool,
    /// Run handlers on a worker runtime.
    pub async_execute: bool,
    /// Mode of the default-registered string parser.
    pub string_mode_default: StringModeDefault,
    /// Accept `yes`/`no`/`on`/`off`/`1`/`0` as booleans.
    pub boolean_liberal: bool,
    /// Filter suggestions case-insensitively.
    pub suggestion_case_insensitive: bool,
    /// Cap on returned suggestions.
    pub suggestion_limit: Option<usize>,
    /// Fail when input remains after a complete command.
    pub fail_on_extraneous_input: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorKind::Simple,
            async_parse: false,
            async_execute: false,
            string_mode_default: StringModeDefault::Single,
            boolean_liberal: false,
            suggestion_case_insensitive: false,
            suggestion_limit: None,
            fail_on_extraneous_input: true,
        }
    }
}

/// The manager's registration lifecycle; the transition is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Commands, parsers, and processors may still be registered.
    Registering,
    /// All registries are frozen; only `execute` and `suggest` remain.
    Locked,
}

const STATE_REGISTERING: u8 = 0;
const STATE_LOCKED: u8 = 1;

/// The façade owning the tree, the registries, and the coordinator.
pub struct CommandManager<S> {
    tree: ArcSwap<CommandTree<S>>,
    state: AtomicU8,
    registration: Mutex<()>,
    parsers: Arc<ParserRegistry<S>>,
    suggestion_providers: scc::HashMap<String, Arc<dyn SuggestionProvider<S>>>,
    injectors: Arc<InjectionRegistry<S>>,
    preprocessors: RwLock<Vec<Arc<dyn Preprocessor<S>>>>,
    postprocessors: RwLock<Vec<Arc<dyn Postprocessor<S>>>>,
    exceptions: Arc<ExceptionController<S>>,
    coordinator: Box<dyn ExecutionCoordinator<S>>,
    checker: Arc<dyn PermissionChecker<S>>,
    settings: ManagerSettings,
}

impl<S> CommandManager<S>
where
    S: Send + Sync + 'static,
{
    /// A manager with the coordinator described by `settings` and a
    /// permission checker that allows everything.
    #[must_use]
    pub fn new(settings: ManagerSettings) -> Self {
        let coordinator = build_coordinator(&settings);
        Self::with_coordinator(settings, coordinator)
    }

    /// A manager driving invocations through the given coordinator.
    #[must_use]
    pub fn with_coordinator(
        settings: ManagerSettings,
        coordinator: Box<dyn ExecutionCoordinator<S>>,
    ) -> Self {
        let manager = Self {
            tree: ArcSwap::from_pointee(CommandTree::new()),
            state: AtomicU8::new(STATE_REGISTERING),
            registration: Mutex::new(()),
            parsers: Arc::new(ParserRegistry::new()),
            suggestion_providers: scc::HashMap::new(),
            injectors: Arc::new(InjectionRegistry::new()),
            preprocessors: RwLock::new(Vec::new()),
            postprocessors: RwLock::new(Vec::new()),
            exceptions: Arc::new(ExceptionController::new()),
            coordinator,
            checker: Arc::new(AllowAll),
            settings,
        };
        manager.register_standard_parsers();
        manager
    }

    /// Replaces the permission checker.
    #[must_use]
    pub fn with_permission_checker(
        mut self,
        checker: impl PermissionChecker<S> + 'static,
    ) -> Self {
        self.checker = Arc::new(checker);
        self
    }

    /// The settings this manager was built with.
    #[must_use]
    pub const fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RegistrationState {
        if self.state.load(Ordering::Acquire) == STATE_LOCKED {
            RegistrationState::Locked
        } else {
            RegistrationState::Registering
        }
    }

    /// Freezes every registry; irreversible.
    pub fn lock_registration(&self) {
        self.state.store(STATE_LOCKED, Ordering::Release);
        log::debug!("command registration locked");
    }

    fn require_registering(&self) -> Result<(), RegistrationError> {
        match self.state() {
            RegistrationState::Registering => Ok(()),
            RegistrationState::Locked => Err(RegistrationError::RegistrationLocked),
        }
    }

    /// A command builder bound to this manager's named parser registry.
    #[must_use]
    pub fn command_builder(&self, name: &str) -> CommandBuilder<S> {
        CommandBuilder::new(name, Some(Arc::clone(&self.parsers)))
    }

    /// Inserts a command into the tree.
    pub fn register(&self, command: Command<S>) -> Result<(), RegistrationError> {
        self.require_registering()?;
        let _guard = self.registration.lock();
        let current = self.tree.load_full();
        let next = current.inserting(Arc::new(command))?;
        self.tree.store(Arc::new(next));
        Ok(())
    }

    /// Removes a top-level literal and everything beneath it.
    pub fn unregister(&self, root_literal: &str) -> Result<bool, RegistrationError> {
        self.require_registering()?;
        let _guard = self.registration.lock();
        let current = self.tree.load_full();
        match current.removing(root_literal) {
            Some(next) => {
                self.tree.store(Arc::new(next));
                log::debug!("unregistered command root '{root_literal}'");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Registers `parser` as the default for its output type.
    pub fn register_parser<P>(&self, parser: P) -> Result<(), RegistrationError>
    where
        P: ArgumentParser<S> + 'static,
    {
        self.require_registering()?;
        self.parsers.register(parser);
        Ok(())
    }

    /// Registers `parser` under a name for declaration lookups.
    pub fn register_named_parser<P>(
        &self,
        name: impl Into<String>,
        parser: P,
    ) -> Result<(), RegistrationError>
    where
        P: ArgumentParser<S> + 'static,
    {
        self.require_registering()?;
        self.parsers.register_named(name, parser);
        Ok(())
    }

    /// The parser registries (type-keyed and named).
    #[must_use]
    pub fn parsers(&self) -> &Arc<ParserRegistry<S>> {
        &self.parsers
    }

    /// Registers a reusable suggestion provider under a name.
    pub fn register_suggestion_provider(
        &self,
        name: impl Into<String>,
        provider: impl SuggestionProvider<S> + 'static,
    ) -> Result<(), RegistrationError> {
        self.require_registering()?;
        let name = name.into();
        let _ = self.suggestion_providers.remove_sync(&name);
        let _ = self
            .suggestion_providers
            .insert_sync(name, Arc::new(provider));
        Ok(())
    }

    /// The provider registered under `name`, if any.
    #[must_use]
    pub fn suggestion_provider(&self, name: &str) -> Option<Arc<dyn SuggestionProvider<S>>> {
        self.suggestion_providers
            .read_sync(name, |_, provider| Arc::clone(provider))
    }

    /// Registers an injector producing `T` for [`CommandContext::inject`].
    pub fn register_injector<T>(
        &self,
        create: impl Fn(&CommandContext<S>) -> Option<T> + Send + Sync + 'static,
    ) -> Result<(), RegistrationError>
    where
        T: Send + Sync + 'static,
    {
        self.require_registering()?;
        self.injectors.register(create);
        Ok(())
    }

    /// Appends an invocation preprocessor.
    pub fn register_preprocessor(
        &self,
        preprocessor: impl Preprocessor<S> + 'static,
    ) -> Result<(), RegistrationError> {
        self.require_registering()?;
        self.preprocessors.write().push(Arc::new(preprocessor));
        Ok(())
    }

    /// Appends an invocation postprocessor.
    pub fn register_postprocessor(
        &self,
        postprocessor: impl Postprocessor<S> + 'static,
    ) -> Result<(), RegistrationError> {
        self.require_registering()?;
        self.postprocessors.write().push(Arc::new(postprocessor));
        Ok(())
    }

    /// Registers an exception handler for `kind`.
    pub fn register_exception_handler(
        &self,
        kind: ExceptionKind,
        handler: impl ExceptionHandler<S> + 'static,
    ) -> Result<(), RegistrationError> {
        self.require_registering()?;
        self.exceptions.register(kind, handler);
        Ok(())
    }

    /// Every registered command.
    #[must_use]
    pub fn commands(&self) -> Vec<Arc<Command<S>>> {
        self.tree.load().commands()
    }

    /// The primary names of all top-level literals.
    #[must_use]
    pub fn root_literals(&self) -> Vec<Arc<str>> {
        self.tree.load().root_literals()
    }

    /// Parses `input` on behalf of `sender` and executes the matched
    /// command through the coordinator.
    pub fn execute(
        &self,
        sender: S,
        input: impl Into<Arc<str>>,
    ) -> BoxFuture<'static, Result<ExecutionResult<S>, DispatchError>> {
        let raw: Arc<str> = input.into();
        let ctx = CommandContext::new(
            sender,
            Arc::clone(&raw),
            Arc::clone(&self.injectors),
            false,
        );
        let pipeline = Arc::new(DispatchPipeline::new(
            self.tree.load_full(),
            self.preprocessors.read().clone(),
            self.postprocessors.read().clone(),
            Arc::clone(&self.checker),
            Arc::clone(&self.exceptions),
            self.settings.fail_on_extraneous_input,
        ));
        self.coordinator
            .coordinate(pipeline, ctx, CommandInput::new(raw))
    }

    /// Completions for the cursor position at the end of `input`.
    pub fn suggest(
        &self,
        sender: S,
        input: impl Into<Arc<str>>,
    ) -> BoxFuture<'static, Vec<Suggestion>> {
        let raw: Arc<str> = input.into();
        let tree = self.tree.load_full();
        let checker = Arc::clone(&self.checker);
        let injectors = Arc::clone(&self.injectors);
        let settings = self.settings.clone();

        Box::pin(async move {
            let mut ctx = CommandContext::new(sender, Arc::clone(&raw), injectors, true);
            let mut walk_input = CommandInput::new(Arc::clone(&raw));
            let resources = WalkResources {
                checker: &*checker,
                fail_on_extraneous_input: settings.fail_on_extraneous_input,
            };
            let collected = tree
                .suggestions(&mut ctx, &mut walk_input, &resources)
                .await;
            finish_suggestions(collected, &last_token(&raw), &settings)
        })
    }

    /// Installs the built-in parser set, honoring the string and boolean
    /// settings, under both type keys and conventional names.
    fn register_standard_parsers(&self) {
        let parsers = &self.parsers;
        parsers.register(NumberParser::<i8>::new());
        parsers.register(NumberParser::<i16>::new());
        parsers.register(NumberParser::<i32>::new());
        parsers.register(NumberParser::<i64>::new());
        parsers.register(NumberParser::<u8>::new());
        parsers.register(NumberParser::<u16>::new());
        parsers.register(NumberParser::<u32>::new());
        parsers.register(NumberParser::<u64>::new());
        parsers.register(NumberParser::<f32>::new());
        parsers.register(NumberParser::<f64>::new());
        parsers.register(CharParser);
        parsers.register(UuidParser);
        parsers.register(DurationParser);
        parsers.register(StringArrayParser::new());

        let boolean = || {
            if self.settings.boolean_liberal {
                BoolParser::liberal()
            } else {
                BoolParser::strict()
            }
        };
        parsers.register(boolean());

        let string = || match self.settings.string_mode_default {
            StringModeDefault::Single => StringParser::single(),
            StringModeDefault::Quoted => StringParser::quoted(),
        };
        parsers.register(string());

        parsers.register_named("byte", NumberParser::<i8>::new());
        parsers.register_named("short", NumberParser::<i16>::new());
        parsers.register_named("integer", NumberParser::<i32>::new());
        parsers.register_named("long", NumberParser::<i64>::new());
        parsers.register_named("float", NumberParser::<f32>::new());
        parsers.register_named("double", NumberParser::<f64>::new());
        parsers.register_named("boolean", boolean());
        parsers.register_named("string", string());
        parsers.register_named("quoted_string", StringParser::quoted());
        parsers.register_named("greedy_string", StringParser::greedy());
        parsers.register_named("char", CharParser);
        parsers.register_named("uuid", UuidParser);
        parsers.register_named("duration", DurationParser);
        parsers.register_named("string_array", StringArrayParser::new());
    }
}

fn build_coordinator<S>(settings: &ManagerSettings) -> Box<dyn ExecutionCoordinator<S>>
where
    S: Send + Sync + 'static,
{
    match settings.coordinator {
        CoordinatorKind::Simple => Box::new(SimpleCoordinator),
        CoordinatorKind::Async => match Handle::try_current() {
            Ok(handle) => {
                let mut coordinator = if settings.async_parse {
                    AsyncCoordinator::on(handle.clone())
                } else {
                    AsyncCoordinator::inline()
                };
                if settings.async_execute {
                    coordinator = coordinator.with_execute_handle(handle);
                }
                Box::new(coordinator)
            }
            Err(_) => {
                log::warn!(
                    "async coordinator requested outside a tokio runtime; using the simple coordinator"
                );
                Box::new(SimpleCoordinator)
            }
        },
    }
}

/// The partial token under the cursor: empty when the input ends in
/// whitespace, otherwise the trailing token.
fn last_token(raw: &str) -> String {
    if raw.is_empty() || raw.ends_with(char::is_whitespace) {
        return String::new();
    }
    raw.split_whitespace().last().unwrap_or_default().to_string()
}

/// Prefix-filters, orders, dedups, and truncates collected suggestions.
fn finish_suggestions(
    mut suggestions: Vec<Suggestion>,
    prefix: &str,
    settings: &ManagerSettings,
) -> Vec<Suggestion> {
    if settings.suggestion_case_insensitive {
        let prefix = prefix.to_lowercase();
        suggestions.retain(|s| s.text().to_lowercase().starts_with(&prefix));
    } else {
        suggestions.retain(|s| s.text().starts_with(prefix));
    }
    suggestions.sort();
    suggestions.dedup();
    if let Some(limit) = settings.suggestion_limit {
        suggestions.truncate(limit);
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::HandlerError;
    use crate::error::{FlagFailure, ParseFailure};
    use crate::key::ContextKey;
    use crate::parser::either::EitherParser;
    use crate::parser::flag::{FlagContext, FlagDef};
    use crate::suggestion::StaticSuggestions;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    type Sender = &'static str;

    fn manager() -> CommandManager<Sender> {
        CommandManager::new(ManagerSettings::default())
    }

    fn noop(_: &mut CommandContext<Sender>) -> Result<(), HandlerError> {
        Ok(())
    }

    fn int_key() -> ContextKey<i64> {
        ContextKey::new("int")
    }

    fn string_key() -> ContextKey<String> {
        ContextKey::new("string")
    }

    fn register_scenario_command(
        manager: &CommandManager<Sender>,
        seen: &Arc<Mutex<Option<(i64, String)>>>,
    ) {
        let seen = Arc::clone(seen);
        let command = Command::builder("test|t")
            .literal("literal")
            .required("int", NumberParser::<i64>::range(1, 100))
            .optional_with_default("string", StringParser::single(), "potato")
            .handler(move |ctx: &mut CommandContext<Sender>| -> Result<(), HandlerError> {
                let int = *ctx.get(&int_key());
                let string = ctx.get(&string_key()).clone();
                *seen.lock() = Some((int, string));
                Ok(())
            })
            .build()
            .expect("build");
        manager.register(command).expect("register");
    }

    #[tokio::test]
    async fn executes_with_defaults_and_aliases() {
        let manager = manager();
        let seen = Arc::new(Mutex::new(None));
        register_scenario_command(&manager, &seen);
        manager.lock_registration();

        manager
            .execute("console", "test literal 10")
            .await
            .expect("execute");
        assert_eq!(*seen.lock(), Some((10, "potato".to_string())));

        manager
            .execute("console", "t literal 10 o")
            .await
            .expect("execute");
        assert_eq!(*seen.lock(), Some((10, "o".to_string())));
    }

    #[tokio::test]
    async fn out_of_range_arguments_fail_with_bounds() {
        let manager = manager();
        let seen = Arc::new(Mutex::new(None));
        register_scenario_command(&manager, &seen);

        let error = manager
            .execute("console", "test literal 101")
            .await
            .expect_err("must fail");
        let DispatchError::ArgumentParse { failure, .. } = error else {
            panic!("expected argument failure, got {error:?}");
        };
        assert_eq!(
            failure,
            ParseFailure::NumberOutOfRange {
                input: "101".into(),
                min: "1".into(),
                max: "100".into(),
            }
        );
        assert_eq!(*seen.lock(), None);
    }

    fn register_flag_command(
        manager: &CommandManager<Sender>,
        seen: &Arc<Mutex<Option<FlagContext>>>,
    ) {
        let seen = Arc::clone(seen);
        let command = Command::builder("flagcommand")
            .flags(vec![
                FlagDef::presence("print").with_short('p'),
                FlagDef::valued("word", StringParser::single()).with_short('w'),
            ])
            .handler(move |ctx: &mut CommandContext<Sender>| -> Result<(), HandlerError> {
                *seen.lock() = Some(ctx.flags().clone());
                Ok(())
            })
            .build()
            .expect("build");
        manager.register(command).expect("register");
    }

    #[tokio::test]
    async fn flags_parse_in_all_their_forms() {
        let manager = manager();
        let seen = Arc::new(Mutex::new(None));
        register_flag_command(&manager, &seen);

        manager
            .execute("console", "flagcommand -p")
            .await
            .expect("execute");
        let flags = seen.lock().take().expect("handler ran");
        assert!(flags.is_present("print"));
        assert!(flags.value::<String>("word").is_none());

        manager
            .execute("console", "flagcommand --print --word peanut")
            .await
            .expect("execute");
        let flags = seen.lock().take().expect("handler ran");
        assert!(flags.is_present("print"));
        assert_eq!(
            flags.value::<String>("word").map(String::as_str),
            Some("peanut")
        );

        let error = manager
            .execute("console", "flagcommand -px")
            .await
            .expect_err("bundle must fail");
        assert!(matches!(
            error,
            DispatchError::ArgumentParse {
                failure: ParseFailure::Flag(FlagFailure::BundledNonPresence('x')),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn suggestions_filter_on_the_partial_token() {
        let manager = manager();
        let command = Command::builder("test")
            .literal("var")
            .component(
                crate::component::CommandComponent::required("str", StringParser::single())
                    .with_suggestions(StaticSuggestions::new(["one", "two"])),
            )
            .handler(noop)
            .build()
            .expect("build");
        manager.register(command).expect("register");

        let texts = |suggestions: Vec<Suggestion>| {
            suggestions
                .iter()
                .map(|s| s.text().to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(
            texts(manager.suggest("console", "test var on").await),
            ["one"]
        );
        assert_eq!(
            texts(manager.suggest("console", "test var ").await),
            ["one", "two"]
        );
        assert!(manager.suggest("console", "kenny").await.is_empty());
        assert_eq!(texts(manager.suggest("console", "te").await), ["test"]);
    }

    #[tokio::test]
    async fn either_suggestions_concatenate_both_sides() {
        let manager = manager();
        let command = Command::builder("choice")
            .required(
                "value",
                EitherParser::new(NumberParser::<i32>::range(1, 3), BoolParser::strict()),
            )
            .handler(noop)
            .build()
            .expect("build");
        manager.register(command).expect("register");

        let mut texts: Vec<String> = manager
            .suggest("console", "choice ")
            .await
            .iter()
            .map(|s| s.text().to_string())
            .collect();
        texts.sort();
        assert_eq!(texts, ["1", "2", "3", "false", "true"]);
    }

    #[tokio::test]
    async fn suggestion_limit_and_case_folding_apply() {
        let settings = ManagerSettings {
            suggestion_case_insensitive: true,
            suggestion_limit: Some(1),
            ..ManagerSettings::default()
        };
        let manager = CommandManager::<Sender>::new(settings);
        let command = manager
            .command_builder("greet")
            .component(
                crate::component::CommandComponent::required("who", StringParser::single())
                    .with_suggestions(StaticSuggestions::new(["World", "Wanda"])),
            )
            .handler(noop)
            .build()
            .expect("build");
        manager.register(command).expect("register");

        let suggestions = manager.suggest("console", "greet w").await;
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].text(), "Wanda");
    }

    #[tokio::test]
    async fn locking_freezes_every_registry() {
        let manager = manager();
        let seen = Arc::new(Mutex::new(None));
        register_scenario_command(&manager, &seen);
        manager.lock_registration();
        assert_eq!(manager.state(), RegistrationState::Locked);

        let rejected = Command::builder("late")
            .handler(noop)
            .build()
            .expect("build");
        assert!(matches!(
            manager.register(rejected),
            Err(RegistrationError::RegistrationLocked)
        ));
        assert!(matches!(
            manager.register_parser(CharParser),
            Err(RegistrationError::RegistrationLocked)
        ));
        assert!(matches!(
            manager.register_injector(|_| Some(0_u8)),
            Err(RegistrationError::RegistrationLocked)
        ));

        // Execution still works after the transition.
        manager
            .execute("console", "test literal 10")
            .await
            .expect("execute");
    }

    #[tokio::test]
    async fn ambiguous_registration_leaves_the_tree_usable() {
        let manager = manager();
        let first = Command::builder("a")
            .required("x", NumberParser::<i64>::new())
            .handler(noop)
            .build()
            .expect("build");
        manager.register(first).expect("register");

        let second = Command::builder("a")
            .required("y", StringParser::single())
            .handler(noop)
            .build()
            .expect("build");
        assert!(matches!(
            manager.register(second),
            Err(RegistrationError::AmbiguousNode { .. })
        ));

        manager.execute("console", "a 5").await.expect("execute");
        assert_eq!(manager.commands().len(), 1);
    }

    #[tokio::test]
    async fn declaration_syntax_resolves_named_parsers() {
        let manager = manager();
        let seen = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let command = manager
            .command_builder("repeat")
            .syntax("<count:integer> [suffix:string]")
            .handler(move |ctx: &mut CommandContext<Sender>| -> Result<(), HandlerError> {
                let count = *ctx.get(&ContextKey::<i32>::new("count"));
                let suffix = ctx.optional(&ContextKey::<String>::new("suffix")).cloned();
                *captured.lock() = Some((count, suffix));
                Ok(())
            })
            .build()
            .expect("build");
        manager.register(command).expect("register");

        manager
            .execute("console", "repeat 3 times")
            .await
            .expect("execute");
        assert_eq!(*seen.lock(), Some((3, Some("times".to_string()))));

        manager.execute("console", "repeat 3").await.expect("execute");
        assert_eq!(*seen.lock(), Some((3, None)));

        let unknown = manager
            .command_builder("broken")
            .syntax("<oops:nonexistent>")
            .handler(noop)
            .build();
        assert!(matches!(
            unknown,
            Err(RegistrationError::InvalidCommand { .. })
        ));
    }

    #[tokio::test]
    async fn injectors_supply_handler_dependencies() {
        let manager = manager();
        manager
            .register_injector(|ctx: &CommandContext<Sender>| Some(ctx.sender().len()))
            .expect("register injector");

        let seen = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let command = Command::builder("who")
            .handler(move |ctx: &mut CommandContext<Sender>| -> Result<(), HandlerError> {
                *captured.lock() = ctx.inject::<usize>();
                Ok(())
            })
            .build()
            .expect("build");
        manager.register(command).expect("register");

        manager.execute("console", "who").await.expect("execute");
        assert_eq!(*seen.lock(), Some("console".len()));
    }

    #[tokio::test]
    async fn preprocessors_run_first_and_may_abort() {
        let manager = manager();
        manager
            .register_preprocessor(
                |_: &mut CommandContext<Sender>, input: &mut CommandInput| {
                    if input.raw().contains("forbidden") {
                        Err(DispatchError::NoSuchCommand {
                            input: "forbidden".into(),
                        })
                    } else {
                        Ok(())
                    }
                },
            )
            .expect("register preprocessor");

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let command = Command::builder("ok")
            .handler(move |_: &mut CommandContext<Sender>| -> Result<(), HandlerError> {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .expect("build");
        manager.register(command).expect("register");

        let error = manager
            .execute("console", "ok forbidden")
            .await
            .expect_err("preprocessor aborts");
        assert!(matches!(error, DispatchError::NoSuchCommand { .. }));
        assert!(!ran.load(Ordering::SeqCst));

        manager.execute("console", "ok").await.expect("execute");
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn postprocessors_can_veto_execution() {
        let manager = manager();
        manager
            .register_postprocessor(
                |_: &mut CommandContext<Sender>, command: &Arc<Command<Sender>>| {
                    if &**command.root_name() == "vetoed" {
                        Err("not today".into())
                    } else {
                        Ok(())
                    }
                },
            )
            .expect("register postprocessor");

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let command = Command::builder("vetoed")
            .handler(move |_: &mut CommandContext<Sender>| -> Result<(), HandlerError> {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .expect("build");
        manager.register(command).expect("register");

        let error = manager
            .execute("console", "vetoed")
            .await
            .expect_err("postprocessor vetoes");
        assert!(matches!(error, DispatchError::Execution { .. }));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn handler_errors_route_through_the_exception_controller() {
        let manager = manager();
        let routed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&routed);
        manager
            .register_exception_handler(
                ExceptionKind::Execution,
                move |_: &crate::exception::ExceptionContext<'_, Sender>| {
                    flag.store(true, Ordering::SeqCst);
                    crate::exception::ExceptionOutcome::Handled
                },
            )
            .expect("register handler");

        let command = Command::builder("fails")
            .handler(|_: &mut CommandContext<Sender>| -> Result<(), HandlerError> {
                Err("boom".into())
            })
            .build()
            .expect("build");
        manager.register(command).expect("register");

        let error = manager
            .execute("console", "fails")
            .await
            .expect_err("handler fails");
        assert!(matches!(error, DispatchError::Execution { .. }));
        assert!(routed.load(Ordering::SeqCst));
    }

    /// A parser that suspends long enough for cancellation to land first.
    struct SlowParser;

    impl ArgumentParser<Sender> for SlowParser {
        type Output = i64;

        fn parse(
            &self,
            _ctx: &mut CommandContext<Sender>,
            input: &mut CommandInput,
        ) -> Result<i64, ParseFailure> {
            input.read_plain()?;
            Ok(1)
        }

        fn parse_future<'a>(
            &'a self,
            _ctx: &'a mut CommandContext<Sender>,
            input: &'a mut CommandInput,
        ) -> crate::parser::ParserFuture<'a, i64> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                input.read_plain()?;
                Ok(1)
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropping_the_future_cancels_before_the_handler() {
        let settings = ManagerSettings {
            coordinator: CoordinatorKind::Async,
            async_parse: true,
            ..ManagerSettings::default()
        };
        let manager = CommandManager::<Sender>::new(settings);

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let command = Command::builder("slow")
            .required("value", SlowParser)
            .handler(move |_: &mut CommandContext<Sender>| -> Result<(), HandlerError> {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .expect("build");
        manager.register(command).expect("register");

        let invocation = manager.execute("console", "slow 1");
        drop(invocation);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(
            !ran.load(Ordering::SeqCst),
            "a cancelled invocation must not reach the handler"
        );
    }

    #[tokio::test]
    async fn unregistering_a_root_removes_its_commands() {
        let manager = manager();
        let seen = Arc::new(Mutex::new(None));
        register_scenario_command(&manager, &seen);

        assert!(manager.unregister("test").expect("unregister"));
        assert!(!manager.unregister("test").expect("second time is a no-op"));
        let error = manager
            .execute("console", "test literal 10")
            .await
            .expect_err("command is gone");
        assert!(matches!(error, DispatchError::NoSuchCommand { .. }));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: ManagerSettings = serde_json::from_str(
            r#"{ "coordinator": "async", "async_parse": true, "suggestion_limit": 5 }"#,
        )
        .expect("deserialize");
        assert_eq!(settings.coordinator, CoordinatorKind::Async);
        assert!(settings.async_parse);
        assert_eq!(settings.suggestion_limit, Some(5));
        assert!(settings.fail_on_extraneous_input);
        assert_eq!(settings.string_mode_default, StringModeDefault::Single);
    }
}
