//! The argument parser capability and the built-in parser set.
//!
//! A parser consumes tokens from a [`CommandInput`] and produces a typed value
//! or a structured [`ParseFailure`]. Parsers are idempotent on failure: an
//! `Err` return leaves the cursor exactly where the attempt started. Every
//! parser is future-bearing — the tree awaits [`ArgumentParser::parse_future`]
//! at each component, and synchronous parsers hand back an already-completed
//! future.

pub mod aggregate;
pub mod boolean;
pub mod duration;
pub mod either;
pub mod enumeration;
pub mod flag;
pub mod numeric;
pub mod string;
pub mod uuid;

use std::any::Any;
use std::sync::Arc;

use futures::future::{self, BoxFuture};

use crate::context::CommandContext;
use crate::error::ParseFailure;
use crate::input::CommandInput;
use crate::key::ValueType;
use crate::suggestion::Suggestion;

/// The future returned by a parser attempt.
pub type ParserFuture<'a, T> = BoxFuture<'a, Result<T, ParseFailure>>;

/// The capability every argument parser implements.
pub trait ArgumentParser<S>: Send + Sync {
    /// The value this parser produces.
    type Output: Send + Sync + 'static;

    /// Consumes input and produces a value, or fails having consumed nothing.
    fn parse(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<Self::Output, ParseFailure>;

    /// Future-bearing entry point awaited by the tree.
    ///
    /// The default runs [`parse`](Self::parse) eagerly and returns the
    /// completed future; parsers that need to suspend override this.
    fn parse_future<'a>(
        &'a self,
        ctx: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParserFuture<'a, Self::Output> {
        Box::pin(future::ready(self.parse(ctx, input)))
    }

    /// Completions for the token currently under the cursor.
    ///
    /// The context is mutable because compound parsers advance through their
    /// inner components while suggesting, storing intermediate values for
    /// downstream providers to read.
    fn suggest(&self, _ctx: &mut CommandContext<S>, _input: &CommandInput) -> Vec<Suggestion> {
        Vec::new()
    }

    /// How many tokens a successful parse consumes; aggregates sum theirs.
    fn token_count(&self) -> usize {
        1
    }

    /// `true` when a successful parse consumes the rest of the input; such a
    /// parser must sit on the last non-flag component of a command.
    fn consumes_remainder(&self) -> bool {
        false
    }

    /// `true` when the result depends only on input, never on the context;
    /// suggestion results of such parsers may be cached.
    fn context_free(&self) -> bool {
        false
    }
}

/// Object-safe form of [`ArgumentParser`] with the output boxed.
pub(crate) trait ErasedParser<S>: Send + Sync {
    fn parse_erased<'a>(
        &'a self,
        ctx: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParserFuture<'a, Box<dyn Any + Send + Sync>>;

    fn suggest(&self, ctx: &mut CommandContext<S>, input: &CommandInput) -> Vec<Suggestion>;

    fn token_count(&self) -> usize;

    fn consumes_remainder(&self) -> bool;

    fn context_free(&self) -> bool;
}

struct Erase<P>(P);

impl<S, P> ErasedParser<S> for Erase<P>
where
    P: ArgumentParser<S>,
{
    fn parse_erased<'a>(
        &'a self,
        ctx: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParserFuture<'a, Box<dyn Any + Send + Sync>> {
        let parse = self.0.parse_future(ctx, input);
        Box::pin(async move {
            parse
                .await
                .map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
        })
    }

    fn suggest(&self, ctx: &mut CommandContext<S>, input: &CommandInput) -> Vec<Suggestion> {
        self.0.suggest(ctx, input)
    }

    fn token_count(&self) -> usize {
        self.0.token_count()
    }

    fn consumes_remainder(&self) -> bool {
        self.0.consumes_remainder()
    }

    fn context_free(&self) -> bool {
        self.0.context_free()
    }
}

/// A shareable, type-erased handle to a parser plus its output type token.
pub struct ParserHandle<S> {
    parser: Arc<dyn ErasedParser<S>>,
    output: ValueType,
}

impl<S> ParserHandle<S> {
    /// Erases a typed parser.
    pub fn new<P>(parser: P) -> Self
    where
        P: ArgumentParser<S> + 'static,
    {
        Self {
            parser: Arc::new(Erase(parser)),
            output: ValueType::of::<P::Output>(),
        }
    }

    /// The type token of the values this parser produces.
    #[must_use]
    pub const fn output(&self) -> ValueType {
        self.output
    }

    pub(crate) fn parse_erased<'a>(
        &'a self,
        ctx: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParserFuture<'a, Box<dyn Any + Send + Sync>> {
        self.parser.parse_erased(ctx, input)
    }

    pub(crate) fn suggest(
        &self,
        ctx: &mut CommandContext<S>,
        input: &CommandInput,
    ) -> Vec<Suggestion> {
        self.parser.suggest(ctx, input)
    }

    pub(crate) fn token_count(&self) -> usize {
        self.parser.token_count()
    }

    pub(crate) fn consumes_remainder(&self) -> bool {
        self.parser.consumes_remainder()
    }

    #[expect(dead_code, reason = "cache hook for context-free suggestion results")]
    pub(crate) fn context_free(&self) -> bool {
        self.parser.context_free()
    }
}

impl<S> Clone for ParserHandle<S> {
    fn clone(&self) -> Self {
        Self {
            parser: Arc::clone(&self.parser),
            output: self.output,
        }
    }
}

/// The `type -> parser` and `name -> parser` registries.
///
/// Registered parsers are prototypes: handles are cheap to clone and shared
/// by every component that resolves them. The manager locks this registry
/// together with the command tree.
pub struct ParserRegistry<S> {
    by_type: scc::HashMap<std::any::TypeId, ParserHandle<S>>,
    by_name: scc::HashMap<String, ParserHandle<S>>,
}

impl<S> ParserRegistry<S> {
    pub(crate) fn new() -> Self {
        Self {
            by_type: scc::HashMap::new(),
            by_name: scc::HashMap::new(),
        }
    }

    /// Registers `parser` as the default for its output type; an existing
    /// registration for that type is replaced.
    pub fn register<P>(&self, parser: P)
    where
        P: ArgumentParser<S> + 'static,
    {
        let handle = ParserHandle::new(parser);
        let key = handle.output().id();
        let _ = self.by_type.remove_sync(&key);
        let _ = self.by_type.insert_sync(key, handle);
    }

    /// Registers `parser` under an explicit name.
    pub fn register_named<P>(&self, name: impl Into<String>, parser: P)
    where
        P: ArgumentParser<S> + 'static,
    {
        let name = name.into();
        let _ = self.by_name.remove_sync(&name);
        let _ = self.by_name.insert_sync(name, ParserHandle::new(parser));
    }

    /// The parser registered for output type `T`, if any.
    #[must_use]
    pub fn by_type<T: 'static>(&self) -> Option<ParserHandle<S>> {
        self.by_type
            .read_sync(&std::any::TypeId::of::<T>(), |_, handle| handle.clone())
    }

    /// The parser registered under `name`, if any.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<ParserHandle<S>> {
        self.by_name.read_sync(name, |_, handle| handle.clone())
    }
}
