//! Per-invocation state: the typed value store, the sender, and injection.

use std::any::{Any, TypeId};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::key::{ContextKey, RawKey};
use crate::parser::flag::FlagContext;

/// The typed key/value store threaded through one command invocation.
///
/// Created when dispatch begins, mutated by parsers and preprocessors as the
/// walk advances, consumed by the handler, and discarded afterwards. A context
/// belongs to exactly one in-flight invocation and is never shared across
/// threads concurrently (moving it between threads is fine).
pub struct CommandContext<S> {
    sender: S,
    raw_input: Arc<str>,
    store: FxHashMap<RawKey, Box<dyn Any + Send + Sync>>,
    flags: FlagContext,
    injectors: Arc<InjectionRegistry<S>>,
    suggesting: bool,
}

impl<S> CommandContext<S> {
    pub(crate) fn new(
        sender: S,
        raw_input: Arc<str>,
        injectors: Arc<InjectionRegistry<S>>,
        suggesting: bool,
    ) -> Self {
        Self {
            sender,
            raw_input,
            store: FxHashMap::default(),
            flags: FlagContext::default(),
            injectors,
            suggesting,
        }
    }

    /// The sender this invocation runs on behalf of.
    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// The unmodified input string the invocation started from.
    #[must_use]
    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    /// `true` while a suggestion walk owns this context; parsers can use this
    /// to skip side effects that only make sense during execution.
    #[must_use]
    pub const fn is_suggesting(&self) -> bool {
        self.suggesting
    }

    /// Stores `value` under `key`, replacing any previous value in that slot.
    pub fn store<T: Send + Sync + 'static>(&mut self, key: &ContextKey<T>, value: T) {
        self.store.insert(key.raw(), Box::new(value));
    }

    pub(crate) fn store_erased(
        &mut self,
        name: Arc<str>,
        ty: TypeId,
        value: Box<dyn Any + Send + Sync>,
    ) {
        self.store.insert(RawKey { name, ty }, value);
    }

    /// Retrieves the value under `key`.
    ///
    /// # Panics
    /// Panics when the key was never stored; use [`optional`](Self::optional)
    /// when absence is an expected state.
    pub fn get<T: Send + Sync + 'static>(&self, key: &ContextKey<T>) -> &T {
        match self.optional(key) {
            Some(value) => value,
            None => panic!("no value stored under key '{}'", key.name()),
        }
    }

    /// Retrieves the value under `key`, or `None` when absent.
    pub fn optional<T: Send + Sync + 'static>(&self, key: &ContextKey<T>) -> Option<&T> {
        self.store
            .get(&key.raw())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// `true` when a value is stored under `key`.
    pub fn contains<T: Send + Sync + 'static>(&self, key: &ContextKey<T>) -> bool {
        self.store.contains_key(&key.raw())
    }

    /// Resolves a value of type `T` from the injection registry.
    pub fn inject<T: Send + Sync + 'static>(&self) -> Option<T> {
        self.injectors.create(self)
    }

    /// The flags matched for this invocation.
    #[must_use]
    pub const fn flags(&self) -> &FlagContext {
        &self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut FlagContext {
        &mut self.flags
    }
}

/// Erased producer of one injectable value type.
trait Injector<S>: Send + Sync {
    fn create(&self, ctx: &CommandContext<S>) -> Option<Box<dyn Any + Send + Sync>>;
}

struct InjectorFn<S, T, F>
where
    F: Fn(&CommandContext<S>) -> Option<T>,
{
    create: F,
    _marker: std::marker::PhantomData<fn(&S) -> T>,
}

impl<S, T, F> Injector<S> for InjectorFn<S, T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&CommandContext<S>) -> Option<T> + Send + Sync,
{
    fn create(&self, ctx: &CommandContext<S>) -> Option<Box<dyn Any + Send + Sync>> {
        (self.create)(ctx).map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
    }
}

/// Registry of `type -> injector` mappings consulted by
/// [`CommandContext::inject`].
pub struct InjectionRegistry<S> {
    injectors: scc::HashMap<TypeId, Arc<dyn Injector<S>>>,
}

impl<S> InjectionRegistry<S> {
    pub(crate) fn new() -> Self {
        Self {
            injectors: scc::HashMap::new(),
        }
    }

    pub(crate) fn register<T>(
        &self,
        create: impl Fn(&CommandContext<S>) -> Option<T> + Send + Sync + 'static,
    ) where
        T: Send + Sync + 'static,
        S: 'static,
    {
        let injector: Arc<dyn Injector<S>> = Arc::new(InjectorFn {
            create,
            _marker: std::marker::PhantomData,
        });
        let _ = self
            .injectors
            .insert_sync(TypeId::of::<T>(), injector);
    }

    fn create<T: Send + Sync + 'static>(&self, ctx: &CommandContext<S>) -> Option<T> {
        let injector = self
            .injectors
            .read_sync(&TypeId::of::<T>(), |_, v| Arc::clone(v))?;
        injector
            .create(ctx)
            .and_then(|value| value.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }
}
