//! Routing of dispatch failures to host-registered handlers.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::CommandContext;
use crate::error::{DispatchError, ExceptionKind};

/// What an exception handler saw: the error and the invocation it came from.
pub struct ExceptionContext<'a, S> {
    error: &'a DispatchError,
    context: &'a CommandContext<S>,
}

impl<'a, S> ExceptionContext<'a, S> {
    /// The routed error.
    #[must_use]
    pub const fn error(&self) -> &'a DispatchError {
        self.error
    }

    /// The error's kind.
    #[must_use]
    pub const fn kind(&self) -> ExceptionKind {
        self.error.kind()
    }

    /// The invocation context the error occurred in.
    #[must_use]
    pub const fn context(&self) -> &'a CommandContext<S> {
        self.context
    }
}

/// A handler's verdict.
pub enum ExceptionOutcome {
    /// The error was presented to the user (or swallowed); routing ends.
    Handled,
    /// Route the given error instead. Allowed once per dispatch; a second
    /// rethrow ends routing to keep handler graphs loop-free.
    Rethrow(DispatchError),
}

/// Host-side handling of one exception kind.
pub trait ExceptionHandler<S>: Send + Sync {
    /// Reacts to a routed error.
    fn handle(&self, ctx: &ExceptionContext<'_, S>) -> ExceptionOutcome;
}

impl<S, F> ExceptionHandler<S> for F
where
    F: Fn(&ExceptionContext<'_, S>) -> ExceptionOutcome + Send + Sync,
{
    fn handle(&self, ctx: &ExceptionContext<'_, S>) -> ExceptionOutcome {
        self(ctx)
    }
}

/// The kind-keyed handler registry.
///
/// Resolution is subtype-aware: the handler registered for the most specific
/// kind wins, falling back along [`ExceptionKind::parent`] up to `Dispatch`.
/// Multiple handlers for the same kind resolve in insertion order (first
/// registered wins).
pub struct ExceptionController<S> {
    handlers: RwLock<Vec<(ExceptionKind, Arc<dyn ExceptionHandler<S>>)>>,
}

impl<S> Default for ExceptionController<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ExceptionController<S> {
    /// An empty controller; unrouted errors pass through unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Registers a handler for `kind`.
    pub fn register(&self, kind: ExceptionKind, handler: impl ExceptionHandler<S> + 'static) {
        self.handlers.write().push((kind, Arc::new(handler)));
    }

    fn resolve(&self, kind: ExceptionKind) -> Option<Arc<dyn ExceptionHandler<S>>> {
        let handlers = self.handlers.read();
        let mut lookup = Some(kind);
        while let Some(kind) = lookup {
            if let Some((_, handler)) = handlers.iter().find(|(registered, _)| *registered == kind)
            {
                return Some(Arc::clone(handler));
            }
            lookup = kind.parent();
        }
        None
    }

    /// Routes `error` through the registered handlers and returns the error
    /// the caller should surface.
    pub(crate) fn dispatch(&self, error: DispatchError, ctx: &CommandContext<S>) -> DispatchError {
        let mut current = error;
        for rethrows in 0..2 {
            let Some(handler) = self.resolve(current.kind()) else {
                return current;
            };
            let outcome = handler.handle(&ExceptionContext {
                error: &current,
                context: ctx,
            });
            match outcome {
                ExceptionOutcome::Handled => return current,
                ExceptionOutcome::Rethrow(next) => {
                    if rethrows == 1 {
                        log::error!(
                            "exception handler for {:?} rethrew after a rethrow; ending routing",
                            current.kind()
                        );
                        return next;
                    }
                    current = next;
                }
            }
        }
        current
    }
}
