//! Execution coordination: the dispatch pipeline and its schedulers.
//!
//! A coordinator sequences preprocessors, the tree parse, postprocessors, and
//! the handler, and decides which threads run which stage. Cancellation is
//! drop-based: dropping the returned future before the handler has started
//! abandons the invocation; a handler that has started always runs to
//! completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::command::Command;
use crate::context::CommandContext;
use crate::error::DispatchError;
use crate::exception::ExceptionController;
use crate::input::CommandInput;
use crate::permission::PermissionChecker;
use crate::tree::{CommandTree, WalkResources};

/// A hook run before parsing; may mutate the context or the raw input, or
/// abort the invocation with a failure.
pub trait Preprocessor<S>: Send + Sync {
    /// Runs before the tree walk.
    fn preprocess(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<(), DispatchError>;
}

impl<S, F> Preprocessor<S> for F
where
    F: Fn(&mut CommandContext<S>, &mut CommandInput) -> Result<(), DispatchError> + Send + Sync,
{
    fn preprocess(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<(), DispatchError> {
        self(ctx, input)
    }
}

/// A hook run after parsing and before the handler; an error vetoes
/// execution and is surfaced as [`DispatchError::Execution`].
pub trait Postprocessor<S>: Send + Sync {
    /// Runs once the command to execute is known.
    fn postprocess(
        &self,
        ctx: &mut CommandContext<S>,
        command: &Arc<Command<S>>,
    ) -> Result<(), crate::command::HandlerError>;
}

impl<S, F> Postprocessor<S> for F
where
    F: Fn(&mut CommandContext<S>, &Arc<Command<S>>) -> Result<(), crate::command::HandlerError>
        + Send
        + Sync,
{
    fn postprocess(
        &self,
        ctx: &mut CommandContext<S>,
        command: &Arc<Command<S>>,
    ) -> Result<(), crate::command::HandlerError> {
        self(ctx, command)
    }
}

/// The successful outcome of an invocation.
pub struct ExecutionResult<S> {
    context: CommandContext<S>,
    command: Arc<Command<S>>,
}

impl<S> std::fmt::Debug for ExecutionResult<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionResult").finish_non_exhaustive()
    }
}

impl<S> ExecutionResult<S> {
    /// The command that ran.
    #[must_use]
    pub fn command(&self) -> &Arc<Command<S>> {
        &self.command
    }

    /// The context the handler ran against.
    #[must_use]
    pub const fn context(&self) -> &CommandContext<S> {
        &self.context
    }

    /// Consumes the result, yielding the context.
    #[must_use]
    pub fn into_context(self) -> CommandContext<S> {
        self.context
    }
}

/// Everything one invocation flows through, snapshotted at dispatch time so
/// later registry mutations cannot affect an in-flight invocation.
pub struct DispatchPipeline<S> {
    tree: Arc<CommandTree<S>>,
    preprocessors: Vec<Arc<dyn Preprocessor<S>>>,
    postprocessors: Vec<Arc<dyn Postprocessor<S>>>,
    checker: Arc<dyn PermissionChecker<S>>,
    exceptions: Arc<ExceptionController<S>>,
    fail_on_extraneous_input: bool,
}

/// Scheduling knobs for one pipeline run.
#[derive(Default)]
pub(crate) struct RunOptions {
    /// Insert explicit suspension points so cancellation can interleave.
    pub suspend: bool,
    /// Set to `true` the moment the handler is committed to run.
    pub commit: Option<Arc<AtomicBool>>,
    /// Run the handler itself on this runtime instead of inline.
    pub execute_handle: Option<Handle>,
}

#[derive(Debug, Error)]
#[error("handler task panicked")]
struct HandlerPanicked;

impl<S> DispatchPipeline<S>
where
    S: Send + Sync + 'static,
{
    pub(crate) fn new(
        tree: Arc<CommandTree<S>>,
        preprocessors: Vec<Arc<dyn Preprocessor<S>>>,
        postprocessors: Vec<Arc<dyn Postprocessor<S>>>,
        checker: Arc<dyn PermissionChecker<S>>,
        exceptions: Arc<ExceptionController<S>>,
        fail_on_extraneous_input: bool,
    ) -> Self {
        Self {
            tree,
            preprocessors,
            postprocessors,
            checker,
            exceptions,
            fail_on_extraneous_input,
        }
    }

    /// Runs the whole pipeline inline on the polling task.
    pub async fn run(
        self: Arc<Self>,
        ctx: CommandContext<S>,
        input: CommandInput,
    ) -> Result<ExecutionResult<S>, DispatchError> {
        self.run_with(ctx, input, RunOptions::default()).await
    }

    pub(crate) async fn run_with(
        self: Arc<Self>,
        mut ctx: CommandContext<S>,
        mut input: CommandInput,
        options: RunOptions,
    ) -> Result<ExecutionResult<S>, DispatchError> {
        let command = match self.parse_phase(&mut ctx, &mut input, options.suspend).await {
            Ok(command) => command,
            Err(error) => return Err(self.exceptions.dispatch(error, &ctx)),
        };
        self.execute_phase(ctx, command, options).await
    }

    /// Preprocessors, then the tree walk.
    async fn parse_phase(
        &self,
        ctx: &mut CommandContext<S>,
        input: &mut CommandInput,
        suspend: bool,
    ) -> Result<Arc<Command<S>>, DispatchError> {
        if suspend {
            tokio::task::yield_now().await;
        }
        for preprocessor in &self.preprocessors {
            preprocessor.preprocess(ctx, input)?;
        }

        if suspend {
            tokio::task::yield_now().await;
        }
        let resources = WalkResources {
            checker: &*self.checker,
            fail_on_extraneous_input: self.fail_on_extraneous_input,
        };
        self.tree.parse(ctx, input, &resources).await
    }

    /// Postprocessors, commit, then the handler.
    async fn execute_phase(
        &self,
        mut ctx: CommandContext<S>,
        command: Arc<Command<S>>,
        options: RunOptions,
    ) -> Result<ExecutionResult<S>, DispatchError> {
        if options.suspend {
            tokio::task::yield_now().await;
        }
        for postprocessor in &self.postprocessors {
            if let Err(veto) = postprocessor.postprocess(&mut ctx, &command) {
                let error = DispatchError::Execution { source: veto.into() };
                return Err(self.exceptions.dispatch(error, &ctx));
            }
        }

        if options.suspend {
            tokio::task::yield_now().await;
        }
        // Past this point the handler runs to completion even if the caller
        // walks away.
        if let Some(commit) = &options.commit {
            commit.store(true, Ordering::SeqCst);
        }

        let (ctx, outcome) = match options.execute_handle {
            Some(handle) => {
                let executing = Arc::clone(&command);
                let task = handle.spawn(async move {
                    let mut ctx = ctx;
                    let outcome = executing.handler().execute(&mut ctx).await;
                    (ctx, outcome)
                });
                match task.await {
                    Ok(finished) => finished,
                    Err(join_error) => {
                        return Err(if join_error.is_cancelled() {
                            DispatchError::Cancelled
                        } else {
                            DispatchError::execution(HandlerPanicked)
                        });
                    }
                }
            }
            None => {
                let outcome = command.handler().execute(&mut ctx).await;
                (ctx, outcome)
            }
        };

        match outcome {
            Ok(()) => Ok(ExecutionResult { context: ctx, command }),
            Err(source) => {
                let error = DispatchError::Execution {
                    source: source.into(),
                };
                Err(self.exceptions.dispatch(error, &ctx))
            }
        }
    }
}

/// Schedules one invocation through the pipeline.
pub trait ExecutionCoordinator<S>: Send + Sync {
    /// Starts the invocation and returns its future. Dropping the future
    /// before the handler starts abandons the invocation.
    fn coordinate(
        &self,
        pipeline: Arc<DispatchPipeline<S>>,
        ctx: CommandContext<S>,
        input: CommandInput,
    ) -> BoxFuture<'static, Result<ExecutionResult<S>, DispatchError>>;
}

/// Parses and executes inline on the calling task.
pub struct SimpleCoordinator;

impl<S> ExecutionCoordinator<S> for SimpleCoordinator
where
    S: Send + Sync + 'static,
{
    fn coordinate(
        &self,
        pipeline: Arc<DispatchPipeline<S>>,
        ctx: CommandContext<S>,
        input: CommandInput,
    ) -> BoxFuture<'static, Result<ExecutionResult<S>, DispatchError>> {
        Box::pin(pipeline.run(ctx, input))
    }
}

/// Parses on a worker runtime and optionally dispatches handlers elsewhere.
///
/// `parse_handle` hosts the pipeline when async parsing is wanted; without it
/// the pipeline runs inline on the caller. `execute_handle` moves only the
/// handler invocation onto a separate runtime.
pub struct AsyncCoordinator {
    parse_handle: Option<Handle>,
    execute_handle: Option<Handle>,
}

impl AsyncCoordinator {
    /// A coordinator with no spawning at all; stages still suspend at the
    /// documented points.
    #[must_use]
    pub const fn inline() -> Self {
        Self {
            parse_handle: None,
            execute_handle: None,
        }
    }

    /// Parses (and by default executes) on the given runtime.
    #[must_use]
    pub fn on(handle: Handle) -> Self {
        Self {
            parse_handle: Some(handle),
            execute_handle: None,
        }
    }

    /// Moves handler invocation onto a separate runtime.
    #[must_use]
    pub fn with_execute_handle(mut self, handle: Handle) -> Self {
        self.execute_handle = Some(handle);
        self
    }
}

impl<S> ExecutionCoordinator<S> for AsyncCoordinator
where
    S: Send + Sync + 'static,
{
    fn coordinate(
        &self,
        pipeline: Arc<DispatchPipeline<S>>,
        ctx: CommandContext<S>,
        input: CommandInput,
    ) -> BoxFuture<'static, Result<ExecutionResult<S>, DispatchError>> {
        let committed = Arc::new(AtomicBool::new(false));
        let options = RunOptions {
            suspend: true,
            commit: Some(Arc::clone(&committed)),
            execute_handle: self.execute_handle.clone(),
        };
        match &self.parse_handle {
            Some(handle) => {
                let task = handle.spawn(pipeline.run_with(ctx, input, options));
                Box::pin(CancelGuard {
                    task: Some(task),
                    committed,
                })
            }
            None => Box::pin(pipeline.run_with(ctx, input, options)),
        }
    }
}

/// Awaits a spawned pipeline task; dropped before the handler committed, it
/// aborts the task so postprocessors and handlers never start late.
struct CancelGuard<S> {
    task: Option<JoinHandle<Result<ExecutionResult<S>, DispatchError>>>,
    committed: Arc<AtomicBool>,
}

impl<S> Future for CancelGuard<S> {
    type Output = Result<ExecutionResult<S>, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(task) = self.task.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(joined) => {
                self.task = None;
                Poll::Ready(match joined {
                    Ok(result) => result,
                    Err(join_error) if join_error.is_cancelled() => Err(DispatchError::Cancelled),
                    Err(_) => Err(DispatchError::execution(HandlerPanicked)),
                })
            }
        }
    }
}

impl<S> Drop for CancelGuard<S> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take()
            && !self.committed.load(Ordering::SeqCst)
        {
            task.abort();
        }
    }
}
