//! # Execution Pipeline
//!
//! Runs a command's middleware chain and then its handler, strictly in
//! order. A middleware signals "proceed" by completing with `Ok(())`; any
//! error aborts the chain and is returned to the caller unchanged.
//!
//! Required options are checked before anything runs, and every named
//! middleware is resolved before the first one starts, so a bad chain never
//! half-executes.

use crate::{
    core::commons,
    error::{Error, Result},
    models::{BoundArgs, CommandDefinition, Context, MiddlewareRef, ParsedInvocation},
    system::loader::MiddlewareLoader,
};
use async_trait::async_trait;
use std::{fmt, future::Future, sync::Arc, time::Duration};

/// A unit of work run before a command's handler.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Runs the middleware. `Ok(())` lets the chain proceed.
    async fn call(&self, ctx: Arc<Context>) -> anyhow::Result<()>;
}

/// The terminal step of a command.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Runs the command with its bound arguments.
    async fn run(&self, ctx: Arc<Context>, args: BoundArgs) -> anyhow::Result<()>;
}

/// A [`Middleware`] backed by an async closure.
pub struct FnMiddleware<F>(F);

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMiddleware")
    }
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn call(&self, ctx: Arc<Context>) -> anyhow::Result<()> {
        (self.0)(ctx).await
    }
}

/// Wraps an async closure as a middleware.
pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    FnMiddleware(f)
}

/// A [`Handler`] backed by an async closure.
pub struct FnHandler<F>(F);

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arc<Context>, BoundArgs) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn run(&self, ctx: Arc<Context>, args: BoundArgs) -> anyhow::Result<()> {
        (self.0)(ctx, args).await
    }
}

/// Wraps an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Arc<Context>, BoundArgs) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    FnHandler(f)
}

/// Where the pipeline currently is. Used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// About to run the middleware at this chain position.
    Pending(usize),
    /// Running the handler.
    Terminal,
    /// Everything completed.
    Done,
    /// A step failed; nothing after it ran.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(i) => write!(f, "PENDING[{}]", i),
            Self::Terminal => f.write_str("TERMINAL"),
            Self::Done => f.write_str("DONE"),
            Self::Failed => f.write_str("FAILED"),
        }
    }
}

/// Tunables of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    /// Deadline for each middleware and for the handler. `None` waits forever.
    pub timeout: Option<Duration>,
}

/// Runs command chains, resolving named middleware through a loader.
#[derive(Debug)]
pub struct Pipeline<'a> {
    loader: &'a dyn MiddlewareLoader,
    settings: PipelineSettings,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline resolving external middleware with `loader`.
    pub fn new(loader: &'a dyn MiddlewareLoader, settings: PipelineSettings) -> Self {
        Self { loader, settings }
    }

    /// Resolves every middleware reference of `command`, in chain order.
    ///
    /// Named references match the command's own methods first, then the loader.
    pub fn resolve(&self, command: &CommandDefinition) -> Result<Vec<(String, Arc<dyn Middleware>)>> {
        command
            .middleware
            .iter()
            .map(|reference| match reference {
                MiddlewareRef::Inline(middleware) => {
                    Ok((reference.label().to_string(), middleware.clone()))
                }
                MiddlewareRef::Named(name) => {
                    let middleware = match command.methods.get(name) {
                        Some(method) => method.clone(),
                        None => self.loader.load(name)?,
                    };
                    Ok((name.clone(), middleware))
                }
            })
            .collect()
    }

    /// Runs the command in `ctx`: required-option check, middleware chain, handler.
    pub async fn execute(&self, ctx: Context) -> Result<()> {
        let command = ctx.command.clone();
        let command_name = ctx.command_name();

        let args = bind_args(&command, &ctx.invocation, &command_name)?;
        let chain = self.resolve(&command)?;
        let ctx = Arc::new(ctx);

        for (position, (name, middleware)) in chain.iter().enumerate() {
            log::debug!("{} {} -> '{}'", command_name, Stage::Pending(position), name);
            let outcome = self
                .guard(name, &ctx, middleware.call(ctx.clone()))
                .await;
            if let Err(e) = outcome {
                log::debug!("{} {} at '{}': {}", command_name, Stage::Failed, name, e);
                return Err(e);
            }
        }

        log::debug!("{} {}", command_name, Stage::Terminal);
        let outcome = self
            .guard("run", &ctx, command.handler.run(ctx.clone(), args))
            .await;
        match &outcome {
            Ok(()) => log::debug!("{} {}", command_name, Stage::Done),
            Err(e) => log::debug!("{} {} at 'run': {}", command_name, Stage::Failed, e),
        }
        outcome
    }

    /// Awaits one step, racing it against cancellation and the deadline.
    async fn guard<F>(&self, name: &str, ctx: &Context, step: F) -> Result<()>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        commons::check_for_cancellation(&ctx.cancel)?;

        let raced = async {
            tokio::select! {
                result = step => result.map_err(into_engine_error),
                _ = commons::wait_for_cancellation(&ctx.cancel) => Err(Error::Cancelled),
            }
        };

        match self.settings.timeout {
            Some(timeout) => tokio::time::timeout(timeout, raced)
                .await
                .map_err(|_| Error::TimedOut {
                    name: name.to_string(),
                    timeout,
                })?,
            None => raced.await,
        }
    }
}

/// Keeps engine errors raised inside a step (e.g. a cancelled script) as
/// they are; everything else is a handler error.
fn into_engine_error(error: anyhow::Error) -> Error {
    error.downcast::<Error>().unwrap_or_else(Error::Handler)
}

/// Binds parsed values to the handler: declared options in declaration
/// order, then positionals.
///
/// # Errors
/// [`Error::MissingArgument`] for the first required option whose value is
/// absent, `false` or empty.
pub fn bind_args(
    command: &CommandDefinition,
    invocation: &ParsedInvocation,
    command_name: &str,
) -> Result<BoundArgs> {
    let mut options = Vec::with_capacity(command.options.len());
    for spec in &command.options {
        let value = invocation.command_options.get(&spec.name).cloned();
        if spec.required && !value.as_ref().is_some_and(|v| v.is_truthy()) {
            return Err(Error::MissingArgument {
                command: command_name.to_string(),
                option: spec.name.clone(),
            });
        }
        options.push((spec.name.clone(), value));
    }

    Ok(BoundArgs {
        options,
        positionals: invocation.positionals.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{OptionSpec, OptionValue, Output, ProgramInfo},
        system::loader::StaticLoader,
    };
    use anyhow::anyhow;
    use std::{
        collections::BTreeMap,
        path::PathBuf,
        sync::{
            Mutex,
            atomic::{AtomicBool, Ordering},
        },
    };

    type Journal = Arc<Mutex<Vec<String>>>;

    fn recorder(journal: &Journal, label: &'static str) -> impl Middleware + 'static {
        let journal = journal.clone();
        middleware_fn(move |_ctx| {
            let journal = journal.clone();
            async move {
                journal.lock().unwrap().push(label.to_string());
                Ok(())
            }
        })
    }

    fn failing(message: &'static str) -> impl Middleware + 'static {
        middleware_fn(move |_ctx| async move { Err(anyhow!(message)) })
    }

    fn recording_command(journal: &Journal, path: &[&str]) -> CommandDefinition {
        let journal = journal.clone();
        CommandDefinition::new(
            path.iter().copied(),
            handler_fn(move |_ctx, args: BoundArgs| {
                let journal = journal.clone();
                async move {
                    journal
                        .lock()
                        .unwrap()
                        .push(format!("run {}", args.values().join(" ")));
                    Ok(())
                }
            }),
        )
    }

    fn context(command: CommandDefinition, invocation: ParsedInvocation) -> Context {
        Context {
            program: ProgramInfo {
                name: "hello-world".into(),
                root: PathBuf::from("."),
                delimiter: " ".into(),
                stdout: Output::memory(),
                stderr: Output::memory(),
            },
            command: Arc::new(command),
            invocation,
            global_aliases: BTreeMap::new(),
            command_aliases: BTreeMap::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_middleware_runs_in_declaration_order_before_handler() {
        let journal: Journal = Arc::default();
        let loader = StaticLoader::new().with("auth", recorder(&journal, "auth"));
        let command = recording_command(&journal, &["apps", "edit"])
            .use_named("auth")
            .use_named("beforeRun")
            .use_inline(recorder(&journal, "inline"))
            .method("beforeRun", recorder(&journal, "beforeRun"));
        let invocation = ParsedInvocation {
            positionals: vec!["some-app".into()],
            ..ParsedInvocation::default()
        };

        let pipeline = Pipeline::new(&loader, PipelineSettings::default());
        pipeline.execute(context(command, invocation)).await.unwrap();

        assert_eq!(
            entries(&journal),
            vec!["auth", "beforeRun", "inline", "run some-app"]
        );
    }

    #[tokio::test]
    async fn test_command_method_shadows_external_middleware() {
        let journal: Journal = Arc::default();
        let loader = StaticLoader::new().with("auth", recorder(&journal, "external"));
        let command = recording_command(&journal, &["apps"])
            .use_named("auth")
            .method("auth", recorder(&journal, "local"));

        Pipeline::new(&loader, PipelineSettings::default())
            .execute(context(command, ParsedInvocation::default()))
            .await
            .unwrap();
        assert_eq!(entries(&journal), vec!["local", "run "]);
    }

    #[tokio::test]
    async fn test_failing_middleware_stops_the_chain() {
        let journal: Journal = Arc::default();
        let loader = StaticLoader::new();
        let command = recording_command(&journal, &["apps"])
            .use_inline(recorder(&journal, "first"))
            .use_inline(failing("not logged in"))
            .use_inline(recorder(&journal, "third"));

        let err = Pipeline::new(&loader, PipelineSettings::default())
            .execute(context(command, ParsedInvocation::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Handler(_)));
        assert_eq!(err.to_string(), "not logged in");
        assert_eq!(entries(&journal), vec!["first"]);
    }

    #[tokio::test]
    async fn test_handler_error_is_surfaced() {
        let loader = StaticLoader::new();
        let command = CommandDefinition::new(
            ["generate", "key"],
            handler_fn(|_ctx, args: BoundArgs| async move {
                Err(anyhow!("generate key {}", args.positionals.join(" ")))
            }),
        );
        let invocation = ParsedInvocation {
            positionals: vec!["some-key".into()],
            ..ParsedInvocation::default()
        };

        let err = Pipeline::new(&loader, PipelineSettings::default())
            .execute(context(command, invocation))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "generate key some-key");
    }

    #[tokio::test]
    async fn test_missing_required_option_aborts_before_middleware() {
        let journal: Journal = Arc::default();
        let loader = StaticLoader::new();
        let command = recording_command(&journal, &["apps", "add"])
            .option(OptionSpec::string("stack").required())
            .use_inline(recorder(&journal, "auth"));
        let mut invocation = ParsedInvocation::default();
        invocation
            .command_options
            .insert("stack".into(), OptionValue::from(""));

        let err = Pipeline::new(&loader, PipelineSettings::default())
            .execute(context(command, invocation))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::MissingArgument { ref command, ref option } if command == "apps add" && option == "stack"
        ));
        assert!(entries(&journal).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_named_middleware_fails_before_anything_runs() {
        let journal: Journal = Arc::default();
        let loader = StaticLoader::new();
        let command = recording_command(&journal, &["apps"])
            .use_inline(recorder(&journal, "first"))
            .use_named("missing");

        let err = Pipeline::new(&loader, PipelineSettings::default())
            .execute(context(command, ParsedInvocation::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModuleNotFound(ref name) if name == "missing"));
        assert!(entries(&journal).is_empty());
    }

    #[tokio::test]
    async fn test_stalled_middleware_times_out() {
        let journal: Journal = Arc::default();
        let loader = StaticLoader::new();
        let command = recording_command(&journal, &["apps"]).use_named("stall").method(
            "stall",
            middleware_fn(|_ctx| async {
                std::future::pending::<()>().await;
                Ok(())
            }),
        );
        let settings = PipelineSettings {
            timeout: Some(Duration::from_millis(50)),
        };

        let err = Pipeline::new(&loader, settings)
            .execute(context(command, ParsedInvocation::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TimedOut { ref name, .. } if name == "stall"));
        assert!(entries(&journal).is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_running_middleware() {
        let journal: Journal = Arc::default();
        let loader = StaticLoader::new();
        let command = recording_command(&journal, &["apps"]).use_inline(middleware_fn(
            |ctx: Arc<Context>| async move {
                ctx.cancel.store(true, Ordering::SeqCst);
                std::future::pending::<()>().await;
                Ok(())
            },
        ));

        let err = Pipeline::new(&loader, PipelineSettings::default())
            .execute(context(command, ParsedInvocation::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(entries(&journal).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let journal: Journal = Arc::default();
        let loader = StaticLoader::new();
        let command = recording_command(&journal, &["apps"]);
        let ctx = context(command, ParsedInvocation::default());
        ctx.cancel.store(true, Ordering::SeqCst);

        let err = Pipeline::new(&loader, PipelineSettings::default())
            .execute(ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(entries(&journal).is_empty());
    }

    #[test]
    fn test_bind_args_follows_declaration_order() {
        let command = CommandDefinition::new(
            ["apps", "destroy"],
            handler_fn(|_, _| async { Ok(()) }),
        )
        .option(OptionSpec::boolean("force").alias("f"))
        .option(OptionSpec::string("region"));
        let mut invocation = ParsedInvocation {
            positionals: vec!["some-app".into()],
            ..ParsedInvocation::default()
        };
        invocation
            .command_options
            .insert("force".into(), OptionValue::Bool(true));

        let args = bind_args(&command, &invocation, "apps destroy").unwrap();
        assert_eq!(args.values(), vec!["true", "undefined", "some-app"]);
    }
}
