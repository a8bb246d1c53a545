// src/system/script.rs

use crate::{
    constants::{ENV_COMMAND, ENV_OPTION_PREFIX, ENV_PROGRAM},
    core::pipeline::{Handler, Middleware},
    error::Error,
    models::{BoundArgs, Context, OptionValue},
    system::executor::{self, ExecutionError},
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::{collections::HashMap, sync::Arc};

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{([A-Za-z0-9_.-]+)\}").unwrap();
}

/// A handler that runs a shell line.
#[derive(Debug, Clone)]
pub struct ScriptHandler {
    line: String,
}

impl ScriptHandler {
    /// Creates a handler for `line`.
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }
}

#[async_trait]
impl Handler for ScriptHandler {
    async fn run(&self, ctx: Arc<Context>, args: BoundArgs) -> Result<()> {
        run_script(&self.line, &ctx, &args.positionals).await
    }
}

/// A middleware that runs a shell line; a zero exit status proceeds.
#[derive(Debug, Clone)]
pub struct ScriptMiddleware {
    line: String,
}

impl ScriptMiddleware {
    /// Creates a middleware for `line`.
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }
}

#[async_trait]
impl Middleware for ScriptMiddleware {
    async fn call(&self, ctx: Arc<Context>) -> Result<()> {
        run_script(&self.line, &ctx, ctx.positionals()).await
    }
}

async fn run_script(line: &str, ctx: &Context, positionals: &[String]) -> Result<()> {
    let rendered = render_line(line, ctx, positionals)?;
    let env = script_env(ctx);

    let output = executor::execute_command(&rendered, &ctx.program.root, &env, &ctx.cancel)
        .await
        .map_err(|e| match e {
            ExecutionError::Cancelled => anyhow::Error::new(Error::Cancelled),
            other => anyhow::Error::new(other),
        })?;

    ctx.program.stdout.write_str(&output)?;
    Ok(())
}

/// Expands `{name}` (option value), `{N}` (positional N) and `{args}`
/// (all positionals). Values are shell-quoted; missing values expand to nothing.
/// Shell parameter expansions such as `${HOME}` are left alone.
pub fn render_line(line: &str, ctx: &Context, positionals: &[String]) -> Result<String> {
    let mut failure = None;
    let rendered = PLACEHOLDER_RE.replace_all(line, |caps: &Captures<'_>| {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let start = caps.get(0).map_or(0, |m| m.start());
        if line.get(..start).is_some_and(|before| before.ends_with('$')) {
            return whole.to_string();
        }

        let key = caps.get(1).map_or("", |m| m.as_str());
        let values: Vec<&str> = if key == "args" {
            positionals.iter().map(String::as_str).collect()
        } else if let Ok(index) = key.parse::<usize>() {
            positionals.get(index).map(String::as_str).into_iter().collect()
        } else {
            ctx.option(key)
                .or_else(|| ctx.global(key))
                .and_then(|value| match value {
                    OptionValue::Str(s) => Some(s.as_str()),
                    OptionValue::Bool(true) => Some("true"),
                    OptionValue::Bool(false) => Some("false"),
                })
                .into_iter()
                .collect()
        };

        match shlex::try_join(values) {
            Ok(joined) => joined,
            Err(e) => {
                failure = Some(anyhow!("Cannot quote value for '{{{}}}': {}", key, e));
                String::new()
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(rendered.into_owned()),
    }
}

/// Environment for scripts: the command and program names, and one
/// `CLIROUTE_OPT_<NAME>` per resolved option.
pub fn script_env(ctx: &Context) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert(ENV_COMMAND.to_string(), ctx.command_name());
    env.insert(ENV_PROGRAM.to_string(), ctx.program.name.clone());

    let options = ctx
        .invocation
        .global_options
        .iter()
        .chain(&ctx.invocation.command_options);
    for (name, value) in options {
        let key = format!(
            "{}{}",
            ENV_OPTION_PREFIX,
            name.to_uppercase().replace(['-', '.'], "_")
        );
        env.insert(key, value.to_string());
    }
    env
}
