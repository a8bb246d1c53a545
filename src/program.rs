// src/program.rs

//! # Program
//!
//! The top-level object: program settings, the global option schema, the
//! command registry and the middleware loader. [`Program::run`] routes one
//! argument vector, prints help or executes the matched command.

use crate::{
    CancellationToken,
    constants::{HELP_ALIAS, HELP_OPTION},
    core::{
        arg_parser, config_loader,
        discovery::{self, HandlerTable},
        help,
        option_schema::{self, ParserConfig},
        pipeline::{Pipeline, PipelineSettings},
        registry::{RegisteredCommand, Registry},
        router,
    },
    error::{Error, Result, Severity},
    models::{
        CommandDefinition, Context, HelpData, OptionSpec, OptionValue, Output, ParsedInvocation,
        ProgramConfig, ProgramInfo,
    },
    system::loader::{DirectoryLoader, MiddlewareLoader},
};
use colored::Colorize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};

/// What a successful [`Program::run`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The matched command ran to completion.
    Completed,
    /// Help text was printed instead.
    Help,
}

/// A command-line program built from registered commands.
#[derive(Debug)]
pub struct Program {
    name: String,
    root: PathBuf,
    description: Option<String>,
    delimiter: String,
    global_options: Vec<OptionSpec>,
    global_parser: ParserConfig,
    registry: Registry,
    /// `None` loads from `<root>/middleware`.
    loader: Option<Box<dyn MiddlewareLoader>>,
    stdout: Output,
    stderr: Output,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Program {
    /// Creates a program from explicit settings.
    ///
    /// # Errors
    /// [`Error::Configuration`] if the global option schema is invalid.
    pub fn new(config: ProgramConfig) -> Result<Self> {
        let root = match config.path {
            Some(path) => path,
            None => std::env::current_dir()?,
        };

        let declared = option_schema::specs_from_table(&config.options)?;
        let mut global_options = Vec::with_capacity(declared.len() + 1);
        if !declared.iter().any(|spec| spec.name == HELP_OPTION) {
            global_options.push(
                OptionSpec::boolean(HELP_OPTION)
                    .alias(HELP_ALIAS)
                    .describe(t!("help.option.help")),
            );
        }
        global_options.extend(declared);
        let global_parser = option_schema::compile(&global_options)?;

        Ok(Self {
            name: config
                .name
                .unwrap_or_else(config_loader::default_program_name),
            root,
            description: config.description,
            delimiter: config.delimiter,
            global_options,
            global_parser,
            registry: Registry::new(),
            loader: None,
            stdout: Output::Stdout,
            stderr: Output::Stderr,
            timeout: config.middleware_timeout_ms.map(Duration::from_millis),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Creates a program rooted at `root`, reading `<root>/cli.toml` if present.
    pub fn load(root: &Path) -> Result<Self> {
        Self::new(config_loader::load_program_config(root)?)
    }

    // --- SETTINGS ---

    /// The name shown in usage lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the name shown in usage lines.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The program root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sets the program root. Commands already registered are kept.
    pub fn set_root(&mut self, root: impl Into<PathBuf>) {
        self.root = root.into();
    }

    /// The separator between command path segments.
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Sets the separator between command path segments.
    pub fn set_delimiter(&mut self, delimiter: impl Into<String>) {
        self.delimiter = delimiter.into();
    }

    /// The root description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Sets the root description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Where help text and command output go.
    pub fn stdout(&self) -> &Output {
        &self.stdout
    }

    /// Redirects help text and command output.
    pub fn set_stdout(&mut self, output: Output) {
        self.stdout = output;
    }

    /// Where diagnostics go.
    pub fn stderr(&self) -> &Output {
        &self.stderr
    }

    /// Redirects diagnostics.
    pub fn set_stderr(&mut self, output: Output) {
        self.stderr = output;
    }

    /// Sets the deadline for each middleware and handler. `None` waits forever.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Replaces the middleware loader.
    pub fn set_loader(&mut self, loader: impl MiddlewareLoader + 'static) {
        self.loader = Some(Box::new(loader));
    }

    /// The token that stops a running invocation when raised.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Shares an externally owned cancellation token.
    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// The global option declarations, including the built-in `help`.
    pub fn global_options(&self) -> &[OptionSpec] {
        &self.global_options
    }

    /// Declares another global option.
    ///
    /// # Errors
    /// [`Error::Configuration`] if it collides with an existing option; the
    /// schema is left unchanged.
    pub fn add_global_option(&mut self, spec: OptionSpec) -> Result<()> {
        let mut options = self.global_options.clone();
        options.push(spec);
        self.global_parser = option_schema::compile(&options)?;
        self.global_options = options;
        Ok(())
    }

    // --- COMMANDS ---

    /// Registers a command.
    pub fn register(&mut self, definition: CommandDefinition) -> Result<()> {
        self.registry.register(definition)
    }

    /// Registers every command described under `<root>/commands`.
    ///
    /// Returns how many commands were added.
    pub fn discover(&mut self, handlers: &HandlerTable) -> Result<usize> {
        let definitions = discovery::discover(&self.root, handlers)?;
        let count = definitions.len();
        self.registry.extend(definitions)?;
        log::debug!("Discovered {} command(s) under '{}'", count, self.root.display());
        Ok(count)
    }

    /// The registered commands.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // --- HELP ---

    /// Help data for the root (empty `path`) or for the command at `path`.
    pub fn help(&self, path: &[String]) -> Option<HelpData> {
        if path.is_empty() {
            return Some(self.root_help());
        }
        self.registry
            .lookup(path)
            .map(|entry| self.command_help(&entry.definition))
    }

    fn root_help(&self) -> HelpData {
        help::root_help(
            &self.name,
            self.description.as_deref(),
            &self.global_options,
            &self.registry,
            &self.delimiter,
        )
    }

    fn command_help(&self, command: &CommandDefinition) -> HelpData {
        help::command_help(&self.name, command, &self.registry, &self.delimiter)
    }

    // --- EXECUTION ---

    /// Routes `argv` (user tokens only, without the executable) and runs it.
    ///
    /// # Errors
    /// [`Error::CommandNotFound`] if nothing matches, and whatever the
    /// pipeline reports for the matched command.
    pub async fn run(&self, argv: &[String]) -> Result<Outcome> {
        log::debug!("{} invoked with {:?}", self.name, argv);
        let route = router::resolve(argv, &self.registry, &self.global_parser, &self.delimiter);

        let Some(entry) = route.command else {
            if route.is_help {
                self.stdout.write_str(&help::render(&self.root_help(), true))?;
                return Ok(Outcome::Help);
            }
            return Err(Error::CommandNotFound(
                route.global.positionals.join(&self.delimiter),
            ));
        };

        if route.is_help {
            let data = self.command_help(&entry.definition);
            self.stdout.write_str(&help::render(&data, false))?;
            return Ok(Outcome::Help);
        }

        let ctx = self.context(entry, &route.remaining, route.global.named);
        let default_loader = DirectoryLoader::new(&self.root);
        let loader: &dyn MiddlewareLoader = match &self.loader {
            Some(custom) => custom.as_ref(),
            None => &default_loader,
        };
        let settings = PipelineSettings {
            timeout: self.timeout,
        };
        Pipeline::new(loader, settings).execute(ctx).await?;
        Ok(Outcome::Completed)
    }

    /// Parses the command's share of the arguments and builds its context.
    fn context(
        &self,
        entry: &RegisteredCommand,
        remaining: &[String],
        global_values: BTreeMap<String, OptionValue>,
    ) -> Context {
        let tokenizer = entry.parser.layered_over(&self.global_parser);
        let parsed = arg_parser::parse(remaining, &tokenizer);

        // Undeclared flags belong to the command.
        let command_options = parsed
            .named
            .into_iter()
            .filter(|(name, _)| entry.parser.declares(name) || !self.global_parser.declares(name))
            .collect();
        let global_options = global_values
            .into_iter()
            .filter(|(name, _)| self.global_parser.declares(name))
            .collect();

        Context {
            program: ProgramInfo {
                name: self.name.clone(),
                root: self.root.clone(),
                delimiter: self.delimiter.clone(),
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
            },
            command: entry.definition.clone(),
            invocation: ParsedInvocation {
                global_options,
                command_options,
                positionals: parsed.positionals,
            },
            global_aliases: self.global_parser.aliases.clone(),
            command_aliases: entry.parser.aliases.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Runs `argv`, reports any failure on stderr and returns the exit code.
    pub async fn main(&self, argv: &[String]) -> i32 {
        match self.run(argv).await {
            Ok(_) => 0,
            Err(error) => {
                self.report(&error);
                error.exit_code()
            }
        }
    }

    /// Writes `error` to stderr as `error<TAB>message`.
    pub fn report(&self, error: &Error) {
        log::debug!("{} failed: {:?}", self.name, error);
        let label = match self.stderr {
            Output::Memory(_) => t!("diag.label").to_string(),
            _ => t!("diag.label").red().bold().to_string(),
        };
        let message = match error.severity() {
            Severity::Diagnostic => error.to_string(),
            Severity::Fault => format!("{}: {}", t!("diag.fault"), error),
        };
        if let Err(e) = self.stderr.write_line(&format!("{}\t{}", label, message)) {
            log::warn!("Could not write diagnostic: {}", e);
        }
    }
}
