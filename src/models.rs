// src/models.rs

use crate::{
    CancellationToken,
    core::pipeline::{Handler, Middleware},
};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fmt,
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

// --- OPTION SCHEMA ---

/// The value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// Takes the following token as its value.
    String,
    /// Present means `true`; never consumes a following token unless it is `true`/`false`.
    Boolean,
}

/// A resolved option value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// A boolean flag value.
    Bool(bool),
    /// A string value.
    Str(String),
}

impl OptionValue {
    /// `false` for `false` and the empty string, `true` otherwise.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Str(s) => !s.is_empty(),
        }
    }

    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// The declaration of a single option of a command (or of the program).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    /// The canonical key.
    pub name: String,
    /// The declared type. `None` is resolved by [`OptionSpec::effective_kind`].
    pub kind: Option<OptionKind>,
    /// Alternate flag names, each mapping to `name`.
    pub aliases: Vec<String>,
    /// Applied when the option is absent from the input.
    pub default: Option<OptionValue>,
    /// Binding fails when no value resolves.
    pub required: bool,
    /// Shown in help output.
    pub description: Option<String>,
}

impl OptionSpec {
    /// Creates an untyped option.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            aliases: Vec::new(),
            default: None,
            required: false,
            description: None,
        }
    }

    /// Creates a string option.
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            kind: Some(OptionKind::String),
            ..Self::new(name)
        }
    }

    /// Creates a boolean option.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            kind: Some(OptionKind::Boolean),
            ..Self::new(name)
        }
    }

    /// Adds an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: impl Into<OptionValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks the option as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the help description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The type used for parsing. Untyped options are booleans unless their
    /// default is a string.
    pub fn effective_kind(&self) -> OptionKind {
        match (self.kind, &self.default) {
            (Some(kind), _) => kind,
            (None, Some(OptionValue::Str(_))) => OptionKind::String,
            (None, _) => OptionKind::Boolean,
        }
    }
}

// --- MANIFEST / CONFIG INPUT SHAPES ---

/// One string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// A single value.
    One(String),
    /// Several values.
    Many(Vec<String>),
}

impl OneOrMany {
    /// Flattens into a list.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

/// The user-facing form of an option declaration.
///
/// Either a shorthand type name (`stack = "string"`) or a full table
/// (`force = { type = "boolean", alias = "f" }`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OptionInput {
    /// `"string"` or `"boolean"`.
    Shorthand(String),
    /// A full option table.
    Full(OptionTable),
}

/// The table form of [`OptionInput`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionTable {
    /// The declared type.
    #[serde(rename = "type")]
    pub kind: Option<OptionKind>,
    /// One alias or a list of aliases.
    pub alias: Option<OneOrMany>,
    /// Same as `alias`; both are merged.
    pub aliases: Option<OneOrMany>,
    /// The default value.
    pub default: Option<OptionValue>,
    /// Whether a value must resolve.
    #[serde(default)]
    pub required: bool,
    /// Help description.
    #[serde(alias = "desc")]
    pub description: Option<String>,
}

/// A command manifest (`commands/**/*.toml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandManifest {
    /// One-line description used in help listings.
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
    /// Overrides the derived usage line.
    #[serde(default)]
    pub usage: Option<String>,
    /// Middleware names, run in order before the handler.
    #[serde(default, alias = "use")]
    pub middleware: Vec<String>,
    /// Name of a handler registered with the program.
    #[serde(default)]
    pub handler: Option<String>,
    /// A shell line run as the handler.
    #[serde(default)]
    pub run: Option<String>,
    /// Option declarations, in declaration order.
    #[serde(default)]
    pub options: toml::Table,
    /// Command-local middleware, each a shell line.
    #[serde(default)]
    pub methods: BTreeMap<String, String>,
}

/// An external middleware manifest (`middleware/<name>.toml`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareManifest {
    /// Free-form description.
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
    /// The shell line to run.
    pub run: String,
}

/// Program settings, optionally loaded from `cli.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProgramConfig {
    /// Program name shown in usage lines. Defaults to the executable name.
    pub name: Option<String>,
    /// The program root; commands and middleware are looked up below it.
    pub path: Option<PathBuf>,
    /// Root description shown in help.
    #[serde(alias = "desc")]
    pub description: Option<String>,
    /// Separator between command path segments.
    pub delimiter: String,
    /// Global option declarations.
    pub options: toml::Table,
    /// Optional per-middleware deadline.
    pub middleware_timeout_ms: Option<u64>,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            name: None,
            path: None,
            description: None,
            delimiter: crate::constants::DEFAULT_DELIMITER.to_string(),
            options: toml::Table::new(),
            middleware_timeout_ms: None,
        }
    }
}

// --- COMMANDS ---

/// A middleware reference in a command's chain.
#[derive(Clone)]
pub enum MiddlewareRef {
    /// Resolved against the command's methods, then the external loader.
    Named(String),
    /// Called directly.
    Inline(Arc<dyn Middleware>),
}

impl MiddlewareRef {
    /// A label for logs and timeout errors.
    pub fn label(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Inline(_) => "<inline>",
        }
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Inline(_) => f.write_str("Inline(..)"),
        }
    }
}

/// A registered command.
#[derive(Clone)]
pub struct CommandDefinition {
    /// Path segments, e.g. `["apps", "add"]`.
    pub name_path: Vec<String>,
    /// Shown in help listings.
    pub description: Option<String>,
    /// Overrides the derived usage line.
    pub usage: Option<String>,
    /// Option declarations in declaration order. Handler arguments follow this order.
    pub options: Vec<OptionSpec>,
    /// Run in order before the handler.
    pub middleware: Vec<MiddlewareRef>,
    /// Command-local middleware addressable by name.
    pub methods: BTreeMap<String, Arc<dyn Middleware>>,
    /// The terminal handler.
    pub handler: Arc<dyn Handler>,
}

impl CommandDefinition {
    /// Creates a command at `path` with the given handler.
    pub fn new<I, S>(path: I, handler: impl Handler + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_handler(path, Arc::new(handler))
    }

    /// Creates a command from an already shared handler.
    pub fn with_handler<I, S>(path: I, handler: Arc<dyn Handler>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name_path: path.into_iter().map(Into::into).collect(),
            description: None,
            usage: None,
            options: Vec::new(),
            middleware: Vec::new(),
            methods: BTreeMap::new(),
            handler,
        }
    }

    /// Sets the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Overrides the usage line.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    /// Declares an option.
    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.options.push(spec);
        self
    }

    /// Appends a named middleware to the chain.
    pub fn use_named(mut self, name: impl Into<String>) -> Self {
        self.middleware.push(MiddlewareRef::Named(name.into()));
        self
    }

    /// Appends an inline middleware to the chain.
    pub fn use_inline(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware
            .push(MiddlewareRef::Inline(Arc::new(middleware)));
        self
    }

    /// Adds a command-local middleware addressable by name.
    pub fn method(mut self, name: impl Into<String>, middleware: impl Middleware + 'static) -> Self {
        self.methods.insert(name.into(), Arc::new(middleware));
        self
    }

    /// The path joined with `delimiter`, e.g. `apps add`.
    pub fn display_name(&self, delimiter: &str) -> String {
        self.name_path.join(delimiter)
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name_path", &self.name_path)
            .field("description", &self.description)
            .field("usage", &self.usage)
            .field("options", &self.options)
            .field("middleware", &self.middleware)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// --- INVOCATION ---

/// The structured result of parsing one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInvocation {
    /// Values of the program's global options.
    pub global_options: BTreeMap<String, OptionValue>,
    /// Values of the command's options, plus any undeclared flags.
    pub command_options: BTreeMap<String, OptionValue>,
    /// Leftover tokens after the command path, in original order.
    pub positionals: Vec<String>,
}

/// Arguments bound for the terminal handler: declared options in
/// declaration order, then positionals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArgs {
    /// `(name, value)` for every declared option.
    pub options: Vec<(String, Option<OptionValue>)>,
    /// Leftover positional tokens.
    pub positionals: Vec<String>,
}

impl BoundArgs {
    /// The value bound to a declared option.
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    /// The string value of an option.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.option(name).and_then(OptionValue::as_str)
    }

    /// Whether a boolean option is set.
    pub fn flag(&self, name: &str) -> bool {
        self.option(name).is_some_and(OptionValue::is_truthy)
    }

    /// A positional argument by index.
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positionals.get(index).map(String::as_str)
    }

    /// Every bound value rendered as text, options first. Unset options render as `undefined`.
    pub fn values(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|(_, v)| {
                v.as_ref()
                    .map_or_else(|| "undefined".to_string(), ToString::to_string)
            })
            .chain(self.positionals.iter().cloned())
            .collect()
    }
}

/// Where a program writes its output.
#[derive(Debug, Clone)]
pub enum Output {
    /// The process's standard output.
    Stdout,
    /// The process's standard error.
    Stderr,
    /// An in-memory buffer.
    Memory(Arc<Mutex<Vec<u8>>>),
}

impl Output {
    /// A new, empty in-memory buffer.
    pub fn memory() -> Self {
        Self::Memory(Arc::new(Mutex::new(Vec::new())))
    }

    /// Writes `text` verbatim.
    pub fn write_str(&self, text: &str) -> io::Result<()> {
        match self {
            Self::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes())?;
                out.flush()
            }
            Self::Stderr => io::stderr().lock().write_all(text.as_bytes()),
            Self::Memory(buffer) => {
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(text.as_bytes());
                Ok(())
            }
        }
    }

    /// Writes `line` followed by a newline.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        self.write_str(&format!("{}\n", line))
    }

    /// Everything written so far to an in-memory buffer. Empty for process streams.
    pub fn contents(&self) -> String {
        match self {
            Self::Memory(buffer) => {
                String::from_utf8_lossy(&buffer.lock().unwrap_or_else(PoisonError::into_inner))
                    .into_owned()
            }
            _ => String::new(),
        }
    }
}

/// Program-level facts handed to middleware and handlers.
#[derive(Debug, Clone)]
pub struct ProgramInfo {
    /// The program name.
    pub name: String,
    /// The program root directory.
    pub root: PathBuf,
    /// Separator between command path segments.
    pub delimiter: String,
    /// Standard output sink.
    pub stdout: Output,
    /// Diagnostic sink.
    pub stderr: Output,
}

/// Everything a middleware or handler can see about the running command.
#[derive(Debug)]
pub struct Context {
    /// The owning program.
    pub program: ProgramInfo,
    /// The matched command.
    pub command: Arc<CommandDefinition>,
    /// Parsed option values and positionals.
    pub invocation: ParsedInvocation,
    /// Alias to canonical name for the program's global options.
    pub global_aliases: BTreeMap<String, String>,
    /// Alias to canonical name for the command's own options.
    pub command_aliases: BTreeMap<String, String>,
    /// Raised when the invocation should stop.
    pub cancel: CancellationToken,
}

fn canonical<'a>(aliases: &'a BTreeMap<String, String>, name: &'a str) -> &'a str {
    aliases.get(name).map_or(name, String::as_str)
}

impl Context {
    /// The display name of the running command.
    pub fn command_name(&self) -> String {
        self.command.display_name(&self.program.delimiter)
    }

    /// A command option by canonical name or alias.
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.invocation
            .command_options
            .get(canonical(&self.command_aliases, name))
    }

    /// A global option by canonical name or alias.
    pub fn global(&self, name: &str) -> Option<&OptionValue> {
        self.invocation
            .global_options
            .get(canonical(&self.global_aliases, name))
    }

    /// Positional arguments following the command path.
    pub fn positionals(&self) -> &[String] {
        &self.invocation.positionals
    }

    /// Writes a line to the program's standard output.
    pub fn println(&self, line: &str) -> io::Result<()> {
        self.program.stdout.write_line(line)
    }
}

// --- HELP ---

/// One row of a help command listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubcommandEntry {
    /// The command's display name.
    pub name: String,
    /// The command's description.
    pub description: String,
}

/// Everything a help renderer needs for the root or a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpData {
    /// The usage line.
    pub usage: String,
    /// The description paragraph.
    pub description: String,
    /// Declared options.
    pub options: Vec<OptionSpec>,
    /// Nested commands.
    pub subcommands: Vec<SubcommandEntry>,
}
