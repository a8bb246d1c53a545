// src/constants.rs

/// The directory (under the program root) holding command manifests.
pub const COMMANDS_DIR: &str = "commands";

/// The directory (under the program root) holding external middleware.
pub const MIDDLEWARE_DIR: &str = "middleware";

/// The extension of command and middleware manifests.
pub const MANIFEST_EXTENSION: &str = "toml";

/// A manifest with this file stem names its parent directory's command.
pub const INDEX_MANIFEST_STEM: &str = "index";

/// The optional program configuration file (in the program root).
pub const PROGRAM_CONFIG_FILENAME: &str = "cli.toml";

/// The default separator between command path segments.
pub const DEFAULT_DELIMITER: &str = " ";

/// The built-in global option that requests help output.
pub const HELP_OPTION: &str = "help";

/// The short alias of [`HELP_OPTION`].
pub const HELP_ALIAS: &str = "h";

/// Environment variable carrying the invoked command name to scripts.
pub const ENV_COMMAND: &str = "CLIROUTE_COMMAND";

/// Environment variable carrying the program name to scripts.
pub const ENV_PROGRAM: &str = "CLIROUTE_PROGRAM";

/// Prefix of the per-option environment variables passed to scripts.
pub const ENV_OPTION_PREFIX: &str = "CLIROUTE_OPT_";

/// Environment variable the binary reads its default root from.
pub const ENV_ROOT: &str = "CLIROUTE_ROOT";

/// Exit code used when the invocation was interrupted.
pub const EXIT_INTERRUPTED: i32 = 130;
