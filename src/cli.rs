// src/cli.rs

use crate::constants::ENV_ROOT;
use clap::Parser;

/// cliroute: runs a command tree described by manifests on disk.
///
/// The program root holds:
///
/// - `cli.toml`: optional program settings (name, description, delimiter,
///   global options).
/// - `commands/`: one TOML manifest per command; `commands/apps/add.toml`
///   is the command `apps add`.
/// - `middleware/`: named middleware, as `<name>.toml` manifests or
///   executables.
///
/// Every argument after the root options is handed to the program unchanged,
/// including `-h`/`--help`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_flag = true, disable_help_subcommand = true)]
pub struct Cli {
    /// The program root. Defaults to the current directory.
    #[arg(long, env = ENV_ROOT, value_name = "DIR")]
    pub root: Option<String>,

    /// Overrides the program name shown in usage lines.
    #[arg(long)]
    pub name: Option<String>,

    /// The command path, its options and its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
