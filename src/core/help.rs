// src/core/help.rs

//! # Help
//!
//! Builds [`HelpData`] for the root and for single commands, and renders it
//! as two-column text tables.

use crate::{
    core::registry::Registry,
    models::{CommandDefinition, HelpData, OptionKind, OptionSpec, SubcommandEntry},
};

/// Help for the program root: every top-level command and the global options.
pub fn root_help(
    program: &str,
    description: Option<&str>,
    global_options: &[OptionSpec],
    registry: &Registry,
    delimiter: &str,
) -> HelpData {
    HelpData {
        usage: format!(t!("usage.root"), program = program),
        description: description.unwrap_or_default().to_string(),
        options: global_options.to_vec(),
        subcommands: listing(registry, &[] as &[String], delimiter),
    }
}

/// Help for one command: its usage, options and nearest subcommands.
pub fn command_help(
    program: &str,
    command: &CommandDefinition,
    registry: &Registry,
    delimiter: &str,
) -> HelpData {
    let usage = command.usage.clone().unwrap_or_else(|| {
        format!(
            t!("usage.command"),
            program = program,
            command = command.display_name(delimiter)
        )
    });
    HelpData {
        usage,
        description: command.description.clone().unwrap_or_default(),
        options: command.options.clone(),
        subcommands: listing(registry, &command.name_path, delimiter),
    }
}

fn listing(registry: &Registry, prefix: &[String], delimiter: &str) -> Vec<SubcommandEntry> {
    registry
        .nearest_descendants(prefix)
        .into_iter()
        .map(|entry| SubcommandEntry {
            name: entry.definition.display_name(delimiter),
            description: entry.definition.description.clone().unwrap_or_default(),
        })
        .collect()
}

/// Renders help text. `is_root` picks the heading of the command section.
pub fn render(data: &HelpData, is_root: bool) -> String {
    let mut sections = vec![format!(t!("help.usage"), usage = data.usage)];
    if !data.description.is_empty() {
        sections.push(format!("  {}", data.description));
    }

    if !data.subcommands.is_empty() {
        let heading = if is_root {
            t!("help.commands.root")
        } else {
            t!("help.commands.sub")
        };
        let rows: Vec<(String, String)> = data
            .subcommands
            .iter()
            .map(|entry| (entry.name.clone(), entry.description.clone()))
            .collect();
        sections.push(heading.to_string());
        sections.push(table(&rows));
    }

    if !data.options.is_empty() {
        let rows: Vec<(String, String)> = data
            .options
            .iter()
            .map(|spec| (flag_column(spec), describe_option(spec)))
            .collect();
        sections.push(t!("help.options").to_string());
        sections.push(table(&rows));
    }

    let mut text = sections.join("\n\n");
    text.push('\n');
    text
}

fn flag_column(spec: &OptionSpec) -> String {
    let mut flags: Vec<String> = spec.aliases.iter().map(|alias| dashed(alias)).collect();
    flags.push(dashed(&spec.name));
    let mut column = flags.join(", ");
    if spec.effective_kind() == OptionKind::String {
        column.push_str(&format!(" <{}>", spec.name));
    }
    column
}

fn dashed(name: &str) -> String {
    if name.chars().count() == 1 {
        format!("-{}", name)
    } else {
        format!("--{}", name)
    }
}

fn describe_option(spec: &OptionSpec) -> String {
    let mut text = spec.description.clone().unwrap_or_default();
    if let Some(default) = &spec.default {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&format!("(default: {})", default));
    }
    text
}

/// Left column padded to the longest entry plus two spaces.
fn table(rows: &[(String, String)]) -> String {
    let width = rows
        .iter()
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0);
    rows.iter()
        .map(|(name, description)| {
            format!("{:<width$}  {}", name, description, width = width)
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::handler_fn;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        for (path, description) in [
            ("apps add", "Create a new app"),
            ("apps destroy", "Destroy application"),
            ("apps", "List applications"),
            ("generate key", "Generate new key"),
            ("generate project", "Generate new project"),
        ] {
            registry
                .register(
                    CommandDefinition::new(path.split(' '), handler_fn(|_, _| async { Ok(()) }))
                        .describe(description),
                )
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_root_help_lists_nearest_commands() {
        let data = root_help("hello-world", Some("Hello World application"), &[], &registry(), " ");
        let text = render(&data, true);
        assert_eq!(
            text,
            "Usage: hello-world [options] <command>\n\n  Hello World application\n\nAvailable commands:\n\n\
             apps              List applications\n\
             generate key      Generate new key\n\
             generate project  Generate new project\n"
        );
    }

    #[test]
    fn test_command_help_uses_derived_usage_and_sub_heading() {
        let registry = registry();
        let apps = registry.lookup(&["apps"]).unwrap();
        let data = command_help("hello-world", &apps.definition, &registry, " ");
        assert_eq!(data.usage, "hello-world apps [OPTIONS]");
        let text = render(&data, false);
        assert!(text.starts_with("Usage: hello-world apps [OPTIONS]\n\n  List applications\n\n"));
        assert!(text.contains("Additional commands:\n\napps add      Create a new app\n"));
        assert!(text.contains("apps destroy  Destroy application\n"));
    }

    #[test]
    fn test_options_section_shows_flags_and_defaults() {
        let data = HelpData {
            usage: "hello-world apps add [OPTIONS]".into(),
            description: String::new(),
            options: vec![
                OptionSpec::boolean("help").alias("h").describe("Display help"),
                OptionSpec::string("stack").default_value("cedar"),
            ],
            subcommands: vec![],
        };
        assert_eq!(
            render(&data, false),
            "Usage: hello-world apps add [OPTIONS]\n\nOptions:\n\n\
             -h, --help       Display help\n\
             --stack <stack>  (default: cedar)\n"
        );
    }

    #[test]
    fn test_usage_override_wins() {
        let registry = registry();
        let command = CommandDefinition::new(["deploy"], handler_fn(|_, _| async { Ok(()) }))
            .usage("hello-world deploy <app>");
        let data = command_help("hello-world", &command, &registry, " ");
        assert_eq!(data.usage, "hello-world deploy <app>");
        assert!(data.subcommands.is_empty());
    }
}
