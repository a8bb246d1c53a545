// src/core/router.rs

//! # Router
//!
//! Maps a raw argument vector to a registered command. Command path tokens
//! are the leading positionals (global flags and their values are skipped),
//! and the deepest registered path wins: `apps create hello` tries
//! `apps create hello`, then `apps create`, then `apps`.

use crate::{
    constants::HELP_OPTION,
    core::{
        arg_parser::{self, ParsedArgs},
        option_schema::ParserConfig,
        registry::{RegisteredCommand, Registry},
    },
    models::OptionValue,
};

/// The outcome of routing one argument vector.
#[derive(Debug, Clone)]
pub struct Route<'r> {
    /// The matched command, if any.
    pub command: Option<&'r RegisteredCommand>,
    /// Whether help was requested (no arguments at all, or a help flag).
    pub is_help: bool,
    /// The argument vector without the matched path tokens, flags included.
    pub remaining: Vec<String>,
    /// The argument vector parsed against the global options.
    pub global: ParsedArgs,
}

/// Resolves `argv` (user tokens only) against `registry`.
///
/// With a delimiter other than a space, the first positional token is split
/// on it before matching, so `apps:add` routes like `apps add`.
pub fn resolve<'r>(
    argv: &[String],
    registry: &'r Registry,
    global: &ParserConfig,
    delimiter: &str,
) -> Route<'r> {
    let argv = split_first_positional(argv, global, delimiter);
    let parsed = arg_parser::parse(&argv, global);
    let help_flag = parsed
        .named
        .get(HELP_OPTION)
        .is_some_and(OptionValue::is_truthy);

    if parsed.positionals.is_empty() {
        log::debug!("No command tokens; showing root help");
        return Route {
            command: None,
            is_help: true,
            remaining: argv,
            global: parsed,
        };
    }

    let deepest = registry.level().min(parsed.positionals.len());
    let matched = (1..=deepest).rev().find_map(|depth| {
        let candidate = parsed.positionals.get(..depth)?;
        registry.lookup(candidate).map(|command| (depth, command))
    });

    let Some((depth, command)) = matched else {
        log::debug!("No command matches {:?}", parsed.positionals);
        return Route {
            command: None,
            is_help: help_flag,
            remaining: argv,
            global: parsed,
        };
    };

    log::debug!(
        "Routed {:?} to command {:?}",
        parsed.positionals,
        command.definition.name_path
    );
    let consumed = parsed.positions.get(..depth).unwrap_or_default();
    let remaining = argv
        .iter()
        .enumerate()
        .filter(|(index, _)| !consumed.contains(index))
        .map(|(_, token)| token.clone())
        .collect();

    Route {
        command: Some(command),
        is_help: help_flag,
        remaining,
        global: parsed,
    }
}

/// Splits the first positional token on `delimiter`, keeping segment order.
fn split_first_positional(argv: &[String], global: &ParserConfig, delimiter: &str) -> Vec<String> {
    if delimiter == " " || delimiter.is_empty() {
        return argv.to_vec();
    }
    let parsed = arg_parser::parse(argv, global);
    let Some(&first) = parsed.positions.first() else {
        return argv.to_vec();
    };

    let mut expanded = Vec::with_capacity(argv.len() + 2);
    for (index, token) in argv.iter().enumerate() {
        if index == first {
            expanded.extend(
                token
                    .split(delimiter)
                    .filter(|segment| !segment.is_empty())
                    .map(String::from),
            );
        } else {
            expanded.push(token.clone());
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{option_schema::compile, pipeline::handler_fn},
        models::{CommandDefinition, OptionSpec},
    };

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    fn registry(paths: &[&str]) -> Registry {
        let mut registry = Registry::new();
        for path in paths {
            registry
                .register(CommandDefinition::new(
                    path.split(' '),
                    handler_fn(|_, _| async { Ok(()) }),
                ))
                .unwrap();
        }
        registry
    }

    fn global() -> ParserConfig {
        compile(&[
            OptionSpec::boolean("help").alias("h"),
            OptionSpec::string("app").alias("a"),
        ])
        .unwrap()
    }

    fn matched(route: &Route<'_>) -> Option<String> {
        route.command.map(|c| c.definition.display_name(" "))
    }

    #[test]
    fn test_deepest_registered_path_wins() {
        let registry = registry(&["apps", "apps add"]);

        let route = resolve(&args("apps add myapp"), &registry, &global(), " ");
        assert_eq!(matched(&route).as_deref(), Some("apps add"));
        assert_eq!(route.remaining, vec!["myapp"]);

        let route = resolve(&args("apps myapp"), &registry, &global(), " ");
        assert_eq!(matched(&route).as_deref(), Some("apps"));
        assert_eq!(route.remaining, vec!["myapp"]);
    }

    #[test]
    fn test_shorter_prefix_matches_when_deeper_guess_is_unregistered() {
        let registry = registry(&["apps", "apps create", "db backups capture"]);
        let route = resolve(&args("apps create hello world"), &registry, &global(), " ");
        assert_eq!(matched(&route).as_deref(), Some("apps create"));
        assert_eq!(route.remaining, vec!["hello", "world"]);
    }

    #[test]
    fn test_every_command_resolves_to_itself_with_trailing_positionals() {
        let registry = registry(&["apps", "apps add", "apps add bulk", "generate key"]);
        for path in registry.all_paths() {
            let mut argv = path.clone();
            argv.extend(["extra".to_string(), "more".to_string()]);
            let route = resolve(&argv, &registry, &global(), " ");
            let command = route.command.unwrap();
            // `apps add` followed by `extra` must not become `apps add bulk`.
            assert_eq!(command.definition.name_path, path);
            assert_eq!(route.remaining, vec!["extra", "more"]);
        }
    }

    #[test]
    fn test_flags_are_kept_in_remaining_argv() {
        let registry = registry(&["apps add"]);
        let route = resolve(
            &args("apps add --stack cedar some-app"),
            &registry,
            &global(),
            " ",
        );
        assert_eq!(matched(&route).as_deref(), Some("apps add"));
        assert_eq!(route.remaining, vec!["--stack", "cedar", "some-app"]);
    }

    #[test]
    fn test_global_flag_values_are_not_path_tokens() {
        let registry = registry(&["generate project"]);
        let route = resolve(
            &args("--app world generate project hello"),
            &registry,
            &global(),
            " ",
        );
        assert_eq!(matched(&route).as_deref(), Some("generate project"));
        assert_eq!(route.remaining, vec!["--app", "world", "hello"]);
        assert_eq!(
            route.global.named.get("app"),
            Some(&OptionValue::from("world"))
        );
    }

    #[test]
    fn test_empty_argv_is_root_help() {
        let registry = registry(&["apps"]);
        let route = resolve(&[], &registry, &global(), " ");
        assert!(route.is_help);
        assert!(route.command.is_none());
    }

    #[test]
    fn test_help_flag_without_command_is_root_help() {
        let registry = registry(&["apps"]);
        for line in ["-h", "--help"] {
            let route = resolve(&args(line), &registry, &global(), " ");
            assert!(route.is_help);
            assert!(route.command.is_none());
        }
    }

    #[test]
    fn test_help_flag_with_command_keeps_the_command() {
        let registry = registry(&["apps", "apps add"]);
        let route = resolve(&args("apps -h"), &registry, &global(), " ");
        assert!(route.is_help);
        assert_eq!(matched(&route).as_deref(), Some("apps"));
        assert_eq!(route.remaining, vec!["-h"]);
    }

    #[test]
    fn test_unknown_command_is_not_help() {
        let registry = registry(&["apps"]);
        let route = resolve(&args("deploy now"), &registry, &global(), " ");
        assert!(route.command.is_none());
        assert!(!route.is_help);
    }

    #[test]
    fn test_custom_delimiter_splits_first_token() {
        let registry = registry(&["apps", "apps add"]);

        let route = resolve(&args("apps:add myapp"), &registry, &global(), ":");
        assert_eq!(matched(&route).as_deref(), Some("apps add"));
        assert_eq!(route.remaining, vec!["myapp"]);

        let route = resolve(&args("apps:myapp"), &registry, &global(), ":");
        assert_eq!(matched(&route).as_deref(), Some("apps"));
        assert_eq!(route.remaining, vec!["myapp"]);
    }
}
