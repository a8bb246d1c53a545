// src/core/arg_parser.rs

use crate::{
    core::option_schema::ParserConfig,
    models::{OptionKind, OptionValue},
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref NEGATIVE_NUMBER_RE: Regex = Regex::new(r"^-\d+(\.\d+)?$").unwrap();
}

/// The structured result of applying a [`ParserConfig`] to an argument vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    /// Canonical option name to value. Undeclared flags are kept as given.
    pub named: BTreeMap<String, OptionValue>,
    /// Tokens that are neither flags nor flag values, in order of appearance.
    pub positionals: Vec<String>,
    /// For each positional, its index in the parsed argument vector.
    pub positions: Vec<usize>,
}

/// Whether `token` would be read as a flag rather than a value.
pub fn looks_like_flag(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && !NEGATIVE_NUMBER_RE.is_match(token)
}

/// Parses `argv` against `config`.
///
/// # Logic:
/// - `--name`, `--name=value`, `-n` and `-n=value` are flags; aliases resolve to canonical
///   names before typing is applied. `-abc` sets `a`, `b` and `c`.
/// - A string flag takes the next token as its value unless that token is a
///   flag itself; without a value it becomes the empty string.
/// - A boolean flag is `true`, or takes an explicit following `true`/`false`.
///   `--no-name` sets a boolean to `false`.
/// - Undeclared flags are `true` and never take a value.
/// - Everything else is positional, as is everything after `--`.
/// - Declared booleans that are absent default to `false`; other defaults
///   apply to absent names only. The last occurrence of a flag wins.
pub fn parse(argv: &[String], config: &ParserConfig) -> ParsedArgs {
    let mut parsed = ParsedArgs::default();
    let mut tokens = argv.iter().map(String::as_str).enumerate().peekable();

    while let Some((index, token)) = tokens.next() {
        if token == "--" {
            for (index, rest) in tokens.by_ref() {
                parsed.positionals.push(rest.to_string());
                parsed.positions.push(index);
            }
            break;
        }

        if !looks_like_flag(token) {
            parsed.positionals.push(token.to_string());
            parsed.positions.push(index);
            continue;
        }

        if let Some(body) = token.strip_prefix("--") {
            let (flag, inline) = match body.split_once('=') {
                Some((flag, value)) => (flag, Some(value)),
                None => (body, None),
            };

            if inline.is_none() {
                if let Some(negated) = flag.strip_prefix("no-") {
                    let canonical = config.canonical(negated);
                    if !config.declares(config.canonical(flag))
                        && config.kind_of(canonical) != Some(OptionKind::String)
                    {
                        parsed
                            .named
                            .insert(canonical.to_string(), OptionValue::Bool(false));
                        continue;
                    }
                }
            }

            let value = read_value(config, flag, inline, &mut tokens);
            parsed
                .named
                .insert(config.canonical(flag).to_string(), value);
            continue;
        }

        // Short flags, possibly clustered: `-f`, `-abc`, `-aworld`.
        let letters = token.get(1..).unwrap_or_default();
        for (offset, letter) in letters.char_indices() {
            let flag = letter.to_string();
            let rest = letters
                .get(offset + letter.len_utf8()..)
                .unwrap_or_default();
            let canonical = config.canonical(&flag);

            if rest.is_empty() {
                let value = read_value(config, &flag, None, &mut tokens);
                parsed.named.insert(canonical.to_string(), value);
            } else if let Some(inline) = rest.strip_prefix('=') {
                // `-a=world`: the rest of the cluster is the value.
                let value = read_value(config, &flag, Some(inline), &mut tokens);
                parsed.named.insert(canonical.to_string(), value);
                break;
            } else if config.kind_of(canonical) == Some(OptionKind::String) {
                parsed
                    .named
                    .insert(canonical.to_string(), OptionValue::from(rest));
                break;
            } else {
                parsed
                    .named
                    .insert(canonical.to_string(), OptionValue::Bool(true));
            }
        }
    }

    for name in &config.booleans {
        if !parsed.named.contains_key(name) && !config.defaults.contains_key(name) {
            parsed.named.insert(name.clone(), OptionValue::Bool(false));
        }
    }
    for (name, default) in &config.defaults {
        parsed
            .named
            .entry(name.clone())
            .or_insert_with(|| default.clone());
    }

    parsed
}

fn read_value<'a, I>(
    config: &ParserConfig,
    flag: &str,
    inline: Option<&str>,
    tokens: &mut std::iter::Peekable<I>,
) -> OptionValue
where
    I: Iterator<Item = (usize, &'a str)>,
{
    match config.kind_of(config.canonical(flag)) {
        Some(OptionKind::String) => {
            if let Some(value) = inline {
                return OptionValue::from(value);
            }
            match tokens.next_if(|(_, next)| !looks_like_flag(next)) {
                Some((_, next)) => OptionValue::from(next),
                None => OptionValue::Str(String::new()),
            }
        }
        Some(OptionKind::Boolean) => {
            if let Some(value) = inline {
                return OptionValue::Bool(value != "false");
            }
            match tokens.next_if(|(_, next)| *next == "true" || *next == "false") {
                Some((_, next)) => OptionValue::Bool(next == "true"),
                None => OptionValue::Bool(true),
            }
        }
        None => inline.map_or(OptionValue::Bool(true), OptionValue::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::option_schema::compile, models::OptionSpec};

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_string_flag_consumes_adjacent_value_anywhere() {
        let config = compile(&[OptionSpec::string("stack")]).unwrap();

        for line in ["add --stack cedar some-app", "add some-app --stack cedar"] {
            let parsed = parse(&args(line), &config);
            assert_eq!(parsed.named.get("stack"), Some(&OptionValue::from("cedar")));
            assert_eq!(parsed.positionals, vec!["add", "some-app"]);
        }
    }

    #[test]
    fn test_boolean_flag_does_not_consume_positional() {
        let config = compile(&[OptionSpec::boolean("force").alias("f")]).unwrap();
        let parsed = parse(&args("destroy --force some-app"), &config);

        assert_eq!(parsed.named.get("force"), Some(&OptionValue::Bool(true)));
        assert_eq!(parsed.positionals, vec!["destroy", "some-app"]);
        assert_eq!(parsed.positions, vec![0, 2]);
    }

    #[test]
    fn test_boolean_flag_takes_explicit_literal() {
        let config = compile(&[OptionSpec::boolean("force")]).unwrap();

        let parsed = parse(&args("destroy some-app --force true"), &config);
        assert_eq!(parsed.named.get("force"), Some(&OptionValue::Bool(true)));
        assert_eq!(parsed.positionals, vec!["destroy", "some-app"]);

        let parsed = parse(&args("destroy --force false some-app"), &config);
        assert_eq!(parsed.named.get("force"), Some(&OptionValue::Bool(false)));
        assert_eq!(parsed.positionals, vec!["destroy", "some-app"]);
    }

    #[test]
    fn test_literal_true_after_undeclared_flag_stays_positional() {
        let config = ParserConfig::default();
        let parsed = parse(&args("--force true"), &config);
        assert_eq!(parsed.named.get("force"), Some(&OptionValue::Bool(true)));
        assert_eq!(parsed.positionals, vec!["true"]);
    }

    #[test]
    fn test_alias_and_canonical_forms_are_equivalent() {
        let config = compile(&[OptionSpec::boolean("force").alias("f")]).unwrap();
        assert_eq!(
            parse(&args("--force"), &config),
            parse(&args("-f"), &config)
        );
    }

    #[test]
    fn test_zero_flags_yield_defaults_and_no_positionals() {
        let config = compile(&[
            OptionSpec::string("stack").default_value("cedar"),
            OptionSpec::boolean("force"),
            OptionSpec::boolean("cache").default_value(true),
            OptionSpec::string("region"),
        ])
        .unwrap();
        let parsed = parse(&[], &config);

        assert_eq!(parsed.named.get("stack"), Some(&OptionValue::from("cedar")));
        assert_eq!(parsed.named.get("force"), Some(&OptionValue::Bool(false)));
        assert_eq!(parsed.named.get("cache"), Some(&OptionValue::Bool(true)));
        assert_eq!(parsed.named.get("region"), None);
        assert!(parsed.positionals.is_empty());
    }

    #[test]
    fn test_argv_built_from_defaults_yields_those_defaults() {
        let specs = [
            OptionSpec::string("stack").default_value("cedar"),
            OptionSpec::boolean("cache").default_value(true),
            OptionSpec::boolean("quiet").default_value(false),
        ];
        let config = compile(&specs).unwrap();
        let parsed = parse(&args("--stack cedar --cache --quiet false"), &config);

        let defaults: BTreeMap<_, _> = config.defaults.clone();
        assert_eq!(parsed.named, defaults);
    }

    #[test]
    fn test_string_flag_without_value_is_empty() {
        let config = compile(&[OptionSpec::string("stack")]).unwrap();
        let parsed = parse(&args("--stack --verbose"), &config);
        assert_eq!(parsed.named.get("stack"), Some(&OptionValue::from("")));
        assert_eq!(parsed.named.get("verbose"), Some(&OptionValue::Bool(true)));
    }

    #[test]
    fn test_inline_values_negation_and_clusters() {
        let config = compile(&[
            OptionSpec::string("app").alias("a"),
            OptionSpec::boolean("verbose").alias("v"),
            OptionSpec::boolean("cache"),
        ])
        .unwrap();

        let parsed = parse(&args("--app=world --no-cache -v"), &config);
        assert_eq!(parsed.named.get("app"), Some(&OptionValue::from("world")));
        assert_eq!(parsed.named.get("cache"), Some(&OptionValue::Bool(false)));
        assert_eq!(parsed.named.get("verbose"), Some(&OptionValue::Bool(true)));

        let parsed = parse(&args("-va world"), &config);
        assert_eq!(parsed.named.get("verbose"), Some(&OptionValue::Bool(true)));
        assert_eq!(parsed.named.get("app"), Some(&OptionValue::from("world")));

        let parsed = parse(&args("-aworld"), &config);
        assert_eq!(parsed.named.get("app"), Some(&OptionValue::from("world")));

        let parsed = parse(&args("-a=world -v=false"), &config);
        assert_eq!(parsed.named.get("app"), Some(&OptionValue::from("world")));
        assert_eq!(parsed.named.get("verbose"), Some(&OptionValue::Bool(false)));
    }

    #[test]
    fn test_terminator_dash_and_negative_numbers_are_positional() {
        let config = compile(&[OptionSpec::string("offset")]).unwrap();
        let parsed = parse(&args("--offset -5 - -- --not-a-flag"), &config);
        assert_eq!(parsed.named.get("offset"), Some(&OptionValue::from("-5")));
        assert_eq!(parsed.positionals, vec!["-", "--not-a-flag"]);
        assert_eq!(parsed.positions, vec![2, 4]);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let config = compile(&[OptionSpec::string("stack")]).unwrap();
        let parsed = parse(&args("--stack cedar --stack bamboo"), &config);
        assert_eq!(parsed.named.get("stack"), Some(&OptionValue::from("bamboo")));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let config = compile(&[OptionSpec::string("stack"), OptionSpec::boolean("force")]).unwrap();
        let argv = args("apps add --stack cedar -x some-app --force");
        assert_eq!(parse(&argv, &config), parse(&argv, &config));
    }
}
