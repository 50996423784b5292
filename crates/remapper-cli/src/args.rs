//! Manual argv pre-parsing for the exec-wrapper grammar.
//!
//! `remapper [--debug-log <file>] <target-dir> <mapping>... -- <program>
//! [args...]`, with a special case when `--` is absent: exactly one mapping
//! is expected (`remapper <target-dir> <mapping> <program> [args...]`). Pure
//! `clap` derive positionals can't express this — a greedy mapping list
//! would also swallow the program name — so this mirrors the original C
//! CLI's hand-rolled index walk directly instead of fighting the derive
//! macros into an ambiguous shape.

use std::path::PathBuf;

use crate::error::CliError;

/// The exec-wrapper invocation, fully parsed but not yet resolved (paths
/// are still exactly what the user typed — `paths::make_absolute` and
/// tilde-expansion happen afterward).
pub struct ParsedArgs {
    /// `--debug-log <file>`, or `$DEBUG_LOG` if the flag was absent.
    pub debug_log: Option<PathBuf>,
    /// The directory matched entries redirect into, as the user typed it.
    pub target_dir: String,
    /// One or more mapping entries, as the user typed them.
    pub mappings: Vec<String>,
    /// The program to exec, followed by its own arguments.
    pub program: Vec<String>,
}

/// Parse everything after the program name, per the grammar above.
pub fn parse(rest: &[String]) -> Result<ParsedArgs, CliError> {
    let mut idx = 0;
    let mut debug_log = std::env::var_os("DEBUG_LOG").map(PathBuf::from);

    while idx < rest.len() {
        let arg = rest[idx].as_str();
        if arg == "--" || !arg.starts_with('-') {
            break;
        }
        if let Some(value) = arg.strip_prefix("--debug-log=") {
            debug_log = Some(PathBuf::from(value));
            idx += 1;
        } else if arg == "--debug-log" {
            let value = rest.get(idx + 1).ok_or(CliError::MissingDebugLogValue)?;
            debug_log = Some(PathBuf::from(value));
            idx += 2;
        } else {
            return Err(CliError::UnknownOption(arg.to_string()));
        }
    }

    if rest.len() - idx < 3 {
        return Err(CliError::NotEnoughArguments);
    }

    let target_dir = rest[idx].clone();
    idx += 1;

    let sep = rest[idx..].iter().position(|a| a == "--");
    let (mappings, program) = match sep {
        Some(offset) => {
            let sep_idx = idx + offset;
            (rest[idx..sep_idx].to_vec(), rest[sep_idx + 1..].to_vec())
        }
        None => {
            if rest.len() - idx < 2 {
                return Err(CliError::NoCommand);
            }
            (vec![rest[idx].clone()], rest[idx + 1..].to_vec())
        }
    };

    if mappings.is_empty() {
        return Err(CliError::NoMappings);
    }
    if program.is_empty() {
        return Err(CliError::NoCommand);
    }

    Ok(ParsedArgs { debug_log, target_dir, mappings, program })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explicit_separator_form() {
        let rest: Vec<String> = ["~/v1", "~/.claude*", "~/.config*", "--", "claude", "--flag"]
            .into_iter()
            .map(String::from)
            .collect();
        let parsed = parse(&rest).unwrap();
        assert_eq!(parsed.target_dir, "~/v1");
        assert_eq!(parsed.mappings, vec!["~/.claude*", "~/.config*"]);
        assert_eq!(parsed.program, vec!["claude", "--flag"]);
    }

    #[test]
    fn parses_implicit_single_mapping_form() {
        let rest: Vec<String> = ["~/v1", "~/.codex*", "codex", "--model", "X"]
            .into_iter()
            .map(String::from)
            .collect();
        let parsed = parse(&rest).unwrap();
        assert_eq!(parsed.mappings, vec!["~/.codex*"]);
        assert_eq!(parsed.program, vec!["codex", "--model", "X"]);
    }

    #[test]
    fn parses_debug_log_flag_before_positionals() {
        let rest: Vec<String> = ["--debug-log", "/tmp/rmp.log", "/t", "/h/.dummy*", "--", "echo"]
            .into_iter()
            .map(String::from)
            .collect();
        let parsed = parse(&rest).unwrap();
        assert_eq!(parsed.debug_log, Some(PathBuf::from("/tmp/rmp.log")));
        assert_eq!(parsed.target_dir, "/t");
    }

    #[test]
    fn rejects_too_few_arguments() {
        let rest: Vec<String> = ["/t", "/h/.dummy*"].into_iter().map(String::from).collect();
        assert!(matches!(parse(&rest), Err(CliError::NotEnoughArguments)));
    }

    #[test]
    fn rejects_missing_command_after_separator() {
        let rest: Vec<String> = ["/t", "/h/.dummy*", "--"].into_iter().map(String::from).collect();
        assert!(matches!(parse(&rest), Err(CliError::NoCommand)));
    }

    #[test]
    fn rejects_empty_mapping_list_before_separator() {
        let rest: Vec<String> = ["/t", "--", "echo"].into_iter().map(String::from).collect();
        assert!(matches!(parse(&rest), Err(CliError::NoMappings)));
    }

    #[test]
    fn rejects_unknown_option() {
        let rest: Vec<String> = ["--bogus", "/t", "/h/.dummy*", "--", "echo"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!(matches!(parse(&rest), Err(CliError::UnknownOption(_))));
    }
}
