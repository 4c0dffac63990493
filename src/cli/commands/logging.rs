//! `-v` flag and `GATEHOUSE_LOG_LEVEL`.
//!
//! Each `-v` raises the level by one step from the quiet default. The
//! environment variable takes either a level name or its step number.

use clap::{builder::ValueParser, Arg, ArgAction, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names, indexed by step.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

fn parse_level(value: &str) -> Result<u8, String> {
    let value = value.trim();
    let step = value.parse::<usize>().ok().or_else(|| {
        LEVEL_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(value))
    });

    step.filter(|step| *step < LEVEL_NAMES.len())
        .and_then(|step| u8::try_from(step).ok())
        .ok_or_else(|| {
            format!(
                "invalid log level '{value}', expected one of {} or 0-{}",
                LEVEL_NAMES.join(", "),
                LEVEL_NAMES.len() - 1
            )
        })
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::new(parse_level)
}

/// Tracing level for a verbosity step; `None` keeps the default (errors only).
#[must_use]
pub const fn level(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Raise log verbosity, repeat for more (-vvv for debug)")
            .long_help(
                "Raise log verbosity: -v warn, -vv info, -vvv debug, -vvvv trace. \
                 GATEHOUSE_LOG_LEVEL accepts a level name or step number instead.",
            )
            .env("GATEHOUSE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_env(value: &str) -> Option<u8> {
        temp_env::with_var("GATEHOUSE_LOG_LEVEL", Some(value), || {
            with_args(Command::new("gatehouse"))
                .try_get_matches_from(["gatehouse"])
                .ok()
                .and_then(|matches| matches.get_one::<u8>(ARG_VERBOSITY).copied())
        })
    }

    #[test]
    fn env_level_accepts_names_and_steps() {
        assert_eq!(from_env("error"), Some(0));
        assert_eq!(from_env("WARN"), Some(1));
        assert_eq!(from_env(" debug "), Some(3));
        assert_eq!(from_env("4"), Some(4));
        assert_eq!(from_env("loud"), None);
        assert_eq!(from_env("5"), None);
    }

    #[test]
    fn invalid_level_names_the_choices() {
        let err = parse_level("loud").err().unwrap_or_default();
        assert!(err.contains("error, warn, info, debug, trace"));
        assert!(err.contains("0-4"));
    }

    #[test]
    fn steps_map_to_tracing_levels() {
        assert_eq!(level(0), None);
        assert_eq!(level(1), Some(Level::WARN));
        assert_eq!(level(2), Some(Level::INFO));
        assert_eq!(level(3), Some(Level::DEBUG));
        assert_eq!(level(9), Some(Level::TRACE));
    }
}
