//! Command-line interface handling for Vantage.
//!
//! Parsed with the `clap` builder API. Every management command works on the
//! database named in the configuration file.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

/// What the process should do after loading its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Register extensions and gather until a shutdown signal arrives.
    Serve,
    /// Print stored extension data as JSON, of the server or of one player.
    Dump { player: Option<String> },
    /// Print the extension catalog of the server.
    List,
    /// Remove every stored value, keeping the catalog.
    Wipe,
    /// Remove conditional values whose condition no longer holds.
    Cleanup,
}

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    pub command: CliCommand,
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::try_parse_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let command = match matches.subcommand() {
            Some(("dump", sub)) => CliCommand::Dump {
                player: sub.get_one::<String>("player").cloned(),
            },
            Some(("list", _)) => CliCommand::List,
            Some(("wipe", _)) => CliCommand::Wipe,
            Some(("cleanup", _)) => CliCommand::Cleanup,
            _ => CliCommand::Serve,
        };

        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            command,
        }
    }
}

const DEFAULT_CONFIG_PATH: &str = "vantage.toml";

fn command() -> Command {
    Command::new("vantage")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Gathers extension metrics from a live server into a dashboard database")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH)
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)")
                .global(true),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("serve").about("Register extensions and gather periodically (default)"))
        .subcommand(
            Command::new("dump")
                .about("Print stored extension data as JSON")
                .arg(
                    Arg::new("player")
                        .short('p')
                        .long("player")
                        .value_name("UUID")
                        .help("Dump the data of one player instead of the server"),
                ),
        )
        .subcommand(Command::new("list").about("List extensions known to this server"))
        .subcommand(Command::new("wipe").about("Remove all stored extension values"))
        .subcommand(Command::new("cleanup").about("Remove values whose condition is no longer met"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let args = CliArgs::try_parse_from(["vantage"]).unwrap();
        assert_eq!(args.command, CliCommand::Serve);
        assert_eq!(args.config_path, PathBuf::from("vantage.toml"));
        assert!(args.log_level.is_none());
        assert!(!args.json_logs);
    }

    #[test]
    fn test_dump_player_with_global_flags() {
        let args = CliArgs::try_parse_from([
            "vantage",
            "dump",
            "--player",
            "550e8400-e29b-41d4-a716-446655440000",
            "--config",
            "custom.toml",
            "--json-logs",
        ])
        .unwrap();

        assert_eq!(
            args.command,
            CliCommand::Dump {
                player: Some("550e8400-e29b-41d4-a716-446655440000".to_string())
            }
        );
        assert_eq!(args.config_path, PathBuf::from("custom.toml"));
        assert!(args.json_logs);
    }

    #[test]
    fn test_management_commands() {
        for (name, expected) in [
            ("list", CliCommand::List),
            ("wipe", CliCommand::Wipe),
            ("cleanup", CliCommand::Cleanup),
        ] {
            let args = CliArgs::try_parse_from(["vantage", name, "-l", "debug"]).unwrap();
            assert_eq!(args.command, expected);
            assert_eq!(args.log_level.as_deref(), Some("debug"));
        }
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(CliArgs::try_parse_from(["vantage", "explode"]).is_err());
    }
}
