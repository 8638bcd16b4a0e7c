//! Command-line options shared by every easy service

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Command-line arguments of an easy service
#[derive(Parser, Debug, Default)]
#[command(about = "HTTP service built with easy")]
#[command(group(
    ArgGroup::new("dump")
        .args(["dump_config", "dump_schema", "dump_db_schema"])
        .multiple(false)
))]
pub struct Cli {
    /// Static config file; the built-in config is used when absent
    #[arg(short, long, env = "EASY_CONFIG")]
    pub config: Option<PathBuf>,

    /// YAML file with variables for `$name` substitution
    #[arg(long = "config_vars", env = "EASY_CONFIG_VARS")]
    pub config_vars: Option<PathBuf>,

    /// Write the built-in static config to this file and exit
    #[arg(long)]
    pub dump_config: Option<PathBuf>,

    /// Write the database schema into this directory and exit
    #[arg(long)]
    pub dump_schema: Option<PathBuf>,

    /// Write the database schema to this file and exit
    #[arg(long)]
    pub dump_db_schema: Option<PathBuf>,
}

/// One-shot action requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DumpConfig(PathBuf),
    DumpSchema(PathBuf),
    DumpDbSchema(PathBuf),
}

impl Cli {
    /// Parse arguments (program name first); exits with usage on error
    pub fn from_args(args: &[String]) -> Self {
        if args.is_empty() {
            return Self::default();
        }
        Self::parse_from(args)
    }

    pub fn command(&self) -> Option<Command> {
        if let Some(path) = &self.dump_config {
            return Some(Command::DumpConfig(path.clone()));
        }
        if let Some(dir) = &self.dump_schema {
            return Some(Command::DumpSchema(dir.clone()));
        }
        self.dump_db_schema.clone().map(Command::DumpDbSchema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(args)
    }

    #[test]
    fn test_no_arguments_serves() {
        let cli = parse(&["svc"]).unwrap();
        assert_eq!(cli.command(), None);
    }

    #[test]
    fn test_dump_schema_directory() {
        let cli = parse(&["svc", "--dump-schema", "/tmp/schemas"]).unwrap();
        assert_eq!(cli.command(), Some(Command::DumpSchema(PathBuf::from("/tmp/schemas"))));
    }

    #[test]
    fn test_dump_db_schema_file() {
        let cli = parse(&["svc", "--dump-db-schema", "/tmp/schemas/0_sqlite.sql"]).unwrap();
        assert_eq!(
            cli.command(),
            Some(Command::DumpDbSchema(PathBuf::from("/tmp/schemas/0_sqlite.sql")))
        );
    }

    #[test]
    fn test_config_and_vars() {
        let cli = parse(&["svc", "--config", "a.yaml", "--config_vars", "vars.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("a.yaml")));
        assert_eq!(cli.config_vars, Some(PathBuf::from("vars.yaml")));
        assert_eq!(cli.command(), None);
    }

    #[test]
    fn test_dump_flags_conflict() {
        assert!(parse(&["svc", "--dump-config", "a", "--dump-schema", "b"]).is_err());
    }
}
